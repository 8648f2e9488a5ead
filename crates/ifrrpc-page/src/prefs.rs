//! Preference harvesting from page storage.
//!
//! The harvest source is the page's cookie string (each item percent-decoded)
//! followed by its session storage serialized as JSON with every backslash
//! stripped. Each named pattern is run over that text and its first capture
//! group becomes the preference value.

use std::borrow::Cow;
use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{PageError, Result};

/// Google analytics client id.
pub const GID_PATTERN: &str = r"_gid=([^;]+)";

/// Location tag, `city_state_country`, as stored in session storage.
pub const LOC_PATTERN: &str = r#""ttp":\{[^{]*?_(.*?)_\d+"#;

/// Harvested preferences, keyed by pattern name.
pub type Prefs = BTreeMap<String, String>;

/// Raw storage the harvester reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefsSource {
    /// `document.cookie` style string: `name=value; name=value`.
    pub cookie: String,
    pub session_storage: BTreeMap<String, String>,
}

impl PrefsSource {
    /// The text the patterns are matched against.
    pub fn harvest_text(&self) -> String {
        let mut text = self
            .cookie
            .split(';')
            .map(decode_item)
            .collect::<Vec<_>>()
            .join(";");

        match serde_json::to_string(&self.session_storage) {
            Ok(json) => text.push_str(&json.replace('\\', "")),
            Err(err) => debug!(error = %err, "session storage not serializable, skipped"),
        }
        text
    }
}

fn decode_item(item: &str) -> Cow<'_, str> {
    urlencoding::decode(item).unwrap_or(Cow::Borrowed(item))
}

/// Compiled set of named preference patterns.
#[derive(Debug, Clone)]
pub struct PrefsExtractor {
    patterns: Vec<(&'static str, Regex)>,
}

impl PrefsExtractor {
    /// The default `gid` and `loc` patterns.
    pub fn new() -> Result<Self> {
        Self::with_patterns(&[("gid", GID_PATTERN), ("loc", LOC_PATTERN)])
    }

    pub fn with_patterns(patterns: &[(&'static str, &str)]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|&(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| (name, regex))
                    .map_err(|source| PageError::Pattern { name, source })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Run every pattern over the harvest text of `source`.
    pub fn extract(&self, source: &PrefsSource) -> Prefs {
        let text = source.harvest_text();
        trace!(size = text.len(), "harvesting preferences");

        let mut prefs = Prefs::new();
        for (name, regex) in &self.patterns {
            if let Some(value) = regex.captures(&text).and_then(|caps| caps.get(1)) {
                prefs.insert((*name).to_string(), value.as_str().to_string());
            }
        }
        debug!(found = prefs.len(), "preferences harvested");
        prefs
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patterns.iter().map(|(name, _)| *name)
    }
}

/// Extract preferences with the default patterns.
pub fn extract_prefs(source: &PrefsSource) -> Result<Prefs> {
    Ok(PrefsExtractor::new()?.extract(source))
}
