use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PageError, Result};
use crate::identity::PageIdentity;
use crate::prefs::PrefsSource;

/// Read-only view of the host page that page-side methods consult.
pub trait PageEnvironment {
    fn page_identity(&self) -> PageIdentity;
    fn prefs_source(&self) -> PrefsSource;
}

/// Fixed page description, typically loaded from a JSON file.
///
/// ```json
/// { "identity": { "hostname": "example.com", "canonical_href": "https://example.com/a" },
///   "prefs": { "cookie": "_gid=GA1.2.3", "session_storage": {} } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPage {
    pub identity: PageIdentity,
    pub prefs: PrefsSource,
}

impl StaticPage {
    pub fn new(identity: PageIdentity, prefs: PrefsSource) -> Self {
        Self { identity, prefs }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

impl PageEnvironment for StaticPage {
    fn page_identity(&self) -> PageIdentity {
        self.identity.clone()
    }

    fn prefs_source(&self) -> PrefsSource {
        self.prefs.clone()
    }
}
