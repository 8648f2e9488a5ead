use serde::{Deserialize, Serialize};

/// What is known about the page currently shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageIdentity {
    /// Media id published by the page's audience tag, if any.
    pub audience_media_id: Option<String>,
    /// `href` of the page's canonical link, if any.
    pub canonical_href: Option<String>,
    pub hostname: String,
}

impl PageIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn with_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.audience_media_id = Some(media_id.into());
        self
    }

    pub fn with_canonical(mut self, href: impl Into<String>) -> Self {
        self.canonical_href = Some(href.into());
        self
    }

    /// Current page id: the media id, else the canonical href, else the
    /// hostname. Empty values count as absent.
    pub fn resolve(&self) -> &str {
        non_empty(self.audience_media_id.as_deref())
            .or_else(|| non_empty(self.canonical_href.as_deref()))
            .unwrap_or(&self.hostname)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
