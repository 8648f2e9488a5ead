use std::path::PathBuf;

/// Errors from the page-side collaborators.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// A preference pattern failed to compile.
    #[error("invalid preference pattern '{name}': {source}")]
    Pattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// Could not read a page environment file.
    #[error("failed to read page environment {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The page environment is not valid JSON for a page.
    #[error("invalid page environment: {0}")]
    Json(#[from] serde_json::Error),

    /// Installing a method into the table failed.
    #[error("registry error: {0}")]
    Registry(#[from] ifrrpc_channel::RegistryError),
}

pub type Result<T> = std::result::Result<T, PageError>;
