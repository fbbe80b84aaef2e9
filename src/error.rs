//! Error types for the HTML language server.

use thiserror::Error;

/// Errors surfaced by fallible public APIs.
///
/// Scan anomalies and script parse failures never show up here: they degrade
/// to a best-effort region list and a missing AST respectively.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid uri '{0}'")]
    InvalidUri(String),

    #[error("failed to load module '{key}': {reason}")]
    Load { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn load(key: &str, reason: impl Into<String>) -> Self {
        Error::Load {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
