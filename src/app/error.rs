use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedCacheError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Certificate error for {source_url}: {message}")]
    Certificate { source_url: String, message: String },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Corrupt manifest at {path}: {source}")]
    CorruptManifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache directory {path} is locked by process {pid}")]
    Locked { path: PathBuf, pid: u32 },
}

impl FeedCacheError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole invocation rather than a single source.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptManifest { .. } | Self::Filesystem { .. } | Self::Locked { .. }
        )
    }
}

impl From<reqwest::Error> for FeedCacheError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(error_chain(&e))
    }
}

/// Flatten an error and its sources into one line.
pub fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut cur = e.source();
    while let Some(err) = cur {
        msg.push_str(": ");
        msg.push_str(&err.to_string());
        cur = err.source();
    }
    msg
}

pub type Result<T> = std::result::Result<T, FeedCacheError>;
