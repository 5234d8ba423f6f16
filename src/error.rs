//! Library error type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed record: {source}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("invalid media manifest {path}: {source}")]
    MediaManifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("annotation database error: {0}")]
    Annotations(#[from] rusqlite::Error),

    #[error("unknown message id: {0}")]
    UnknownMessage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ReviewError> = std::result::Result<T, E>;
