//! Error types for the bridge
//!
//! Only failures of the bridge's own paths surface here. Contract failures in
//! outbox content are data, reported through reason codes.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error while {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] horizon_tape::TapeError),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Claim error: {0}")]
    Claim(String),
}

impl BridgeError {
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BridgeError>;
