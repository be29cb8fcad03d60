//! Error types for the logwatch service

use std::path::PathBuf;

/// Errors that can occur in the logwatch service
#[derive(Debug, thiserror::Error)]
pub enum LogwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source unavailable: {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {path:?} is corrupt: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },

    #[error("Another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Lease error: {0}")]
    Lease(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for logwatch operations
pub type Result<T> = std::result::Result<T, LogwatchError>;
