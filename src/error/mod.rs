//! Error types for Replayline
//!
//! This module defines the main error type used throughout the crate.
//! Degraded-but-expected conditions during replay (malformed record
//! headers, truncated capture files, a single file hitting end-of-stream)
//! are not errors: they are logged and handled in place, so one bad file
//! or record never stops the rest of the replay.

use thiserror::Error;

/// Result type alias for Replayline operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Main error type for Replayline
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    #[error("No files match pattern: {0}")]
    NoMatchingFiles(String),

    #[error("Cannot read capture file {path}: {detail}")]
    Unreadable { path: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Replay already active")]
    AlreadyActive,
}

impl ReplayError {
    /// Build an [`ReplayError::Unreadable`] for a path and underlying cause
    pub fn unreadable(path: impl std::fmt::Display, detail: impl std::fmt::Display) -> Self {
        Self::Unreadable {
            path: path.to_string(),
            detail: detail.to_string(),
        }
    }
}
