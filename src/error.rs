//! Error types for the tailing engine.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tail operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors while reading or seeking the tailed file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// File path errors.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// Configuration rejected before the tail was started.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// File did not exist at open time and waiting was not requested.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// File exists but could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata lookup failed for the tailed path.
    #[error("Failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File shrank below the last observed size.
    #[error("File truncated: {} shrank from {previous} to {current} bytes", path.display())]
    Truncated {
        path: PathBuf,
        previous: u64,
        current: u64,
    },

    /// Path no longer resolves to the file that was opened.
    #[error("File rotated or removed: {}", path.display())]
    Rotated { path: PathBuf },

    /// Both change notification workers exited.
    #[error("Change notifier stopped")]
    NotifierStopped,

    /// Tail was closed by the caller or the consumer went away.
    #[error("Tail closed")]
    Closed,
}

impl Error {
    /// Whether this cause is an expected log rotation (removal, recreation or
    /// truncation) rather than a transient failure.
    pub fn is_rotation(&self) -> bool {
        matches!(self, Error::Truncated { .. } | Error::Rotated { .. })
    }
}

/// A convenient Result type for tail operations.
pub type Result<T> = std::result::Result<T, Error>;
