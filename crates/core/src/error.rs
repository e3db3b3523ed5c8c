//! Error types for Roadwatch core

use thiserror::Error;

/// Result type alias for Roadwatch core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised by the recorded-data replay source
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A backing recorded-data file could not be opened
    #[error("Recorded data unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path of the file that failed to open
        path: String,
        /// Underlying I/O or CSV error
        reason: String,
    },

    /// A row did not parse into the expected numeric shape
    #[error("Decode error in {path} at line {line}: {message}")]
    Decode {
        /// File the row came from
        path: String,
        /// 1-based line number of the row
        line: u64,
        /// What went wrong
        message: String,
    },

    /// The recorded data has a header but no rows to replay
    #[error("Recorded data has no rows: {0}")]
    EmptyDataset(String),

    /// `read` was called before `open`
    #[error("Source not opened")]
    NotOpen,

    /// `read` or `open` was called after `close`
    #[error("Source closed")]
    SourceClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the caller can keep reading after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}
