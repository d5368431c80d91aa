//! Centralized error types for mailharvest.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailharvest library.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A date string did not match the expected format.
    #[error("Invalid date '{value}': expected {expected}")]
    DateFormat { value: String, expected: String },

    /// The mail service could not satisfy a request.
    #[error("Mail service error: {0}")]
    Transport(String),

    /// A message payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The configuration file is malformed or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mailbox snapshot file could not be read or parsed.
    #[error("Invalid snapshot '{path}': {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Helper to convert a bare `std::io::Error` together with a path.
impl HarvestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `HarvestError`
/// when no path context is available (rare, prefer `HarvestError::io`).
impl From<std::io::Error> for HarvestError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
