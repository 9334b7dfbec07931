//! Error types for cardpick.
//!
//! Library crates use [`CardpickError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all cardpick operations.
#[derive(Debug, thiserror::Error)]
pub enum CardpickError {
    /// Configuration loading or validation error (including missing credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the marketplace or the card reference service.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed response payload or persisted file.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Failure persisting a cache, mapping, or snapshot file.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad filter, bad selection, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Operator input could not be read.
    #[error("input error: {0}")]
    Input(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardpickError>;

impl CardpickError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
