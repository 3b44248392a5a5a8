//! Error types for brewsync.
//!
//! Library crates use [`BrewSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all brewsync operations.
#[derive(Debug, thiserror::Error)]
pub enum BrewSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the recipe service.
    #[error("network error: {0}")]
    Network(String),

    /// Login handshake failed or the session expired again after re-login.
    #[error("session error: {message}")]
    Session { message: String },

    /// Malformed input from a local store, an export file, or a remote payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Local store (brewing log database) access error.
    #[error("source error: {0}")]
    Source(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A name pattern matched zero or several records where exactly one was expected.
    #[error("pattern '{pattern}' matched {count} records, expected exactly one")]
    AmbiguousMatch { pattern: String, count: usize },

    /// A required collaborator (log file, remote session) is not available.
    #[error("missing source: {0}")]
    MissingSource(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BrewSyncError>;

impl BrewSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a session error from any displayable message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
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

    /// Whether this error is an ambiguous-match condition (never fatal for a batch).
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousMatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BrewSyncError::config("missing username");
        assert_eq!(err.to_string(), "config error: missing username");

        let err = BrewSyncError::AmbiguousMatch {
            pattern: "Pale*".into(),
            count: 2,
        };
        assert!(err.to_string().contains("matched 2 records"));
        assert!(err.is_ambiguous());
    }

    #[test]
    fn session_error_is_not_ambiguous() {
        let err = BrewSyncError::session("login page has no form_key");
        assert!(err.to_string().starts_with("session error"));
        assert!(!err.is_ambiguous());
    }
}
