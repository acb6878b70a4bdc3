//! Error types for llmbench-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed run.
///
/// Every per-run failure is local to that run: it is logged, counted, and
/// excluded from aggregate sums. None of these abort sibling runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or connect failure before a response arrived
    Transport,
    /// Server answered with a non-200 status
    HttpStatus,
    /// Body matched neither the success nor the error envelope
    Parse,
    /// Server returned a structured error message
    Api,
}

impl ErrorKind {
    /// Identifier used in log lines and summaries
    pub fn id(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Parse => "parse",
            ErrorKind::Api => "api",
        }
    }

    /// All failure kinds, in display order
    pub fn all() -> &'static [ErrorKind] {
        &[
            ErrorKind::Transport,
            ErrorKind::HttpStatus,
            ErrorKind::Parse,
            ErrorKind::Api,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Process-level errors.
///
/// Dispatcher setup, shutdown and the post-run unload call surface here;
/// individual runs report through
/// [`RunFailure`](crate::response::RunFailure) instead.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Builder was finalized without a required component
    #[error("missing required component: {0}")]
    MissingConfig(&'static str),

    /// Admission control was closed while requests were still queued
    #[error("dispatcher shut down")]
    Shutdown,

    /// Post-run model unload failed
    #[error("error unloading model: {0}")]
    Unload(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl BenchError {
    /// Missing builder component
    pub fn missing_config(name: &'static str) -> Self {
        BenchError::MissingConfig(name)
    }

    /// Unload failure with a rendered message
    pub fn unload(message: impl Into<String>) -> Self {
        BenchError::Unload(message.into())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Errors raised by a [`PersistenceSink`](crate::traits::PersistenceSink).
///
/// These are logged by the caller and never fail the run.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Target directory could not be created
    #[error("error creating directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Artifact could not be written
    #[error("error writing {path}: {source}")]
    Write {
        /// File path
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_ids() {
        assert_eq!(ErrorKind::Transport.to_string(), "transport");
        assert_eq!(ErrorKind::HttpStatus.to_string(), "http_status");
        assert_eq!(ErrorKind::Parse.to_string(), "parse");
        assert_eq!(ErrorKind::Api.to_string(), "api");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::HttpStatus).unwrap(),
            "\"http_status\""
        );
    }

    #[test]
    fn test_unload_error_message() {
        let err = BenchError::unload("model busy (status code 500)");
        assert_eq!(
            err.to_string(),
            "error unloading model: model busy (status code 500)"
        );
    }
}
