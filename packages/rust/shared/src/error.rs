//! Error types for mfgraph.
//!
//! Library crates use [`MfGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the HTTP façade maps it to status codes.

use std::path::PathBuf;

/// Top-level error type for all mfgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum MfGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to an upstream source.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream payload could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed caller input (empty search term, bad id, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Query or context-build target is absent from the current snapshot.
    #[error("element not found: {element_id}")]
    ElementNotFound { element_id: String },

    /// Every source failed during a rebuild; the previous snapshot stays published.
    #[error("rebuild failed: {message}")]
    RebuildFailed { message: String },

    /// HTTP server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MfGraphError>;

impl MfGraphError {
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

    /// Create a not-found error for the given element id.
    pub fn not_found(element_id: impl Into<String>) -> Self {
        Self::ElementNotFound {
            element_id: element_id.into(),
        }
    }

    /// Create a rebuild failure from any displayable message.
    pub fn rebuild_failed(msg: impl Into<String>) -> Self {
        Self::RebuildFailed {
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

    /// Whether this error is a not-found result rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}
