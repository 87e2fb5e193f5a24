//! Error types for meshsync
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for meshsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for meshsync
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration client errors (control plane API)
    #[error("Config client error: {0}")]
    ConfigClient(String),

    /// Object not found in the control plane
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Object already exists in the control plane
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Stale concurrency token on update
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed registry payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from registry APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Backend-specific error
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a config client error
    pub fn config_client(msg: impl Into<String>) -> Self {
        Self::ConfigClient(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an "already exists" error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a backend-specific error
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
