// src/error.rs

//! Unified error handling for the job router.

use std::fmt;

use thiserror::Error;

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to the session bridge failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A persisted table could not be read or written
    #[error("Store error for {path}: {message}")]
    Store { path: String, message: String },

    /// An outcome sink gave up after a repeated append failure.
    /// `keys` lists every key it was handed but never persisted, in order.
    #[error(
        "Sink '{category}' failed with {} unwritten keys [{}]: {message}",
        .keys.len(),
        .keys.join(", ")
    )]
    SinkFailed {
        category: String,
        keys: Vec<String>,
        message: String,
    },

    /// An external collaborator (listing source, browser session) failed
    #[error("Collaborator error for {context}: {message}")]
    Collaborator { context: String, message: String },

    /// A bounded wait elapsed
    #[error("Timed out after {secs}s: {context}")]
    Timeout { context: String, secs: u64 },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error for the given path.
    pub fn store(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Store {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a collaborator error with context.
    pub fn collaborator(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Collaborator {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(context: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            context: context.into(),
            secs,
        }
    }
}
