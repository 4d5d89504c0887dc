//! Error types for baton-core

use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A request referenced a suite that is not in the registry
    #[error("suite not found: {0}")]
    SuiteNotFound(String),

    /// A raw event was missing required fields or carried unknown values
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The runner failed to collect or execute a suite
    #[error("runner failure in suite '{suite}': {message}")]
    Runner {
        /// Suite name
        suite: String,
        /// Detailed message
        message: String,
    },

    /// Sending a notification to an observer failed
    #[error("delivery to observer {0} failed")]
    ObserverDelivery(Uuid),

    /// Invalid or unreadable suite configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a runner failure for a suite.
    pub fn runner(suite: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runner {
            suite: suite.into(),
            message: message.into(),
        }
    }

    /// Build a malformed message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
