//! Error types for baton-runner

use thiserror::Error;

/// Runner error type
#[derive(Debug, Error)]
pub enum Error {
    /// The adapter process could not be started
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Program that failed to start
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The adapter did not finish in time
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// The adapter exited unsuccessfully
    #[error("adapter exited with {code}: {stderr}")]
    ExitStatus {
        /// Exit code, or "signal" when killed
        code: String,
        /// Tail of the adapter's stderr
        stderr: String,
    },

    /// Unknown runner kind in configuration
    #[error("unknown runner kind: {0}")]
    UnknownKind(String),

    /// IO error while reading adapter output
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert into a core runner failure for `suite`.
    pub fn into_core(self, suite: &str) -> baton_core::Error {
        baton_core::Error::runner(suite, self.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
