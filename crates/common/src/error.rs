//! Error types for chatqa

use thiserror::Error;

/// Result type alias using the chatqa Error
pub type Result<T> = std::result::Result<T, Error>;

/// chatqa error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(String),

    #[error("Grader rejected the API key")]
    InvalidKey,

    #[error("Grader rate limit exceeded")]
    RateLimited,

    #[error("Grader error: {0}")]
    Provider(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("{what} (gave up after {attempts} attempts in {elapsed_ms} ms)")]
    Timeout {
        what: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    #[error("Browser error: {0}")]
    Browser(String),
}

impl Error {
    /// Whether this error came from a wait that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
