//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Chatbot not reachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Fixture parse error: {0}")]
    FixtureParse(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Validator unavailable: {0}")]
    ValidatorUnavailable(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error(transparent)]
    Core(#[from] chatqa_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl From<E2eError> for chatqa_common::Error {
    fn from(e: E2eError) -> Self {
        match e {
            E2eError::Core(inner) => inner,
            other => chatqa_common::Error::Browser(other.to_string()),
        }
    }
}

/// Fail with `AssertionFailed` unless `cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::E2eError::AssertionFailed(format!($($arg)+)));
        }
    };
}
