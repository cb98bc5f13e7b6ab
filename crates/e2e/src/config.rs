//! Suite configuration from the environment

use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};

pub const CHATBOT_URL_ENV: &str = "CHATBOT_URL";
pub const LOGIN_EMAIL_ENV: &str = "LOGIN_EMAIL";
pub const LOGIN_PASSWORD_ENV: &str = "LOGIN_PASSWORD";
pub const LOGIN_WRONG_PASSWORD_ENV: &str = "LOGIN_WRONG_PASSWORD";
pub const STORAGE_STATE_PATH_ENV: &str = "STORAGE_STATE_PATH";

/// Login credentials of the test account
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub wrong_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("wrong_password", &"<redacted>")
            .finish()
    }
}

/// Everything the scenarios need from the environment
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Chatbot landing page
    pub chatbot_url: String,

    pub credentials: Credentials,

    /// Where the logged-in browser state is saved by the global setup
    pub storage_state_path: PathBuf,

    /// Whether a grader key is configured; quality scenarios skip otherwise
    pub grader_configured: bool,
}

impl SuiteConfig {
    /// Load the configuration, reading `env_file` first when given.
    /// Variables already set in the process win over the file.
    pub fn from_env(env_file: Option<&Path>) -> E2eResult<Self> {
        if let Some(path) = env_file {
            dotenvy::from_path(path).map_err(|e| {
                E2eError::MissingEnv(format!("cannot read {}: {}", path.display(), e))
            })?;
        } else {
            // A missing .env is fine
            let _ = dotenvy::dotenv();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> E2eResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| E2eError::MissingEnv(key.to_string()))
        };

        Ok(Self {
            chatbot_url: required(CHATBOT_URL_ENV)?,
            credentials: Credentials {
                email: required(LOGIN_EMAIL_ENV)?,
                password: required(LOGIN_PASSWORD_ENV)?,
                wrong_password: lookup(LOGIN_WRONG_PASSWORD_ENV).unwrap_or_default(),
            },
            storage_state_path: lookup(STORAGE_STATE_PATH_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("test-results/.auth/storage-state.json")),
            grader_configured: lookup(chatqa_common::gemini::GEMINI_API_KEY_ENV)
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false),
        })
    }
}
