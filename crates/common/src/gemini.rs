//! Google Gemini grading backend
//!
//! Uses the native `generateContent` endpoint with
//! `responseMimeType: application/json` so the model answers with a bare
//! JSON object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::validator::Generator;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini client used as the grading [`Generator`]
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client for the default model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredentials(format!(
                "{GEMINI_API_KEY_ENV} is empty"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            client,
        })
    }

    /// Create a client from `GEMINI_API_KEY` and the optional `GEMINI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(GEMINI_API_KEY_ENV)
            .map_err(|_| Error::MissingCredentials(format!("{GEMINI_API_KEY_ENV} is not set")))?;
        let mut client = Self::new(api_key)?;
        if let Ok(model) = std::env::var(GEMINI_MODEL_ENV) {
            if !model.trim().is_empty() {
                client.model = model;
            }
        }
        Ok(client)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!("POST {}", self.endpoint());
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::InvalidKey);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("Gemini API error {status}: {text}")));
        }

        let parsed: GenerateContentResponse = resp.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Provider("Gemini returned no text".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> GeminiClient {
        GeminiClient::new("test-key").unwrap().with_base_url(server.url())
    }

    #[test]
    fn test_empty_key_is_missing_credentials() {
        let err = GeminiClient::new("  ").unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_json_mode_request() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "grade this"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates": [{"content": {"parts": [{"text": "{\"ok\":"}, {"text": "true}"}]}}]}"#,
            )
            .create_async()
            .await;

        let text = client_for(&server).generate("grade this").await?;
        assert_eq!(text, r#"{"ok":true}"#);
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let _unauthorized = server
            .mock("POST", "/models/bad-key:generateContent")
            .with_status(403)
            .create_async()
            .await;
        let _limited = server
            .mock("POST", "/models/busy:generateContent")
            .with_status(429)
            .create_async()
            .await;
        let _broken = server
            .mock("POST", "/models/broken:generateContent")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.clone().with_model("bad-key").generate("p").await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey));
        let err = client.clone().with_model("busy").generate("p").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
        let err = client.with_model("broken").generate("p").await.unwrap_err();
        match err {
            Error::Provider(msg) => assert!(msg.contains("500") && msg.contains("internal")),
            other => panic!("expected Provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_candidates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("p").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
