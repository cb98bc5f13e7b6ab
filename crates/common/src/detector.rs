//! Response-completion detection
//!
//! The chatbot streams its answers. While an answer is being produced the
//! last message shows a localized loading text; once streaming ends the
//! message grows a copy button. The detector polls the transcript until
//! both signals agree that the answer is done.
//!
//! The two signals are independent UI features. A placeholder that somehow
//! shows the copy button would be reported as complete.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::poll::{poll_until, RetryPolicy, WaitOutcome};

/// Transient texts shown while an answer is being generated
pub const DEFAULT_LOADING_TEXTS: &[&str] = &[
    "Classifying your query",
    "Working on it...",
    "تصنيف الاستعلام الخاص بك",
    "العمل على ذلك...",
];

/// Message used when the answer does not finish in time
pub const RESPONSE_TIMEOUT_MESSAGE: &str =
    "Waiting on AI Response to be generated within the timeout period";

/// Read access to the rendered transcript
#[async_trait]
pub trait TranscriptReader: Send + Sync {
    /// Texts of the rendered answer messages, oldest first
    async fn message_texts(&self) -> Result<Vec<String>>;

    /// Whether the last message shows the completion affordance
    async fn is_last_message_complete(&self) -> Result<bool>;
}

/// Full chat surface used by scenarios: the transcript plus sending
#[async_trait]
pub trait ChatSurface: TranscriptReader {
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Text of the last message with citation markup removed
    async fn last_message_text(&self) -> Result<String>;
}

/// Polls a transcript until the latest answer is fully generated
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    loading_texts: Vec<String>,
    policy: RetryPolicy,
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionDetector {
    /// Detector with the default loading texts and a 120 s / 3 s policy
    pub fn new() -> Self {
        Self {
            loading_texts: DEFAULT_LOADING_TEXTS.iter().map(|s| s.to_string()).collect(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_loading_texts<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loading_texts = texts.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether `text` contains one of the loading texts
    pub fn is_placeholder(&self, text: &str) -> bool {
        self.loading_texts.iter().any(|t| text.contains(t.as_str()))
    }

    /// One poll tick: is the latest answer fully generated right now?
    pub async fn check_once(&self, reader: &dyn TranscriptReader) -> Result<bool> {
        let texts = reader.message_texts().await?;
        let Some(last) = texts.last() else {
            return Ok(false);
        };
        if self.is_placeholder(last) {
            return Ok(false);
        }
        reader.is_last_message_complete().await
    }

    /// Poll until complete, returning the outcome without judging it
    pub async fn wait(&self, reader: &dyn TranscriptReader) -> WaitOutcome<()> {
        poll_until(self.policy, move || async move {
            Ok(self.check_once(reader).await?.then_some(()))
        })
        .await
    }

    /// Block until the latest answer is fully generated.
    ///
    /// Running out of time is a hard failure.
    pub async fn wait_for_response(&self, reader: &dyn TranscriptReader) -> Result<()> {
        let outcome = self.wait(reader).await;
        if let WaitOutcome::Ready {
            attempts, elapsed, ..
        } = &outcome
        {
            info!(
                "AI response generated after {} poll(s) ({} ms)",
                attempts,
                elapsed.as_millis()
            );
        }
        outcome.into_result(RESPONSE_TIMEOUT_MESSAGE)
    }

    /// Single non-blocking check for a visible loading text
    pub async fn is_loading_visible(&self, reader: &dyn TranscriptReader) -> Result<bool> {
        let texts = reader.message_texts().await?;
        let loading = texts.last().is_some_and(|last| self.is_placeholder(last));
        debug!(loading, "loading state check");
        Ok(loading)
    }
}
