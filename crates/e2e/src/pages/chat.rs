//! Chat screen

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use chatqa_common::{
    AiResponseValidator, AppLanguage, ChatSurface, ChatTranscript, CompletionDetector, Message,
    TextDirection, TranscriptReader, ValidationOutcome, Viewport,
};

use crate::driver::{first, last, within, BrowserDriver, LoadState};
use crate::ensure;
use crate::error::{E2eError, E2eResult};

pub mod selectors {
    pub const WELCOME_TEXT: &str = "div.welcome-text h1 span";
    pub const CHAT_CONTAINER: &str = "#chat-container";
    pub const CHAT_INPUT_CONTAINER: &str = "#chat-input-container";
    pub const MESSAGE_INPUT: &str = "#chat-input";
    pub const MESSAGES_CONTAINER: &str = "#messages-container";
    pub const MESSAGE_ELEMENTS: &str = "#messages-container .group";
    pub const USER_MESSAGE_CHILD: &str = ".user-message";
    pub const USER_MESSAGES: &str = "#messages-container .user-message";
    pub const TEXT_DIRECTION_CHILD: &str = r#"div[id^="message-"]"#;
    pub const COPY_RESPONSE_BUTTON: &str = "button.copy-response-button";
    pub const CITATIONS: &str = "li span[title^=Citation]";
    pub const HTML_ROOT: &str = "html";
    pub const USER_PROFILE: &str = r#"div#sidebar img[alt="User profile"]"#;
    pub const LANGUAGE_SWITCH: &str = r#"div[role="switch"]"#;
}

use selectors::*;

const WIDGET_TIMEOUT: Duration = Duration::from_secs(30);
const SCROLL_SETTLE: Duration = Duration::from_millis(200);

/// Minimum length of an answer worth grading
pub const MIN_GRADED_RESPONSE_CHARS: usize = 10;

const ANSWER_TEXTS_SCRIPT: &str =
    "(els, child) => els.filter((e) => !e.querySelector(child)).map((e) => e.innerText.trim())";

const TRANSCRIPT_SCRIPT: &str = r#"(els, a) => els.map((e) => ({
    user: !!e.querySelector(a.user),
    text: e.innerText.trim(),
    complete: !!e.querySelector(a.copy),
}))"#;

const TEXTS_SCRIPT: &str = "(els) => els.map((e) => e.innerText.trim())";

// Citations are stripped from an offscreen copy so the transcript itself is untouched
const STRIP_CITATIONS_SCRIPT: &str = r#"(el, citations) => {
    const copy = el.cloneNode(true);
    copy.querySelectorAll(citations).forEach((c) => c.remove());
    copy.style.position = 'absolute';
    copy.style.left = '-100000px';
    document.body.appendChild(copy);
    const text = copy.innerText.trim();
    copy.remove();
    return text;
}"#;

const SCROLL_TOP_SCRIPT: &str = "(el) => { el.scrollTop = 0; }";
const SCROLL_BOTTOM_SCRIPT: &str = "(el) => { el.scrollTop = el.scrollHeight; }";
const INPUT_VALUE_SCRIPT: &str = "(el) => el.textContent || el.value || ''";

/// Username from a greeting such as `"Hi, Farrukh. Ready to dive in?"`
pub fn parse_welcome_username(greeting: &str) -> Option<String> {
    let name = greeting.split(',').nth(1)?.split('.').next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// Username the greeting should show for a login email (`first.last@x` → `first`)
pub fn expected_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local.split('.').next().unwrap_or_default().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct RenderedMessage {
    user: bool,
    text: String,
    complete: bool,
}

pub struct ChatPage {
    driver: Arc<dyn BrowserDriver>,
    detector: CompletionDetector,
}

impl ChatPage {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            detector: CompletionDetector::new(),
        }
    }

    pub fn with_detector(mut self, detector: CompletionDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    /// Selector of the newest message, answer or question
    pub fn last_message(&self) -> String {
        last(MESSAGE_ELEMENTS)
    }

    pub fn last_user_message(&self) -> String {
        last(USER_MESSAGES)
    }

    pub async fn is_welcome_text_displayed(&self) -> E2eResult<bool> {
        self.driver
            .wait_for_selector(WELCOME_TEXT, WIDGET_TIMEOUT)
            .await?;
        self.driver.is_visible(WELCOME_TEXT).await
    }

    pub async fn welcome_username(&self) -> E2eResult<String> {
        let greeting = self.driver.inner_text(WELCOME_TEXT).await?;
        parse_welcome_username(&greeting).ok_or_else(|| {
            E2eError::AssertionFailed(format!("no username in greeting {greeting:?}"))
        })
    }

    pub async fn verify_welcome_user(&self, email: &str) -> E2eResult<()> {
        let actual = self.welcome_username().await?;
        let expected = expected_username(email);
        ensure!(
            actual == expected,
            "welcome user is {actual:?}, expected {expected:?}"
        );
        Ok(())
    }

    /// Wait for the input or its container, sharing one 30 s budget.
    /// Returns whether either appeared.
    pub async fn wait_for_chat_widget(&self) -> bool {
        let start = Instant::now();
        for selector in [MESSAGE_INPUT, CHAT_INPUT_CONTAINER] {
            let remaining = WIDGET_TIMEOUT
                .saturating_sub(start.elapsed())
                .max(Duration::from_secs(1));
            match self.driver.wait_for_selector(selector, remaining).await {
                Ok(()) => return true,
                Err(e) => debug!("{} did not appear: {}", selector, e),
            }
        }
        warn!("Chat widget not found within {:?}", WIDGET_TIMEOUT);
        false
    }

    pub async fn send_message(&self, text: &str) -> E2eResult<()> {
        debug!("Sending message: {}", text);
        self.driver.click(MESSAGE_INPUT, WIDGET_TIMEOUT).await?;
        self.driver.clear(MESSAGE_INPUT).await?;
        self.driver.type_text(text).await?;
        self.driver.press("Enter").await
    }

    /// Whether a message with `text` shows up within 10 s
    pub async fn wait_for_user_message(&self, text: &str) -> bool {
        let selector = format!("text={text}");
        self.driver
            .wait_for_selector(&selector, Duration::from_secs(10))
            .await
            .is_ok()
    }

    pub async fn user_message_texts(&self) -> E2eResult<Vec<String>> {
        let value = self
            .driver
            .evaluate_all(USER_MESSAGES, TEXTS_SCRIPT, Value::Null)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Texts of the answer messages, skipping the user's own bubbles
    pub async fn answer_texts(&self) -> E2eResult<Vec<String>> {
        let value = self
            .driver
            .evaluate_all(MESSAGE_ELEMENTS, ANSWER_TEXTS_SCRIPT, json!(USER_MESSAGE_CHILD))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Snapshot of every rendered message
    pub async fn transcript(&self) -> E2eResult<ChatTranscript> {
        let value = self
            .driver
            .evaluate_all(
                MESSAGE_ELEMENTS,
                TRANSCRIPT_SCRIPT,
                json!({ "user": USER_MESSAGE_CHILD, "copy": COPY_RESPONSE_BUTTON }),
            )
            .await?;
        let rendered: Vec<RenderedMessage> = serde_json::from_value(value)?;
        Ok(rendered
            .into_iter()
            .map(|m| {
                if m.user {
                    Message::user(m.text)
                } else {
                    Message::assistant(m.text, m.complete)
                }
            })
            .collect())
    }

    pub async fn is_last_message_fully_generated(&self) -> E2eResult<bool> {
        self.driver
            .is_visible(&within(&self.last_message(), COPY_RESPONSE_BUTTON))
            .await
    }

    pub async fn wait_for_ai_response(&self) -> E2eResult<()> {
        self.detector.wait_for_response(self).await?;
        Ok(())
    }

    pub async fn is_loading_state_visible(&self) -> E2eResult<bool> {
        Ok(self.detector.is_loading_visible(self).await?)
    }

    /// Text of the newest message without its citation markers
    pub async fn last_ai_response_text(&self) -> E2eResult<String> {
        let value = self
            .driver
            .evaluate(&self.last_message(), STRIP_CITATIONS_SCRIPT, json!(CITATIONS))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn scroll_to_top(&self) -> E2eResult<()> {
        self.driver
            .evaluate(MESSAGES_CONTAINER, SCROLL_TOP_SCRIPT, Value::Null)
            .await?;
        self.driver.sleep(SCROLL_SETTLE).await
    }

    pub async fn scroll_to_bottom(&self) -> E2eResult<()> {
        if let Err(e) = self
            .driver
            .evaluate(MESSAGES_CONTAINER, SCROLL_BOTTOM_SCRIPT, Value::Null)
            .await
        {
            debug!("Scrolling messages failed ({}), scrolling the chat container", e);
            if let Err(e) = self
                .driver
                .evaluate(CHAT_CONTAINER, SCROLL_BOTTOM_SCRIPT, Value::Null)
                .await
            {
                warn!("Could not scroll the chat: {}", e);
            }
        }
        self.driver.sleep(SCROLL_SETTLE).await
    }

    /// `dir` of the text inside the message matched by `message`
    pub async fn text_direction_of(&self, message: &str) -> E2eResult<Option<TextDirection>> {
        let dir = self
            .driver
            .attribute(&first(&within(message, TEXT_DIRECTION_CHILD)), "dir")
            .await?;
        Ok(dir.as_deref().and_then(TextDirection::parse))
    }

    /// Ask `query` and report the direction of the answer
    pub async fn text_direction(&self, query: &str) -> E2eResult<Option<TextDirection>> {
        self.send_message(query).await?;
        self.wait_for_ai_response().await?;
        self.text_direction_of(&self.last_message()).await
    }

    pub async fn is_input_cleared(&self) -> E2eResult<bool> {
        let value = match self
            .driver
            .evaluate(MESSAGE_INPUT, INPUT_VALUE_SCRIPT, Value::Null)
            .await
        {
            Ok(Value::String(s)) => s,
            Ok(_) => String::new(),
            Err(e) => {
                debug!("Input not readable, treating it as empty: {}", e);
                String::new()
            }
        };
        Ok(value.trim().is_empty())
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()> {
        debug!("Viewport {}x{}", viewport.width, viewport.height);
        self.driver.set_viewport(viewport).await
    }

    /// Ask `query`, wait for the answer and grade it against `expected`
    pub async fn ai_response_validation(
        &self,
        query: &str,
        expected: &str,
        validator: &AiResponseValidator,
    ) -> E2eResult<ValidationOutcome> {
        self.send_message(query).await?;
        self.wait_for_ai_response().await?;
        let actual = self.last_ai_response_text().await?;
        info!("AI response: {}", actual);
        ensure!(
            actual.chars().count() > MIN_GRADED_RESPONSE_CHARS,
            "AI response too short to grade: {actual:?}"
        );
        Ok(validator.evaluate(query, &actual, expected).await)
    }

    pub async fn current_app_language(&self) -> E2eResult<AppLanguage> {
        let lang = self.driver.attribute(HTML_ROOT, "lang").await?;
        Ok(AppLanguage::from_lang_attr(lang.as_deref()))
    }

    /// Flip the language switch in the profile menu when needed
    pub async fn set_app_language(&self, language: AppLanguage) -> E2eResult<()> {
        let current = self.current_app_language().await?;
        if current == language {
            debug!("App language already {}", language);
            return Ok(());
        }
        info!("Switching app language {} -> {}", current, language);
        self.driver.click(USER_PROFILE, WIDGET_TIMEOUT).await?;
        self.driver
            .click(&first(LANGUAGE_SWITCH), Duration::from_secs(5))
            .await?;
        self.driver.click(USER_PROFILE, WIDGET_TIMEOUT).await?;
        self.driver
            .wait_for_load_state(LoadState::NetworkIdle, WIDGET_TIMEOUT)
            .await
    }
}

#[async_trait]
impl TranscriptReader for ChatPage {
    async fn message_texts(&self) -> chatqa_common::Result<Vec<String>> {
        Ok(self.answer_texts().await?)
    }

    async fn is_last_message_complete(&self) -> chatqa_common::Result<bool> {
        Ok(self.is_last_message_fully_generated().await?)
    }
}

#[async_trait]
impl ChatSurface for ChatPage {
    async fn send_message(&self, text: &str) -> chatqa_common::Result<()> {
        Ok(ChatPage::send_message(self, text).await?)
    }

    async fn last_message_text(&self) -> chatqa_common::Result<String> {
        Ok(self.last_ai_response_text().await?)
    }
}
