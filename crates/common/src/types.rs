//! Core types for chatqa

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a rendered message.
///
/// The chat UI does not label messages; the role is inferred from the
/// markup (user bubbles carry a dedicated child element).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single rendered chat message, as observed by the test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Whether the "generation complete" affordance (copy button) is shown
    #[serde(default)]
    pub has_completion_affordance: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            has_completion_affordance: false,
        }
    }

    pub fn assistant(text: impl Into<String>, complete: bool) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            has_completion_affordance: complete,
        }
    }
}

/// Ordered sequence of rendered messages in a chat session.
///
/// The last element is always the most recently produced message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTranscript {
    messages: Vec<Message>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Texts of messages with the given role, in order
    pub fn texts_for(&self, role: Role) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.text.clone())
            .collect()
    }
}

impl FromIterator<Message> for ChatTranscript {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// UI language of the chatbot application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppLanguage {
    English,
    Arabic,
}

impl AppLanguage {
    /// Map the document `lang` attribute to an app language.
    /// Only `en-US` is English; anything else (including a missing
    /// attribute) is treated as Arabic.
    pub fn from_lang_attr(lang: Option<&str>) -> Self {
        match lang {
            Some("en-US") => AppLanguage::English,
            _ => AppLanguage::Arabic,
        }
    }
}

impl fmt::Display for AppLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppLanguage::English => write!(f, "English"),
            AppLanguage::Arabic => write!(f, "Arabic"),
        }
    }
}

/// Value of the `dir` attribute on a rendered message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Some(TextDirection::Ltr),
            "rtl" => Some(TextDirection::Rtl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }
}

impl fmt::Display for TextDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
