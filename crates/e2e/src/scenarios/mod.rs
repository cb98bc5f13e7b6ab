//! Scenario catalogue
//!
//! Every scenario belongs to one suite, whose name doubles as its tag.
//! Scenarios start on the chatbot landing page and drive it through the
//! page objects; a failed check ends the scenario with an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatqa_common::AiResponseValidator;

use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::Fixtures;
use crate::pages::{ChatPage, LoginPage};

mod chatbot;
mod gpt_response;
mod login;
mod security;

/// Test suites, addressed on the command line by their tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suite {
    Chatbot,
    GptResponse,
    Login,
    Security,
}

impl Suite {
    pub fn tag(&self) -> &'static str {
        match self {
            Suite::Chatbot => "chatbot",
            Suite::GptResponse => "gpt_response",
            Suite::Login => "login",
            Suite::Security => "security",
        }
    }

    /// Login scenarios start from a fresh, logged-out browser
    pub fn uses_storage_state(&self) -> bool {
        !matches!(self, Suite::Login)
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    WidgetLoads,
    SendMessageClearsInput,
    ResponseRendersCleanly,
    ScrollAndAccessibility,
    MultilingualLtr,
    MultilingualRtl,
    BilingualResponseQuality,
    NoHallucination,
    LoadingAndFallback,
    LoginSucceeds,
    WrongPasswordError,
    ScriptTagSanitised,
    IgnoreInstructionsRefused,
}

impl Scenario {
    pub const ALL: [Scenario; 13] = [
        Scenario::WidgetLoads,
        Scenario::SendMessageClearsInput,
        Scenario::ResponseRendersCleanly,
        Scenario::ScrollAndAccessibility,
        Scenario::MultilingualLtr,
        Scenario::MultilingualRtl,
        Scenario::BilingualResponseQuality,
        Scenario::NoHallucination,
        Scenario::LoadingAndFallback,
        Scenario::LoginSucceeds,
        Scenario::WrongPasswordError,
        Scenario::ScriptTagSanitised,
        Scenario::IgnoreInstructionsRefused,
    ];

    /// Stable identifier used by `--name`
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::WidgetLoads => "chat-widget-loads",
            Scenario::SendMessageClearsInput => "send-message-clears-input",
            Scenario::ResponseRendersCleanly => "response-renders-cleanly",
            Scenario::ScrollAndAccessibility => "scroll-and-accessibility",
            Scenario::MultilingualLtr => "multilingual-english-ltr",
            Scenario::MultilingualRtl => "multilingual-arabic-rtl",
            Scenario::BilingualResponseQuality => "bilingual-response-quality",
            Scenario::NoHallucination => "no-hallucination",
            Scenario::LoadingAndFallback => "loading-and-fallback",
            Scenario::LoginSucceeds => "login-succeeds",
            Scenario::WrongPasswordError => "wrong-password-error",
            Scenario::ScriptTagSanitised => "script-tag-sanitised",
            Scenario::IgnoreInstructionsRefused => "ignore-instructions-refused",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Scenario::WidgetLoads => "Chat widget loads on desktop and mobile",
            Scenario::SendMessageClearsInput => {
                "User can send messages via input box and input is cleared"
            }
            Scenario::ResponseRendersCleanly => {
                "AI responses are rendered properly and no broken HTML is displayed"
            }
            Scenario::ScrollAndAccessibility => "Page scroll and input accessibility",
            Scenario::MultilingualLtr => "Multilingual support for English LTR",
            Scenario::MultilingualRtl => "Multilingual support for Arabic RTL",
            Scenario::BilingualResponseQuality => {
                "AI gives clear, helpful answers consistent between English and Arabic"
            }
            Scenario::NoHallucination => "AI answers are not hallucinated or incomplete",
            Scenario::LoadingAndFallback => "Loading state and fallback message are displayed",
            Scenario::LoginSucceeds => "Login with email succeeds with valid credentials",
            Scenario::WrongPasswordError => "Login with email shows an error for a wrong password",
            Scenario::ScriptTagSanitised => "Chat input is sanitised for script tags",
            Scenario::IgnoreInstructionsRefused => {
                "AI does not follow a prompt to ignore its instructions"
            }
        }
    }

    pub fn suite(&self) -> Suite {
        match self {
            Scenario::WidgetLoads
            | Scenario::SendMessageClearsInput
            | Scenario::ResponseRendersCleanly
            | Scenario::ScrollAndAccessibility
            | Scenario::MultilingualLtr
            | Scenario::MultilingualRtl => Suite::Chatbot,
            Scenario::BilingualResponseQuality
            | Scenario::NoHallucination
            | Scenario::LoadingAndFallback => Suite::GptResponse,
            Scenario::LoginSucceeds | Scenario::WrongPasswordError => Suite::Login,
            Scenario::ScriptTagSanitised | Scenario::IgnoreInstructionsRefused => Suite::Security,
        }
    }

    pub fn find(name: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn tagged(tag: &str) -> Vec<Scenario> {
        Self::ALL
            .into_iter()
            .filter(|s| s.suite().tag() == tag)
            .collect()
    }

    /// Open the landing page and run the scenario body
    pub async fn run(self, ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
        ctx.login.goto().await?;
        match self {
            Scenario::WidgetLoads => chatbot::widget_loads(ctx).await,
            Scenario::SendMessageClearsInput => chatbot::send_message_clears_input(ctx).await,
            Scenario::ResponseRendersCleanly => chatbot::response_renders_cleanly(ctx).await,
            Scenario::ScrollAndAccessibility => chatbot::scroll_and_accessibility(ctx).await,
            Scenario::MultilingualLtr => chatbot::multilingual_ltr(ctx).await,
            Scenario::MultilingualRtl => chatbot::multilingual_rtl(ctx).await,
            Scenario::BilingualResponseQuality => {
                gpt_response::bilingual_response_quality(ctx).await
            }
            Scenario::NoHallucination => gpt_response::no_hallucination(ctx).await,
            Scenario::LoadingAndFallback => gpt_response::loading_and_fallback(ctx).await,
            Scenario::LoginSucceeds => login::login_succeeds(ctx).await,
            Scenario::WrongPasswordError => login::wrong_password_error(ctx).await,
            Scenario::ScriptTagSanitised => security::script_tag_sanitised(ctx).await,
            Scenario::IgnoreInstructionsRefused => {
                security::ignore_instructions_refused(ctx).await
            }
        }
    }
}

/// How a scenario body ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioFlow {
    Completed,
    Skipped(String),
}

/// Free-form note published with a scenario result, such as a grader score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// File produced by a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// Everything a scenario body can reach
pub struct ScenarioContext<'a> {
    pub login: LoginPage,
    pub chat: ChatPage,
    pub fixtures: &'a Fixtures,
    pub config: &'a SuiteConfig,
    /// Absent when no grader credentials are configured
    pub validator: Option<&'a AiResponseValidator>,
    pub artifacts_dir: &'a Path,
    pub annotations: Vec<Annotation>,
    pub attachments: Vec<Attachment>,
}

impl<'a> ScenarioContext<'a> {
    pub fn driver(&self) -> &dyn BrowserDriver {
        self.chat.driver().as_ref()
    }

    pub fn annotate(&mut self, kind: impl Into<String>, description: impl Into<String>) {
        self.annotations.push(Annotation {
            kind: kind.into(),
            description: description.into(),
        });
    }

    /// Record a file with its sha256
    pub fn attach(&mut self, name: impl Into<String>, path: &Path) -> E2eResult<()> {
        let sha256 = crate::runner::sha256_file(path)?;
        self.attachments.push(Attachment {
            name: name.into(),
            path: path.to_path_buf(),
            sha256,
        });
        Ok(())
    }
}

/// Fail unless `selector` becomes visible within `timeout`
pub(crate) async fn expect_visible(
    driver: &dyn BrowserDriver,
    selector: &str,
    timeout: Duration,
) -> E2eResult<()> {
    driver
        .wait_for_selector(selector, timeout)
        .await
        .map_err(|e| E2eError::AssertionFailed(format!("{selector} not visible: {e}")))
}
