//! Browser automation capability used by the page objects

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatqa_common::Viewport;

use crate::error::E2eResult;

/// Page load milestones a navigation can wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Primitive browser operations.
///
/// Selectors use Playwright syntax. Operations taking a `timeout` are
/// single-shot condition waits that fail once it expires.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn clear(&self, selector: &str) -> E2eResult<()>;

    /// Type into whatever element has focus
    async fn type_text(&self, text: &str) -> E2eResult<()>;

    /// Press a key on whatever element has focus
    async fn press(&self, key: &str) -> E2eResult<()>;

    async fn press_on(&self, selector: &str, key: &str) -> E2eResult<()>;

    async fn focus(&self, selector: &str) -> E2eResult<()>;

    async fn count(&self, selector: &str) -> E2eResult<usize>;

    /// Whether the first match is visible; false when nothing matches
    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn is_editable(&self, selector: &str) -> E2eResult<bool>;

    async fn is_focused(&self, selector: &str) -> E2eResult<bool>;

    async fn inner_text(&self, selector: &str) -> E2eResult<String>;

    async fn inner_html(&self, selector: &str) -> E2eResult<String>;

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>>;

    /// Run `script`, a JS function `(element, arg) => ...`, on one element
    async fn evaluate(&self, selector: &str, script: &str, arg: Value) -> E2eResult<Value>;

    /// Run `script`, a JS function `(elements, arg) => ...`, on all matches
    async fn evaluate_all(&self, selector: &str, script: &str, arg: Value) -> E2eResult<Value>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<PathBuf>;

    async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()>;

    /// Persist cookies and local storage so later sessions start logged in
    async fn save_storage_state(&self, path: &Path) -> E2eResult<()>;

    /// Messages of the `alert`/`confirm`/`prompt` dialogs the page opened,
    /// oldest first. Dialogs are dismissed as they appear.
    async fn dialogs(&self) -> E2eResult<Vec<String>>;

    async fn sleep(&self, duration: Duration) -> E2eResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()>;
}

/// Last element matched by `selector`
pub fn last(selector: &str) -> String {
    format!("{selector} >> nth=-1")
}

/// First element matched by `selector`
pub fn first(selector: &str) -> String {
    format!("{selector} >> nth=0")
}

/// `child` searched inside the elements matched by `parent`
pub fn within(parent: &str, child: &str) -> String {
    format!("{parent} >> {child}")
}
