//! Login screen

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{first, BrowserDriver, LoadState};
use crate::ensure;
use crate::error::{E2eError, E2eResult};

pub const LOGIN_WITH_EMAIL_BUTTON: &str = r#"text="Log in with email""#;
pub const ANY_EMAIL_BUTTON: &str = r#"button:has-text("email")"#;
pub const EMAIL_INPUT: &str = "#email";
pub const EMAIL_TEXTBOX: &str = "role=textbox[name=/email/i]";
pub const PASSWORD_INPUT: &str = "#password";
pub const PASSWORD_TEXTBOX: &str = "role=textbox[name=/password/i]";
pub const SUBMIT_BUTTON: &str = r#"button:has-text("Continue"), button:has-text("Log in"), button:has-text("Sign in")"#;

/// Error banners the identity provider shows for bad credentials
pub const LOGIN_ERROR_MESSAGES: &[&str] = &[
    r#"text="Sign in failed. Username or password is incorrect.""#,
    r#"text="The email or password provided is incorrect. Please check and try again.""#,
];
pub const LOGIN_ERROR_PATTERN: &str = "text=/invalid|incorrect|failed|Invalid email format/i";

pub struct LoginPage {
    driver: Arc<dyn BrowserDriver>,
    url: String,
}

impl LoginPage {
    pub fn new(driver: Arc<dyn BrowserDriver>, url: impl Into<String>) -> Self {
        Self {
            driver,
            url: url.into(),
        }
    }

    pub async fn goto(&self) -> E2eResult<()> {
        debug!("Opening {}", self.url);
        self.driver.goto(&self.url, LoadState::NetworkIdle).await
    }

    /// Pick the email login method, if the page offers a choice
    pub async fn click_login_with_email(&self) -> E2eResult<()> {
        for selector in [LOGIN_WITH_EMAIL_BUTTON, ANY_EMAIL_BUTTON] {
            if self.driver.count(selector).await? > 0 {
                self.driver
                    .click(&first(selector), Duration::from_secs(10))
                    .await?;
                self.driver
                    .wait_for_load_state(LoadState::NetworkIdle, Duration::from_secs(30))
                    .await?;
                return Ok(());
            }
        }
        debug!("No email login button; assuming the form is already shown");
        Ok(())
    }

    async fn fill_field(&self, by_id: &str, by_role: &str, value: &str) -> E2eResult<bool> {
        if self.driver.count(by_id).await? > 0 {
            self.driver.fill(by_id, value).await?;
            return Ok(true);
        }
        if self.driver.count(by_role).await? > 0 {
            self.driver.fill(&first(by_role), value).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Fill and submit the login form
    pub async fn login(&self, email: &str, password: &str) -> E2eResult<()> {
        if !self.fill_field(EMAIL_INPUT, EMAIL_TEXTBOX, email).await? {
            warn!("No email field found");
        }
        if !self.fill_field(PASSWORD_INPUT, PASSWORD_TEXTBOX, password).await? {
            warn!("No password field found");
        }

        if self.driver.count(SUBMIT_BUTTON).await? > 0 {
            // The form may navigate away before the click settles
            if let Err(e) = self
                .driver
                .click(&first(SUBMIT_BUTTON), Duration::from_secs(10))
                .await
            {
                warn!("Submit click did not complete: {}", e);
            }
            if let Err(e) = self
                .driver
                .wait_for_load_state(LoadState::NetworkIdle, Duration::from_secs(20))
                .await
            {
                debug!("Network did not settle after submit: {}", e);
            }
        } else if self.driver.count(PASSWORD_INPUT).await? > 0 {
            if let Err(e) = self.driver.press_on(PASSWORD_INPUT, "Enter").await {
                warn!("Submitting with Enter failed: {}", e);
            }
        }

        self.driver
            .wait_for_load_state(LoadState::DomContentLoaded, Duration::from_secs(10))
            .await?;
        self.driver
            .wait_for_load_state(LoadState::NetworkIdle, Duration::from_secs(30))
            .await?;
        info!("Submitted login form for {}", email);
        Ok(())
    }

    /// Selector of the login error currently offered by the page
    async fn login_error_selector(&self) -> E2eResult<String> {
        for selector in LOGIN_ERROR_MESSAGES {
            if self.driver.count(selector).await? > 0 {
                return Ok(first(selector));
            }
        }
        Ok(first(LOGIN_ERROR_PATTERN))
    }

    /// Wait for the login error and screenshot the page into `path`
    pub async fn capture_login_error(&self, path: &Path) -> E2eResult<PathBuf> {
        let error = self.login_error_selector().await?;
        self.driver
            .wait_for_selector(&error, Duration::from_secs(10))
            .await
            .map_err(|e| E2eError::StepFailed {
                step: "login error".to_string(),
                reason: e.to_string(),
            })?;
        ensure!(
            self.driver.is_visible(&error).await?,
            "login error message is not visible"
        );

        self.driver.sleep(Duration::from_millis(250)).await?;
        self.driver.screenshot(path, true).await
    }
}
