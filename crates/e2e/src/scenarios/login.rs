//! Email login, run from a logged-out browser

use tracing::{debug, info};

use super::{ScenarioContext, ScenarioFlow};
use crate::ensure;
use crate::error::E2eResult;

pub(super) async fn login_succeeds(ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
    let config = ctx.config;
    let credentials = &config.credentials;
    ctx.login.click_login_with_email().await?;
    ctx.login
        .login(&credentials.email, &credentials.password)
        .await?;

    let visible = match ctx.chat.is_welcome_text_displayed().await {
        Ok(visible) => visible,
        Err(e) => {
            debug!("Welcome text did not show: {}", e);
            false
        }
    };
    ensure!(visible, "welcome text is not displayed after login");
    ctx.chat.verify_welcome_user(&credentials.email).await?;
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn wrong_password_error(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    let config = ctx.config;
    let credentials = &config.credentials;
    if credentials.wrong_password.is_empty() {
        return Ok(ScenarioFlow::Skipped(
            "LOGIN_WRONG_PASSWORD is not set".to_string(),
        ));
    }

    ctx.login.click_login_with_email().await?;
    ctx.login
        .login(&credentials.email, &credentials.wrong_password)
        .await?;

    let path = ctx.artifacts_dir.join("login-error-page.png");
    let saved = ctx.login.capture_login_error(&path).await?;
    info!("Login error captured at {}", saved.display());
    ctx.attach("login-error-page", &saved)?;
    Ok(ScenarioFlow::Completed)
}
