//! Chatbot UI behaviour

use std::time::Duration;
use tracing::info;

use chatqa_common::markup::{
    angle_brackets_balanced, contains_angle_brackets, contains_block_markup, has_unclosed_tag,
};
use chatqa_common::{AppLanguage, Role};

use super::{expect_visible, ScenarioContext, ScenarioFlow};
use crate::ensure;
use crate::error::E2eResult;
use crate::pages::chat::selectors::{CHAT_INPUT_CONTAINER, MESSAGE_INPUT};

const VISIBLE_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) async fn widget_loads(ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
    let viewports = ctx.fixtures.generic.viewports;
    for (label, viewport) in [("mobile", viewports.mobile), ("desktop", viewports.desktop)] {
        ctx.chat.set_viewport(viewport).await?;
        ctx.chat.wait_for_chat_widget().await;
        expect_visible(ctx.driver(), CHAT_INPUT_CONTAINER, VISIBLE_TIMEOUT).await?;
        info!("Chat widget visible on {}", label);
    }
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn send_message_clears_input(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    let fixtures = ctx.fixtures;
    let message = fixtures.queries.english().test_query()?;
    ctx.chat.wait_for_chat_widget().await;

    ctx.chat.send_message(message).await?;
    ctx.chat.wait_for_ai_response().await?;

    ensure!(
        ctx.chat.wait_for_user_message(message).await,
        "sent message {message:?} never appeared"
    );
    let texts = ctx.chat.user_message_texts().await?;
    ensure!(
        texts.iter().any(|t| t == message),
        "user messages {texts:?} do not include {message:?}"
    );
    ensure!(
        ctx.chat.is_input_cleared().await?,
        "chat input was not cleared after sending"
    );
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn response_renders_cleanly(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    let fixtures = ctx.fixtures;
    let query = fixtures.queries.english().simple_query()?;
    ctx.chat.wait_for_chat_widget().await;

    ctx.chat.send_message(query).await?;
    ctx.chat.wait_for_ai_response().await?;

    let last = ctx.chat.last_message();
    expect_visible(ctx.driver(), &last, VISIBLE_TIMEOUT).await?;

    let text = ctx.driver().inner_text(&last).await?;
    let text = text.trim();
    ensure!(text.chars().count() > 10, "response too short: {text:?}");
    ensure!(
        !contains_angle_brackets(text),
        "response text shows raw angle brackets: {text:?}"
    );
    ensure!(
        !contains_block_markup(text),
        "response text shows raw markup: {text:?}"
    );

    let html = ctx.driver().inner_html(&last).await?;
    ensure!(
        contains_block_markup(&html),
        "response markup has no <div> or <p> element"
    );
    ensure!(!has_unclosed_tag(&html), "response markup has an unclosed tag");
    ensure!(
        angle_brackets_balanced(&html),
        "response markup has unbalanced angle brackets"
    );
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn scroll_and_accessibility(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    let fixtures = ctx.fixtures;
    let query = fixtures.queries.english().test_query()?;
    ctx.chat.wait_for_chat_widget().await;

    for i in 0..4 {
        ctx.chat.send_message(&format!("{query} {i}")).await?;
        ctx.chat.wait_for_ai_response().await?;
    }

    let last = ctx.chat.last_message();
    expect_visible(ctx.driver(), &last, VISIBLE_TIMEOUT).await?;

    let transcript = ctx.chat.transcript().await?;
    let asked = transcript.texts_for(Role::User).len();
    ensure!(asked >= 4, "expected 4 questions in the transcript, found {asked}");

    ctx.chat.scroll_to_top().await?;
    ctx.chat.scroll_to_bottom().await?;
    expect_visible(ctx.driver(), &last, VISIBLE_TIMEOUT).await?;

    let driver = ctx.driver();
    ensure!(
        driver.is_editable(MESSAGE_INPUT).await?,
        "chat input is not editable"
    );
    driver.focus(MESSAGE_INPUT).await?;
    ensure!(
        driver.is_focused(MESSAGE_INPUT).await?,
        "chat input does not take focus"
    );
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn multilingual_ltr(ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
    check_directions(ctx, AppLanguage::English).await
}

pub(super) async fn multilingual_rtl(ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
    check_directions(ctx, AppLanguage::Arabic).await
}

/// Ask one English and one Arabic question with the app in `app` language
async fn check_directions(
    ctx: &mut ScenarioContext<'_>,
    app: AppLanguage,
) -> E2eResult<ScenarioFlow> {
    let fixtures = ctx.fixtures;
    let expected = fixtures.generic.text_directions;
    ctx.chat.wait_for_chat_widget().await;
    ctx.chat.set_app_language(app).await?;

    let questions = [
        (AppLanguage::English, fixtures.queries.english().simple_query()?),
        (AppLanguage::Arabic, fixtures.queries.arabic().simple_query()?),
    ];
    for (query_language, query) in questions {
        let want = expected.for_pair(app, query_language);
        let got = ctx.chat.text_direction(query).await?;
        ensure!(
            got == Some(want),
            "{query_language} answer in {app} app has direction {got:?}, expected {want}"
        );
        info!("{} answer in {} app is {}", query_language, app, want);
    }
    Ok(ScenarioFlow::Completed)
}
