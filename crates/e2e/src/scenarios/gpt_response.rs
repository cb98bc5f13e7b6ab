//! Answer quality graded by the LLM validator

use std::time::Duration;
use tracing::info;

use chatqa_common::markup::contains_any_ignore_case;
use chatqa_common::{AiResponseValidator, ValidationOutcome, Verdict};

use super::{expect_visible, ScenarioContext, ScenarioFlow};
use crate::ensure;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::GradedQuery;

/// Minimum score an answer needs in the quality scenarios
pub const MIN_QUALITY_SCORE: u32 = 70;

const NO_GRADER: &str = "GEMINI_API_KEY is not set";

/// Ask a graded question and publish its score.
/// A grader failure ends the scenario instead of counting as a low score.
async fn grade(
    ctx: &mut ScenarioContext<'_>,
    validator: &AiResponseValidator,
    graded: GradedQuery<'_>,
    label: &str,
) -> E2eResult<Verdict> {
    let outcome = ctx
        .chat
        .ai_response_validation(graded.query, graded.expected, validator)
        .await?;
    let verdict = match outcome {
        ValidationOutcome::Judged(verdict) => verdict,
        ValidationOutcome::Unavailable { reason } => {
            return Err(E2eError::ValidatorUnavailable(reason))
        }
    };

    info!("{}", serde_json::to_string_pretty(&verdict)?);
    let score = verdict.overall_score_out_of_100;
    ctx.annotate(
        format!("{label} Matching Score"),
        format!("Chatbot {label} response matching score value - {score}"),
    );
    Ok(verdict)
}

pub(super) async fn bilingual_response_quality(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    ctx.chat.wait_for_chat_widget().await;
    let Some(validator) = ctx.validator else {
        return Ok(ScenarioFlow::Skipped(NO_GRADER.to_string()));
    };
    let fixtures = ctx.fixtures;

    let questions = [
        ("English", fixtures.queries.english().public_service_one()?),
        ("Arabic", fixtures.queries.arabic().public_service_one()?),
    ];
    for (label, graded) in questions {
        let verdict = grade(ctx, validator, graded, label).await?;
        ensure!(
            verdict.overall_score_out_of_100 >= MIN_QUALITY_SCORE,
            "{label} answer scored {}, below {MIN_QUALITY_SCORE}: {}",
            verdict.overall_score_out_of_100,
            verdict.reasoning
        );
        ensure!(
            verdict.passed_all_rules,
            "{label} answer did not pass all rules: {}",
            verdict.reasoning
        );
    }
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn no_hallucination(ctx: &mut ScenarioContext<'_>) -> E2eResult<ScenarioFlow> {
    ctx.chat.wait_for_chat_widget().await;
    let Some(validator) = ctx.validator else {
        return Ok(ScenarioFlow::Skipped(NO_GRADER.to_string()));
    };
    let fixtures = ctx.fixtures;
    let english = fixtures.queries.english();

    for graded in [english.public_service_one()?, english.public_service_two()?] {
        let verdict = grade(ctx, validator, graded, "English").await?;
        ensure!(
            !verdict.is_hallucinated,
            "answer to {:?} is hallucinated: {}",
            graded.query,
            verdict.reasoning
        );
        ensure!(
            !verdict.is_incomplete_thought,
            "answer to {:?} is an incomplete thought: {}",
            graded.query,
            verdict.reasoning
        );
    }
    Ok(ScenarioFlow::Completed)
}

pub(super) async fn loading_and_fallback(
    ctx: &mut ScenarioContext<'_>,
) -> E2eResult<ScenarioFlow> {
    let fixtures = ctx.fixtures;
    let english = fixtures.queries.english();
    let query = english.fallback_query()?;
    let fallbacks = english.expected_fallback_response()?;
    ctx.chat.wait_for_chat_widget().await;

    ctx.chat.send_message(query).await?;
    ensure!(
        ctx.chat.is_loading_state_visible().await?,
        "no loading text shown after sending {query:?}"
    );

    ctx.chat.wait_for_ai_response().await?;
    let last = ctx.chat.last_message();
    expect_visible(ctx.driver(), &last, Duration::from_secs(5)).await?;
    let text = ctx.driver().inner_text(&last).await?;
    let text = text.trim();
    ensure!(
        contains_any_ignore_case(text, fallbacks),
        "response {text:?} is not a fallback message"
    );
    Ok(ScenarioFlow::Completed)
}
