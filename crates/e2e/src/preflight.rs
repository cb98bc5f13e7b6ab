//! Reachability check for the chatbot before any browser is launched

use std::time::Duration;
use tracing::{info, warn};

use chatqa_common::{poll_until, RetryPolicy, WaitOutcome};

use crate::error::{E2eError, E2eResult};

const PREFLIGHT_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `url` until it answers with a non-5xx status or `timeout` expires
pub async fn wait_until_reachable(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    info!("Waiting for chatbot at {}...", url);
    let client = &client;
    let policy = RetryPolicy::new(timeout, PREFLIGHT_INTERVAL);
    let outcome = poll_until(policy, || async move {
        let resp = client.get(url).send().await?;
        let status = resp.status();
        // Auth redirects and 4xx login walls still mean the app is up
        if status.is_server_error() {
            warn!("Chatbot returned {}", status);
            return Err(chatqa_common::Error::Status(status.to_string()));
        }
        Ok::<_, chatqa_common::Error>(Some(status))
    })
    .await;

    match outcome {
        WaitOutcome::Ready {
            value, attempts, ..
        } => {
            info!("Chatbot reachable at {} ({}, attempt {})", url, value, attempts);
            Ok(())
        }
        WaitOutcome::TimedOut {
            attempts,
            last_error,
            ..
        } => Err(E2eError::Unreachable {
            url: url.to_string(),
            reason: format!(
                "{} after {} attempt(s)",
                last_error.unwrap_or_else(|| "no response".to_string()),
                attempts
            ),
        }),
    }
}
