//! Bounded fixed-interval polling
//!
//! A [`RetryPolicy`] makes the cadence explicit: probe, sleep `interval`,
//! probe again, for at most `timeout / interval` attempts and never past
//! the `timeout` deadline. The outcome is returned as a [`WaitOutcome`] so
//! the caller decides whether running out of time is fatal or ignorable.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Fixed-interval retry policy bounded by a hard timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two probes
    pub interval: Duration,

    /// Hard bound on the whole wait
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    /// Number of probes the policy allows (always at least one)
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let attempts = self.timeout.as_nanos() / self.interval.as_nanos();
        attempts.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for RetryPolicy {
    /// 120 s at a 3 s cadence
    fn default() -> Self {
        Self::from_millis(120_000, 3_000)
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        /// Last probe error seen, if any probe failed
        last_error: Option<String>,
    },
}

impl<T> WaitOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Ready { attempts, .. } | WaitOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The value, discarding a timeout
    pub fn ready(self) -> Option<T> {
        match self {
            WaitOutcome::Ready { value, .. } => Some(value),
            WaitOutcome::TimedOut { .. } => None,
        }
    }

    /// Treat a timeout as fatal, describing the wait with `what`
    pub fn into_result(self, what: &str) -> Result<T> {
        match self {
            WaitOutcome::Ready { value, .. } => Ok(value),
            WaitOutcome::TimedOut {
                attempts,
                elapsed,
                last_error,
            } => {
                let what = match last_error {
                    Some(err) => format!("{what} (last error: {err})"),
                    None => what.to_string(),
                };
                Err(Error::Timeout {
                    what,
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                })
            }
        }
    }
}

/// Probe until it yields `Some(value)` or the policy is exhausted.
///
/// A probe error counts as "not ready yet"; the last one is reported in the
/// timeout outcome. A probe that is still running at the deadline is
/// abandoned.
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut probe: F) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < max_attempts {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        match timeout(remaining, probe()).await {
            Ok(Ok(Some(value))) => {
                return WaitOutcome::Ready {
                    value,
                    attempts,
                    elapsed: start.elapsed(),
                };
            }
            Ok(Ok(None)) => trace!(attempts, "probe not ready"),
            Ok(Err(e)) => {
                debug!(attempts, "probe failed: {}", e);
                last_error = Some(e.to_string());
            }
            Err(_) => {
                last_error = Some("probe still running at the deadline".to_string());
                break;
            }
        }

        let now = Instant::now();
        if attempts >= max_attempts || now >= deadline {
            break;
        }
        sleep(policy.interval.min(deadline - now)).await;
    }

    WaitOutcome::TimedOut {
        attempts,
        elapsed: start.elapsed(),
        last_error,
    }
}
