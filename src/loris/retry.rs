//! Bounded retry of transient portal failures.
//!
//! The portal drops connections mid-request often enough that a crawl of a
//! full term will see several resets. Those are retried by re-running the
//! whole logical operation (including its form reset); everything else is
//! handed back to the caller on the first failure.

use crate::config::RetryConfig;
use crate::loris::client::TransportError;
use crate::loris::errors::LorisApiError;
use crate::utils::fmt_duration;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Fraction of a backoff delay that may be shaved off at random.
const JITTER_FACTOR: f64 = 0.25;

/// How a failed call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection reset: re-run the operation from scratch.
    Transient,
    /// Session cookies rejected: stop the whole crawl.
    SessionExhausted,
    /// Anything else: give up on this call only.
    Terminal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn classify(err: &LorisApiError) -> FailureClass {
        match err {
            LorisApiError::Transport(TransportError::ConnectionReset(_)) => FailureClass::Transient,
            e if e.is_session_fatal() => FailureClass::SessionExhausted,
            _ => FailureClass::Terminal,
        }
    }

    /// Delay before retry number `retry` (0-based): exponential, capped, down-jittered.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff);
        if base.is_zero() {
            return base;
        }
        let jitter = rand::rng().random_range(0.0..JITTER_FACTOR);
        base.mul_f64(1.0 - jitter)
    }

    /// Run `attempt` until it succeeds, fails non-transiently, or the retry
    /// budget is spent.
    ///
    /// Exceeding the budget yields [`LorisApiError::RetriesExhausted`], which
    /// is itself not transient, so nested policies never multiply attempts.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, LorisApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LorisApiError>>,
    {
        let start = Instant::now();
        let mut retries = 0u32;

        loop {
            let err = match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(operation, retries, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if Self::classify(&err) != FailureClass::Transient {
                return Err(err);
            }

            if retries >= self.max_retries {
                return Err(LorisApiError::RetriesExhausted {
                    operation: operation.to_owned(),
                    attempts: retries + 1,
                    elapsed: start.elapsed(),
                    source: anyhow::Error::new(err),
                });
            }

            let delay = self.backoff(retries);
            retries += 1;
            warn!(
                operation,
                retry_attempt = retries,
                max_retries = self.max_retries,
                delay = fmt_duration(delay),
                "Connection lost, reattempting"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Collapse a call's terminal-but-local failure into an empty result.
///
/// Malformed payloads and unexpected statuses are logged and become `T::default()`.
/// Session exhaustion, exhausted retries and failed resets are handed back so
/// the orchestrator can account for them.
pub fn or_empty<T: Default>(
    operation: &str,
    result: Result<T, LorisApiError>,
) -> Result<T, LorisApiError> {
    match result {
        Err(e @ (LorisApiError::ParseFailed { .. }
        | LorisApiError::RequestFailed(_)
        | LorisApiError::Transport(TransportError::Other(_)))) => {
            error!(operation, error = ?e, "request failed, treating result as empty");
            Ok(T::default())
        }
        other => other,
    }
}
