//! Timeout and retry helpers for collaborator calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, ReviewError};

/// Retry policy for idempotent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly with each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Errors produced by collaborator calls.
pub trait CallError: Display + Sized {
    fn timed_out(operation: &str, timeout: Duration) -> Self;
    fn is_transient(&self) -> bool;
}

impl CallError for GatewayError {
    fn timed_out(operation: &str, timeout: Duration) -> Self {
        GatewayError::Timeout {
            operation: operation.to_string(),
            timeout,
        }
    }

    fn is_transient(&self) -> bool {
        GatewayError::is_transient(self)
    }
}

impl CallError for ReviewError {
    fn timed_out(_operation: &str, timeout: Duration) -> Self {
        ReviewError::Timeout { timeout }
    }

    fn is_transient(&self) -> bool {
        matches!(self, Self::PollFailed(_) | Self::Timeout { .. })
    }
}

/// Run `fut` with a deadline, mapping expiry to the call's own error type.
pub async fn with_timeout<T, E, F>(operation: &str, timeout: Duration, fut: F) -> Result<T, E>
where
    E: CallError,
    F: Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => {
            tracing::debug!(
                operation,
                elapsed_ms = start.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Collaborator call finished"
            );
            result
        }
        Err(_) => {
            tracing::warn!(operation, timeout_ms = timeout.as_millis() as u64, "Collaborator call timed out");
            Err(E::timed_out(operation, timeout))
        }
    }
}

/// Call `make_call` until it succeeds, fails permanently, or the policy runs
/// out of attempts. Only use for idempotent operations.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut make_call: F) -> Result<T, E>
where
    E: CallError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match make_call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && e.is_transient() => {
                tracing::warn!(operation, attempt, error = %e, "Transient failure, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
