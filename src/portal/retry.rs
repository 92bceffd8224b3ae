//! Bounded retry for portal calls.
//!
//! Only transient failures are retried: transport errors, timeouts, and
//! 408/429/5xx responses. Everything else is returned on the first attempt.

use std::time::Duration;

use super::{fetch_bounded, PortalSession, RawResponse};
use crate::error::PortalError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    /// One retry.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

fn retry_delay(attempt: u32, policy: &RetryPolicy, retry_after_secs: Option<u64>) -> Duration {
    if let Some(secs) = retry_after_secs {
        return Duration::from_secs(secs.min(30));
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % (base / 2 + 1);
    Duration::from_millis(base.saturating_add(jitter))
}

/// Fetch `path`, retrying transient failures up to `policy.max_attempts`
/// total attempts. Each attempt is individually bounded by `timeout`.
/// Returns a 2xx response or the last error.
pub async fn fetch_with_retry(
    session: &dyn PortalSession,
    path: &str,
    params: &[(&str, &str)],
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<RawResponse, PortalError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = fetch_bounded(session, path, params, timeout).await;
        let retry_after = outcome.as_ref().ok().and_then(|r| r.retry_after_secs);
        let result = outcome.and_then(RawResponse::into_success);

        match result {
            Ok(resp) => return Ok(resp),
            Err(err) if err.is_retryable() && attempt < attempts => {
                let delay = retry_delay(attempt, policy, retry_after);
                log::warn!(
                    "portal retry {}/{} for {} after: {} (sleep {:?})",
                    attempt,
                    attempts,
                    path,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
