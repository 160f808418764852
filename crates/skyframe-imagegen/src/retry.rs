//! Retry classification for image job status checks.
//!
//! Polling is the only retry mechanism: a failed status check is simply
//! tried again on the next tick. This module decides whether a failure is
//! worth another tick:
//! - 5xx server errors are retried
//! - every 4xx client error is permanent (unknown job, bad token, throttling)

use reqwest::StatusCode;

/// Whether a failed status check should be repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Another attempt may succeed
    Retry,
    /// Permanent failure
    NoRetry,
}

/// Classify an HTTP status from a failed status check
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    let decision = if status.is_client_error() {
        RetryDecision::NoRetry
    } else {
        // 5xx, or a 2xx/3xx whose body could not be used
        RetryDecision::Retry
    };

    tracing::debug!("Status {} classified as {:?}", status, decision);
    decision
}
