//! Retry classification and policy.
//!
//! # Responsibilities
//! - Classify attempt outcomes as retryable or final
//! - Compute the delay before the next attempt
//!
//! # Design Decisions
//! - Connect failures, timeouts, broken connections and 502/503/504 are
//!   retryable whatever the request method
//! - 4xx and every other status are final

use std::time::Duration;

use axum::http::StatusCode;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Why a single downstream attempt did not produce a final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    Connect,
    /// The request was sent but the connection broke before a response.
    Interrupted,
    Timeout,
    Status(StatusCode),
}

impl AttemptFailure {
    /// Label used for the `outcome` metric dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptFailure::Connect => "connect_error",
            AttemptFailure::Interrupted => "interrupted",
            AttemptFailure::Timeout => "timeout",
            AttemptFailure::Status(_) => "retryable_status",
        }
    }
}

/// Statuses that mark a downstream as temporarily unable to serve.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Whether another attempt may follow `failure`.
pub fn is_retryable(failure: &AttemptFailure) -> bool {
    match failure {
        AttemptFailure::Connect | AttemptFailure::Interrupted | AttemptFailure::Timeout => true,
        AttemptFailure::Status(status) => is_retryable_status(*status),
    }
}

/// Backoff settings shared by every route.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Delay before retry number `retry` (1-based), bounded by `remaining`.
    pub fn delay(&self, retry: u32, remaining: Duration) -> Duration {
        calculate_backoff(retry, self.base_delay_ms, self.max_delay_ms).min(remaining)
    }
}
