//! Request-path error taxonomy.
//!
//! Load-time failures are [`crate::config::ConfigError`]. Everything here happens
//! while serving a request and ends up in the error-mapping middleware stage,
//! which turns it into a status code and a JSON body built from
//! [`GatewayError::kind`] and [`GatewayError::public_message`]. `Display` output
//! may name internal hosts and is for logs only.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::aggregate::PartialAggregateError;

/// Errors surfaced by the gateway while handling a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches {method} {path}")]
    NotFound { method: Method, path: String },

    #[error(transparent)]
    Downstream(#[from] DownstreamError),

    #[error("connection pool exhausted for {endpoint}")]
    PoolExhausted { endpoint: String },

    #[error(transparent)]
    PartialAggregate(#[from] PartialAggregateError),

    #[error("rate limit exceeded for {client}")]
    RateLimited { client: String },

    #[error("missing or malformed bearer credentials")]
    Unauthorized,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures talking to a downstream endpoint.
#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("{endpoint} did not respond within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("route '{route}' has no healthy endpoint")]
    NoHealthyEndpoint { route: String },

    #[error("invalid response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    #[error("route deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Downstream(e) => e.status_code(),
            GatewayError::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::PartialAggregate(e) => e.status_code(),
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Downstream(e) => e.kind(),
            GatewayError::PoolExhausted { .. } => "pool_exhausted",
            GatewayError::PartialAggregate(_) => "partial_aggregate",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Message safe to show to clients: no hostnames, no error chains.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::NotFound { method, path } => format!("no route matches {method} {path}"),
            GatewayError::Downstream(e) => e.public_message().to_string(),
            GatewayError::PoolExhausted { .. } => "downstream capacity exhausted".to_string(),
            GatewayError::PartialAggregate(e) => e.to_string(),
            GatewayError::RateLimited { .. } => "rate limit exceeded".to_string(),
            GatewayError::Unauthorized => "missing or malformed bearer credentials".to_string(),
            GatewayError::PayloadTooLarge { limit } => format!("request body exceeds {limit} bytes"),
            GatewayError::BadRequest(_) => "malformed request".to_string(),
            GatewayError::Internal(_) => "internal gateway error".to_string(),
        }
    }
}

impl DownstreamError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DownstreamError::Connect { .. } | DownstreamError::Protocol { .. } => StatusCode::BAD_GATEWAY,
            DownstreamError::Timeout { .. } | DownstreamError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            DownstreamError::NoHealthyEndpoint { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DownstreamError::Connect { .. } => "downstream_unreachable",
            DownstreamError::Timeout { .. } | DownstreamError::DeadlineExceeded(_) => "downstream_timeout",
            DownstreamError::NoHealthyEndpoint { .. } => "no_healthy_endpoint",
            DownstreamError::Protocol { .. } => "downstream_protocol",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            DownstreamError::Connect { .. } => "downstream service unreachable",
            DownstreamError::Timeout { .. } | DownstreamError::DeadlineExceeded(_) => "downstream service timed out",
            DownstreamError::NoHealthyEndpoint { .. } => "no healthy downstream endpoint",
            DownstreamError::Protocol { .. } => "invalid response from downstream service",
        }
    }
}
