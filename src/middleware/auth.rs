//! Bearer-token presence check.
//!
//! Token validation belongs to the downstream service; this stage only rejects
//! requests that carry no bearer credentials and forwards the header unchanged.

use axum::body::Body;
use axum::http::{header, Request};

use crate::error::GatewayError;
use crate::middleware::pipeline::{Next, StageResult};

pub async fn process(request: Request<Body>, next: Next<'_>) -> StageResult {
    if !has_bearer_token(&request) {
        return Err(GatewayError::Unauthorized);
    }
    next.run(request).await
}

pub(crate) fn has_bearer_token<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty())
}
