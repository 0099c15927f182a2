//! Error → response mapping.
//!
//! # Design Decisions
//! - One JSON shape for every gateway-generated error:
//!   `{ "error": kind, "message": public message, "correlation_id": id }`
//! - Partial aggregates render their merged data with a 207 instead
//! - Internal hostnames and error chains stay in logs

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use serde_json::json;

use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;

/// Build the client-visible response for `err`.
pub fn error_response(err: &GatewayError, correlation_id: &str) -> Response<Body> {
    let body = match err {
        GatewayError::PartialAggregate(partial) => partial.body(),
        _ => json!({
            "error": err.kind(),
            "message": err.public_message(),
            "correlation_id": correlation_id,
        }),
    };

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = err.status_code();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(id) = HeaderValue::from_str(correlation_id) {
        if !correlation_id.is_empty() {
            response.headers_mut().insert(X_REQUEST_ID, id);
        }
    }
    response
}
