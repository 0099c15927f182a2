//! Request identification and hop-by-hop header handling.
//!
//! # Design Decisions
//! - Request ID is assigned by `SetRequestIdLayer` as early as possible; the
//!   handler only reads it back (and mints one if the layer was bypassed)
//! - Hop-by-hop headers are connection-scoped and never forwarded either way

use axum::http::{header, HeaderMap, HeaderName, Request};
use uuid::Uuid;

/// Correlation header shared with downstream services.
pub const X_REQUEST_ID: &str = "x-request-id";

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// The request's correlation id, or a fresh one.
pub fn correlation_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
