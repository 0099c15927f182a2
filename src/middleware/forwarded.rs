//! `X-Forwarded-*` headers for the downstream service.

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};

use crate::http::RequestContext;
use crate::middleware::pipeline::{Next, StageResult};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

pub async fn process(mut request: Request<Body>, next: Next<'_>) -> StageResult {
    let client_ip = RequestContext::of(&request)
        .and_then(|ctx| ctx.client_addr)
        .map(|addr| addr.ip().to_string());

    let host = request.headers().get(header::HOST).cloned();
    let headers = request.headers_mut();

    if let Some(ip) = client_ip {
        let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST, host);
    }

    next.run(request).await
}
