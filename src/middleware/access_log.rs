//! Structured access log plus request metrics.

use axum::body::Body;
use axum::http::Request;
use tokio::time::Instant;

use crate::http::RequestContext;
use crate::middleware::pipeline::{Next, StageResult};
use crate::observability::metrics;

pub async fn process(request: Request<Body>, next: Next<'_>) -> StageResult {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let (correlation_id, route) = match RequestContext::of(&request) {
        Some(ctx) => (ctx.correlation_id.clone(), ctx.route.name.clone()),
        None => (String::new(), String::new()),
    };

    let result = next.run(request).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(err) => err.status_code(),
    };
    let elapsed = started.elapsed();

    tracing::info!(
        request_id = %correlation_id,
        route = %route,
        method = %method,
        path = %path,
        status = status.as_u16(),
        latency_ms = elapsed.as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(&route, method.as_str(), status.as_u16(), elapsed);

    result
}
