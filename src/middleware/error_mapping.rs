//! Outermost stage: turns any `GatewayError` into a JSON diagnostic response.

use axum::body::Body;
use axum::http::Request;

use crate::http::response::error_response;
use crate::http::RequestContext;
use crate::middleware::pipeline::{Next, StageResult};

pub async fn process(request: Request<Body>, next: Next<'_>) -> StageResult {
    let (correlation_id, route) = match RequestContext::of(&request) {
        Some(ctx) => (ctx.correlation_id.clone(), ctx.route.name.clone()),
        None => (String::new(), String::new()),
    };

    match next.run(request).await {
        Ok(response) => Ok(response),
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                tracing::warn!(request_id = %correlation_id, route = %route, status = status.as_u16(), error = %err, "Request failed");
            } else {
                tracing::debug!(request_id = %correlation_id, route = %route, status = status.as_u16(), error = %err, "Request rejected");
            }
            Ok(error_response(&err, &correlation_id))
        }
    }
}
