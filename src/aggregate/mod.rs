//! Fan-out aggregation.
//!
//! # Data Flow
//! ```text
//! Aggregate route matched
//!     → fan_out: one dispatch per branch route, concurrently, each with a
//!       deadline no later than the aggregate's
//!     → aggregate: merge JSON bodies under each branch key
//!         all ok      → 200 merged object
//!         some failed → PartialAggregateError (207, merged data + _diagnostics)
//!         all failed  → PartialAggregateError (502, _diagnostics only)
//! ```
//!
//! # Design Decisions
//! - Branches skip their own middleware; the aggregate's pipeline wraps the whole
//!   fan-out
//! - Non-JSON branch bodies are embedded as strings
//! - A failed branch always gets a diagnostics entry

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response, StatusCode};
use futures_util::future::join_all;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::dispatch::{Dispatcher, ForwardRequest};
use crate::error::{DownstreamError, GatewayError};
use crate::http::RequestContext;
use crate::routing::table::{AggregatePlan, DIAGNOSTICS_KEY};

/// Why one branch did not contribute data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    pub key: String,
    pub status: u16,
    pub error: String,
}

/// Some or all branches of an aggregate failed.
#[derive(Debug, Error)]
#[error("{} of {} aggregate branches failed", .failures.len(), .total)]
pub struct PartialAggregateError {
    /// Merged data from the branches that succeeded.
    pub data: Map<String, Value>,
    pub failures: Vec<BranchFailure>,
    pub total: usize,
}

impl PartialAggregateError {
    /// 207 when anything succeeded, 502 when nothing did.
    pub fn status_code(&self) -> StatusCode {
        if self.data.is_empty() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::MULTI_STATUS
        }
    }

    /// Merged data plus a `_diagnostics` entry per failed branch.
    pub fn body(&self) -> Value {
        let diagnostics: Map<String, Value> = self
            .failures
            .iter()
            .map(|f| (f.key.clone(), json!({ "status": f.status, "error": f.error })))
            .collect();

        let mut body = self.data.clone();
        body.insert(DIAGNOSTICS_KEY.to_string(), Value::Object(diagnostics));
        Value::Object(body)
    }
}

/// A buffered branch response.
#[derive(Debug)]
pub struct BranchResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Outcome of one branch.
#[derive(Debug)]
pub struct BranchResult {
    pub key: String,
    pub outcome: Result<BranchResponse, GatewayError>,
}

/// Dispatch every branch of `plan` concurrently and wait for all of them.
pub async fn fan_out(
    dispatcher: &Dispatcher,
    plan: &AggregatePlan,
    request: &ForwardRequest,
    ctx: &RequestContext,
) -> Vec<BranchResult> {
    let branches = plan.branches.iter().map(|route| {
        let mut branch_ctx = ctx.branch(route.clone());
        async move {
            let budget = branch_ctx.remaining();
            let outcome = match tokio::time::timeout(budget, dispatcher.dispatch(route, request, &mut branch_ctx)).await {
                Ok(Ok(response)) => buffer(response).await,
                Ok(Err(err)) => Err(err),
                Err(_) => Err(DownstreamError::DeadlineExceeded(budget).into()),
            };

            if let Err(err) = &outcome {
                tracing::debug!(
                    request_id = %branch_ctx.correlation_id,
                    route = %route.name,
                    error = %err,
                    "Aggregate branch failed"
                );
            }
            BranchResult {
                key: route.key.clone(),
                outcome,
            }
        }
    });

    join_all(branches).await
}

async fn buffer(response: Response<Body>) -> Result<BranchResponse, GatewayError> {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| GatewayError::Internal(format!("failed to read branch body: {e}")))?;
    Ok(BranchResponse { status, body })
}

/// Merge branch results into one response.
pub fn aggregate(results: Vec<BranchResult>) -> Result<Response<Body>, GatewayError> {
    let total = results.len();
    let mut data = Map::new();
    let mut failures = Vec::new();

    for result in results {
        match result.outcome {
            Ok(response) if response.status.is_success() => {
                data.insert(result.key, decode(&response.body));
            }
            Ok(response) => failures.push(BranchFailure {
                key: result.key,
                status: response.status.as_u16(),
                error: "downstream_status".to_string(),
            }),
            Err(err) => failures.push(BranchFailure {
                key: result.key,
                status: err.status_code().as_u16(),
                error: err.kind().to_string(),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(PartialAggregateError { data, failures, total }.into());
    }

    let mut response = Response::new(Body::from(Value::Object(data).to_string()));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn decode(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::dispatch::test_support::{dispatcher, MockReply, MockTransport};
    use crate::routing::{RouteKind, RouteTable};
    use axum::http::{HeaderMap, Method};
    use std::time::Duration;

    const CONFIG: &str = r#"
        [[routes]]
        name = "bill"
        upstream = "/QueryBill/query/{account}"
        [routes.downstream]
        path = "/bill/{account}"
        endpoints = [{ host = "billing", port = 8080 }]

        [[routes]]
        name = "detail"
        key = "details"
        upstream = "/QueryBillDetailed/query-detailed/{account}"
        retries = 0
        [routes.downstream]
        path = "/detail/{account}"
        endpoints = [{ host = "details", port = 8080 }]

        [[aggregates]]
        name = "overview"
        upstream = "/overview/{account}"
        routes = ["bill", "detail"]
        timeout_ms = 500
    "#;

    fn ok(key: &str, body: &'static str) -> BranchResult {
        BranchResult {
            key: key.to_string(),
            outcome: Ok(BranchResponse {
                status: StatusCode::OK,
                body: Bytes::from_static(body.as_bytes()),
            }),
        }
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn run(transport: std::sync::Arc<MockTransport>) -> Result<Response<Body>, GatewayError> {
        let table = RouteTable::build(&parse_config(CONFIG).unwrap()).unwrap();
        let matched = table.lookup(&Method::GET, "/overview/7").unwrap();
        let ctx = RequestContext::new(matched, "req-agg", None);
        let RouteKind::Aggregate(plan) = &ctx.route.kind else {
            panic!("expected aggregate route");
        };
        let request = ForwardRequest {
            method: Method::GET,
            headers: HeaderMap::new(),
            query: None,
            body: Bytes::new(),
        };

        let dispatcher = dispatcher(transport);
        aggregate(fan_out(&dispatcher, plan, &request, &ctx).await)
    }

    #[tokio::test]
    async fn merges_json_and_text_bodies() {
        let response = aggregate(vec![ok("bill", r#"{"amount": 12}"#), ok("note", "plain text")]).unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["bill"]["amount"], 12);
        assert_eq!(body["note"], "plain text");
    }

    #[test]
    fn partial_failure_is_207_with_diagnostics() {
        let failed = BranchResult {
            key: "details".to_string(),
            outcome: Ok(BranchResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: Bytes::from_static(b"boom"),
            }),
        };
        let err = aggregate(vec![ok("bill", r#"{"amount": 12}"#), failed]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::MULTI_STATUS);

        let GatewayError::PartialAggregate(partial) = err else {
            panic!("expected partial aggregate");
        };
        let body = partial.body();
        assert_eq!(body["bill"]["amount"], 12);
        assert_eq!(body["_diagnostics"]["details"]["status"], 500);
        assert_eq!(body["_diagnostics"]["details"]["error"], "downstream_status");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn fan_out_merges_branches() {
        let transport = MockTransport::new(|req| match req.uri().path() {
            "/bill/7" => MockReply::Status(200, r#"{"amount": 12}"#),
            "/detail/7" => MockReply::Status(200, r#"[{"item": "water"}]"#),
            _ => MockReply::Status(404, ""),
        });
        let response = run(transport.clone()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["bill"]["amount"], 12);
        assert_eq!(body["details"][0]["item"], "water");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn one_ok_one_500_renders_207() {
        let transport = MockTransport::new(|req| match req.uri().path() {
            "/bill/7" => MockReply::Status(200, r#"{"amount": 12}"#),
            _ => MockReply::Status(500, "internal"),
        });
        let err = run(transport).await.unwrap_err();

        let response = crate::http::response::error_response(&err, "req-agg");
        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        let body = json_body(response).await;
        assert_eq!(body["bill"]["amount"], 12);
        assert_eq!(body["_diagnostics"]["details"]["status"], 500);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_branch_is_reported_not_dropped() {
        let transport = MockTransport::new(|req| match req.uri().path() {
            "/bill/7" => MockReply::Status(200, r#"{"amount": 12}"#),
            _ => MockReply::Delayed(Duration::from_secs(5), 200, "{}"),
        });
        let err = run(transport).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::MULTI_STATUS);

        let GatewayError::PartialAggregate(partial) = err else {
            panic!("expected partial aggregate");
        };
        assert_eq!(partial.failures.len(), 1);
        assert_eq!(partial.failures[0].key, "details");
        assert_eq!(partial.failures[0].status, 504);
    }

    #[tokio::test(start_paused = true)]
    async fn all_branches_failing_is_502() {
        let transport = MockTransport::new(|_| MockReply::ConnectError);
        let err = run(transport).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let GatewayError::PartialAggregate(partial) = err else {
            panic!("expected partial aggregate");
        };
        assert_eq!(partial.failures.len(), 2);
        assert!(partial.data.is_empty());
    }
}
