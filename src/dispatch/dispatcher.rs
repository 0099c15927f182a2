//! Request forwarding with retries.
//!
//! # Data Flow
//! ```text
//! ForwardRequest + RequestContext
//!     → TargetSet::select (healthy, untried first)
//!     → ConnectionPool::acquire (scoped slot)
//!     → Transport::send + full body read, under the attempt budget
//!     → classify: final response | retryable failure
//!     → backoff (bounded by deadline) → next endpoint
//! ```
//!
//! # Design Decisions
//! - The request body is buffered once so every attempt can resend it
//! - The response body is read inside the attempt timeout and under a size cap;
//!   the route deadline covers slot wait, connect and full response read
//! - Retries exhausted on a retryable status return that response verbatim;
//!   exhausted on connect failure or timeout return `DownstreamError`

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response};
use futures_util::StreamExt;

use crate::dispatch::pool::{ConnectionPool, PooledConnection};
use crate::dispatch::transport::TransportError;
use crate::error::{DownstreamError, GatewayError};
use crate::health::PassiveHealth;
use crate::http::request::{strip_hop_by_hop, X_REQUEST_ID};
use crate::http::RequestContext;
use crate::load_balancer::Endpoint;
use crate::observability::metrics;
use crate::resilience::{attempt_budget, is_retryable, is_retryable_status, AttemptFailure, RetryPolicy};
use crate::routing::{Downstream, Route};

/// The parts of an inbound request that are forwarded downstream.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
}

impl ForwardRequest {
    /// Buffer `request`, rejecting bodies larger than `limit` bytes.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, GatewayError> {
        let (mut parts, body) = request.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let mut buffer = Vec::with_capacity(declared.unwrap_or(0));
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GatewayError::BadRequest(format!("failed to read request body: {e}")))?;
            if buffer.len() + chunk.len() > limit {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);

        Ok(Self {
            method: parts.method,
            headers: parts.headers,
            query: parts.uri.query().map(str::to_string),
            body: Bytes::from(buffer),
        })
    }
}

enum Attempt {
    Completed(Response<Body>),
    Failed(AttemptFailure, DownstreamError),
    /// Final failure that another attempt would repeat.
    Rejected(DownstreamError),
}

enum CallError {
    Transport(TransportError),
    TooLarge,
}

impl From<TransportError> for CallError {
    fn from(err: TransportError) -> Self {
        CallError::Transport(err)
    }
}

enum LastOutcome {
    Response(Response<Body>),
    Error(DownstreamError),
}

/// Forwards requests to a route's downstream endpoints.
#[derive(Debug)]
pub struct Dispatcher {
    pool: ConnectionPool,
    retry: RetryPolicy,
    passive: PassiveHealth,
    max_response_bytes: usize,
}

impl Dispatcher {
    pub fn new(pool: ConnectionPool, retry: RetryPolicy, passive: PassiveHealth, max_response_bytes: usize) -> Self {
        Self {
            pool,
            retry,
            passive,
            max_response_bytes,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Forward `request` along `route`, retrying per the route policy.
    pub async fn dispatch(
        &self,
        route: &Route,
        request: &ForwardRequest,
        ctx: &mut RequestContext,
    ) -> Result<Response<Body>, GatewayError> {
        let Some(downstream) = route.downstream() else {
            return Err(GatewayError::Internal(format!(
                "route '{}' has no downstream target",
                route.name
            )));
        };

        let path = downstream.path.render(&ctx.params);
        let max_attempts = route.policy.retries.saturating_add(1);
        let mut tried: Vec<usize> = Vec::new();

        loop {
            if ctx.is_expired() {
                return Err(DownstreamError::DeadlineExceeded(route.policy.timeout).into());
            }

            let Some((index, endpoint)) = downstream.targets.select(&tried) else {
                tracing::warn!(request_id = %ctx.correlation_id, route = %route.name, "No healthy endpoint");
                return Err(DownstreamError::NoHealthyEndpoint {
                    route: route.name.clone(),
                }
                .into());
            };
            tried.push(index);
            ctx.attempts += 1;

            let conn = self
                .pool
                .acquire(&endpoint, attempt_budget(route.policy.attempt_timeout, ctx.deadline))
                .await?;
            if ctx.is_expired() {
                return Err(DownstreamError::DeadlineExceeded(route.policy.timeout).into());
            }
            // Time spent waiting for the slot comes out of this attempt.
            let budget = attempt_budget(route.policy.attempt_timeout, ctx.deadline);
            let outbound = build_request(downstream, &endpoint, &path, request, &ctx.correlation_id)?;

            tracing::debug!(
                request_id = %ctx.correlation_id,
                route = %route.name,
                endpoint = %endpoint,
                attempt = ctx.attempts,
                "Forwarding request"
            );

            let (failure, last) = match self.attempt(conn, outbound, budget).await {
                Attempt::Completed(response) if is_retryable_status(response.status()) => {
                    (AttemptFailure::Status(response.status()), LastOutcome::Response(response))
                }
                Attempt::Completed(response) => {
                    metrics::record_attempt(&route.name, "success");
                    return Ok(response);
                }
                Attempt::Failed(failure, err) => (failure, LastOutcome::Error(err)),
                Attempt::Rejected(err) => {
                    metrics::record_attempt(&route.name, "rejected");
                    tracing::warn!(
                        request_id = %ctx.correlation_id,
                        route = %route.name,
                        error = %err,
                        "Downstream response rejected"
                    );
                    return Err(err.into());
                }
            };
            metrics::record_attempt(&route.name, failure.as_str());

            if ctx.attempts >= max_attempts || !is_retryable(&failure) || ctx.is_expired() {
                if let LastOutcome::Error(err) = &last {
                    tracing::warn!(
                        request_id = %ctx.correlation_id,
                        route = %route.name,
                        attempts = ctx.attempts,
                        error = %err,
                        "Downstream request failed"
                    );
                }
                return match last {
                    LastOutcome::Response(response) => Ok(response),
                    LastOutcome::Error(err) => Err(err.into()),
                };
            }

            let delay = self.retry.delay(ctx.attempts, ctx.remaining());
            tracing::info!(
                request_id = %ctx.correlation_id,
                route = %route.name,
                endpoint = %endpoint,
                attempt = ctx.attempts,
                outcome = failure.as_str(),
                delay = ?delay,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, conn: PooledConnection, outbound: Request<Body>, budget: Duration) -> Attempt {
        let endpoint = conn.endpoint().clone();

        let limit = self.max_response_bytes;
        let call = async {
            let response = conn.transport().send(outbound).await?;
            let (mut parts, body) = response.into_parts();
            let mut buffer = Vec::new();
            let mut stream = body.into_data_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| TransportError::Request(e.to_string()))?;
                if buffer.len() + chunk.len() > limit {
                    return Err(CallError::TooLarge);
                }
                buffer.extend_from_slice(&chunk);
            }
            strip_hop_by_hop(&mut parts.headers);
            Ok::<_, CallError>(Response::from_parts(parts, Body::from(buffer)))
        };
        let result = tokio::time::timeout(budget, call).await;
        drop(conn);

        match result {
            Ok(Ok(response)) => {
                self.passive.on_response(&endpoint);
                Attempt::Completed(response)
            }
            Ok(Err(CallError::TooLarge)) => {
                self.passive.on_response(&endpoint);
                Attempt::Rejected(DownstreamError::Protocol {
                    endpoint: endpoint.authority().to_string(),
                    reason: format!("response body exceeds {limit} bytes"),
                })
            }
            Ok(Err(CallError::Transport(TransportError::Connect(reason)))) => {
                self.passive.on_connect_failure(&endpoint);
                Attempt::Failed(
                    AttemptFailure::Connect,
                    DownstreamError::Connect {
                        endpoint: endpoint.authority().to_string(),
                        reason,
                    },
                )
            }
            Ok(Err(CallError::Transport(TransportError::Request(reason)))) => Attempt::Failed(
                AttemptFailure::Interrupted,
                DownstreamError::Protocol {
                    endpoint: endpoint.authority().to_string(),
                    reason,
                },
            ),
            Err(_) => Attempt::Failed(
                AttemptFailure::Timeout,
                DownstreamError::Timeout {
                    endpoint: endpoint.authority().to_string(),
                    timeout: budget,
                },
            ),
        }
    }
}

fn build_request(
    downstream: &Downstream,
    endpoint: &Arc<Endpoint>,
    path: &str,
    request: &ForwardRequest,
    correlation_id: &str,
) -> Result<Request<Body>, GatewayError> {
    let uri = match &request.query {
        Some(query) => format!("{}://{}{}?{}", downstream.scheme, endpoint.authority(), path, query),
        None => format!("{}://{}{}", downstream.scheme, endpoint.authority(), path),
    };

    let mut outbound = Request::builder()
        .method(request.method.clone())
        .uri(uri)
        .body(Body::from(request.body.clone()))
        .map_err(|e| GatewayError::Internal(format!("invalid downstream request: {e}")))?;

    let headers = outbound.headers_mut();
    *headers = request.headers.clone();
    if let Ok(host) = HeaderValue::from_str(endpoint.authority()) {
        headers.insert(header::HOST, host);
    }
    if let Ok(id) = HeaderValue::from_str(correlation_id) {
        headers.insert(X_REQUEST_ID, id);
    }
    Ok(outbound)
}
