//! Per-request context.
//!
//! Created once the matcher has picked a route and dropped when the response is
//! complete. Travels through the pipeline in the request extensions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Request;
use tokio::time::Instant;

use crate::routing::{Route, RouteMatch};
use crate::routing::template::PathParams;

/// State for one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub route: Arc<Route>,
    pub params: PathParams,
    pub correlation_id: String,
    pub client_addr: Option<SocketAddr>,
    pub started: Instant,
    /// Hard deadline covering every attempt and backoff.
    pub deadline: Instant,
    /// Downstream attempts made so far.
    pub attempts: u32,
}

impl RequestContext {
    pub fn new(matched: RouteMatch, correlation_id: impl Into<String>, client_addr: Option<SocketAddr>) -> Self {
        let started = Instant::now();
        let deadline = started + matched.route.policy.timeout;
        Self {
            route: matched.route,
            params: matched.params,
            correlation_id: correlation_id.into(),
            client_addr,
            started,
            deadline,
            attempts: 0,
        }
    }

    /// Time left before the deadline (zero once passed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Context for one branch of an aggregate. The branch deadline never
    /// outlives the parent's.
    pub fn branch(&self, route: Arc<Route>) -> Self {
        let now = Instant::now();
        let deadline = self.deadline.min(now + route.policy.timeout);
        Self {
            route,
            params: self.params.clone(),
            correlation_id: self.correlation_id.clone(),
            client_addr: self.client_addr,
            started: now,
            deadline,
            attempts: 0,
        }
    }

    /// Borrow the context attached to a request, if any.
    pub fn of<B>(request: &Request<B>) -> Option<&RequestContext> {
        request.extensions().get::<RequestContext>()
    }

    pub fn route_name(&self) -> &str {
        &self.route.name
    }
}
