//! Request handling core.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → Router::current().lookup(method, path)     (404 if none)
//!     → RequestContext (route, params, deadline) into extensions
//!     → route.pipeline (error_mapping → stages…)
//!     → RouteTerminal
//!         Proxy:     ForwardRequest → Dispatcher::dispatch
//!         Aggregate: ForwardRequest → fan_out → aggregate
//!     → Response<Body>
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::aggregate::{aggregate, fan_out};
use crate::config::{ConfigError, GatewayConfig};
use crate::dispatch::{ConnectionPool, Dispatcher, ForwardRequest, Transport};
use crate::error::GatewayError;
use crate::health::PassiveHealth;
use crate::http::request::correlation_id;
use crate::http::response::error_response;
use crate::http::RequestContext;
use crate::middleware::{StageResult, Terminal};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::routing::{RouteKind, Router};

/// Matches, runs middleware and dispatches every inbound request.
#[derive(Debug)]
pub struct Gateway {
    router: Arc<Router>,
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        let pool = ConnectionPool::new(transport, Duration::from_millis(config.pool.acquire_timeout_ms));
        Ok(Self {
            router: Arc::new(Router::from_config(config)?),
            dispatcher: Dispatcher::new(
                pool,
                RetryPolicy::new(&config.retries),
                PassiveHealth::new(config.health_check.unhealthy_threshold),
                config.listener.max_response_bytes,
            ),
            max_body_bytes: config.listener.max_body_bytes,
        })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Swap in a route table built from `config`.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        self.router.reload(config)
    }

    /// Handle one request end to end. Never fails; errors become responses.
    pub async fn handle(&self, mut request: Request<Body>, client_addr: Option<SocketAddr>) -> Response<Body> {
        let correlation_id = correlation_id(&request);

        let Some(matched) = self.router.lookup(request.method(), request.uri().path()) else {
            let started = Instant::now();
            let err = GatewayError::NotFound {
                method: request.method().clone(),
                path: request.uri().path().to_string(),
            };
            tracing::debug!(request_id = %correlation_id, error = %err, "No route matched");
            metrics::record_request("none", request.method().as_str(), 404, started.elapsed());
            return error_response(&err, &correlation_id);
        };

        let ctx = RequestContext::new(matched, correlation_id, client_addr);
        let route = ctx.route.clone();
        request.extensions_mut().insert(ctx);

        let terminal = RouteTerminal {
            dispatcher: &self.dispatcher,
            max_body_bytes: self.max_body_bytes,
        };
        route.pipeline.handle(request, &terminal).await
    }
}

/// Innermost pipeline step: forward to the route's downstream(s).
struct RouteTerminal<'a> {
    dispatcher: &'a Dispatcher,
    max_body_bytes: usize,
}

impl Terminal for RouteTerminal<'_> {
    fn call(&self, mut request: Request<Body>) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let mut ctx = request
                .extensions_mut()
                .remove::<RequestContext>()
                .ok_or_else(|| GatewayError::Internal("request context missing".to_string()))?;
            let route = ctx.route.clone();
            let forward = ForwardRequest::from_request(request, self.max_body_bytes).await?;

            match &route.kind {
                RouteKind::Proxy(_) => self.dispatcher.dispatch(&route, &forward, &mut ctx).await,
                RouteKind::Aggregate(plan) => aggregate(fan_out(self.dispatcher, plan, &forward, &ctx).await),
            }
        })
    }
}
