//! Downstream HTTP client.
//!
//! The dispatcher and the health prober only see the `Transport` trait, so tests
//! can substitute an in-process backend.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::{PoolConfig, TimeoutConfig};

/// Failure below the HTTP status level.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection was never established; the request did not reach the backend.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The request may have been sent but no valid response arrived.
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

/// Sends one request to one endpoint.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>>;
}

/// `hyper` client with keep-alive pooling.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new(timeouts: &TimeoutConfig, pool: &PoolConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeouts.connect_ms)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .build(connector);

        Self { client }
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            match client.request(request).await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    Ok(Response::from_parts(parts, Body::new(body)))
                }
                Err(e) if e.is_connect() => Err(TransportError::Connect(e.to_string())),
                Err(e) => Err(TransportError::Request(e.to_string())),
            }
        })
    }
}
