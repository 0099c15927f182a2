//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every endpoint of the current route table
//! - Update endpoint health state based on results
//! - Restore endpoints that passive checks took out

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::dispatch::Transport;
use crate::load_balancer::Endpoint;
use crate::observability::metrics;
use crate::routing::Router;

pub struct HealthMonitor {
    router: Arc<Router>,
    config: HealthCheckConfig,
    transport: Arc<dyn Transport>,
}

impl HealthMonitor {
    pub fn new(router: Arc<Router>, config: HealthCheckConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            router,
            config,
            transport,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every endpoint once, concurrently.
    pub async fn check_all(&self) {
        let table = self.router.current();
        join_all(table.endpoints().iter().map(|endpoint| self.check(endpoint))).await;
    }

    async fn check(&self, endpoint: &Arc<Endpoint>) {
        let uri = format!("http://{}{}", endpoint.authority(), endpoint.probe_path());
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::USER_AGENT, "api-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "Failed to build health check request");
                return;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let healthy = match time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                let success = status.is_success() || status.is_redirection();
                if !success {
                    tracing::debug!(endpoint = %endpoint, status = %status, "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(endpoint = %endpoint, "Health check failed: timeout");
                false
            }
        };

        let transition = if healthy {
            endpoint.health().record_success(self.config.healthy_threshold)
        } else {
            endpoint.health().record_failure(self.config.unhealthy_threshold)
        };

        if let Some(t) = transition {
            tracing::info!(
                endpoint = %endpoint,
                from = t.from.as_str(),
                to = t.to.as_str(),
                "Endpoint health changed"
            );
        }
        metrics::record_endpoint_health(endpoint.authority(), endpoint.is_healthy());
    }
}
