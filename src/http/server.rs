//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback handler
//! - Wire up middleware (request ID, tracing, in-flight limit)
//! - Run the health monitor and the config reload task next to the listener
//! - Serve until the shutdown signal fires, then drain

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigError, GatewayConfig};
use crate::dispatch::{HyperTransport, Transport};
use crate::gateway::Gateway;
use crate::health::HealthMonitor;

/// The public listener: every request goes through [`Gateway::handle`].
pub struct GatewayServer {
    gateway: Arc<Gateway>,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Build a server that forwards over real HTTP connections.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let transport = Arc::new(HyperTransport::new(&config.timeouts, &config.pool));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        let gateway = Arc::new(Gateway::new(&config, transport)?);
        Ok(Self { gateway, config })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    fn build_router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(self.gateway.clone())
            .layer(ConcurrencyLimitLayer::new(self.config.listener.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configs arriving on `config_updates` are applied with an atomic table
    /// swap; a config that fails to build is logged and the old table stays.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.gateway.router().current().len(),
            "Gateway listener starting"
        );

        let monitor = HealthMonitor::new(
            self.gateway.router().clone(),
            self.config.health_check.clone(),
            self.gateway.dispatcher().pool().transport().clone(),
        );
        tokio::spawn(monitor.run(shutdown.resubscribe()));

        let gateway = self.gateway.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => {
                        let Some(config) = update else { break };
                        match gateway.reload(&config) {
                            Ok(()) => tracing::info!(
                                routes = gateway.router().current().len(),
                                "Route table swapped"
                            ),
                            Err(e) => tracing::error!(error = %e, "Rejected config update, keeping current routes"),
                        }
                    }
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.build_router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Gateway listener stopped");
        Ok(())
    }
}

async fn proxy_handler(State(gateway): State<Arc<Gateway>>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    gateway.handle(request, client_addr).await
}
