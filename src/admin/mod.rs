//! Admin API.
//!
//! Bearer-protected JSON views of the live route table, endpoint health and
//! connection accounting. Served on its own listener.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<Gateway>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(gateway: Arc<Gateway>, api_key: &str) -> Router {
    let state = AdminState {
        gateway,
        api_key: Arc::from(api_key),
    };
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/endpoints", get(get_endpoints))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    api_key: &str,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(gateway, api_key))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
