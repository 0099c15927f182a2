use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::Strategy;
use crate::routing::RouteKind;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub endpoints: usize,
    pub connections_acquired: u64,
    pub connections_released: u64,
}

#[derive(Serialize)]
pub struct RouteStatus {
    pub name: String,
    pub upstream: String,
    pub methods: Vec<String>,
    pub kind: &'static str,
    /// Downstream URL templates, or branch route names for aggregates.
    pub target: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub middleware: Vec<&'static str>,
    pub timeout_ms: u128,
    pub attempt_timeout_ms: u128,
    pub retries: u32,
}

#[derive(Serialize)]
pub struct EndpointStatus {
    pub address: String,
    pub health: &'static str,
    pub healthy: bool,
    pub active_connections: usize,
    pub max_connections: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.gateway.router().current();
    let stats = state.gateway.dispatcher().pool().stats();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: table.len(),
        endpoints: table.endpoints().len(),
        connections_acquired: stats.acquired,
        connections_released: stats.released,
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteStatus>> {
    let table = state.gateway.router().current();
    let routes = table
        .routes()
        .iter()
        .map(|route| {
            let (kind, target, strategy) = match &route.kind {
                RouteKind::Proxy(downstream) => (
                    "proxy",
                    downstream
                        .targets
                        .endpoints()
                        .iter()
                        .map(|e| format!("{}://{}{}", downstream.scheme, e.authority(), downstream.path))
                        .collect(),
                    Some(downstream.targets.strategy()),
                ),
                RouteKind::Aggregate(plan) => (
                    "aggregate",
                    plan.branches.iter().map(|b| b.name.clone()).collect(),
                    None,
                ),
            };
            RouteStatus {
                name: route.name.clone(),
                upstream: route.upstream.to_string(),
                methods: route.methods.iter().map(|m| m.to_string()).collect(),
                kind,
                target,
                strategy,
                middleware: route.pipeline.stage_names(),
                timeout_ms: route.policy.timeout.as_millis(),
                attempt_timeout_ms: route.policy.attempt_timeout.as_millis(),
                retries: route.policy.retries,
            }
        })
        .collect();
    Json(routes)
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointStatus>> {
    let table = state.gateway.router().current();
    let endpoints = table
        .endpoints()
        .iter()
        .map(|endpoint| EndpointStatus {
            address: endpoint.authority().to_string(),
            health: endpoint.health_state().as_str(),
            healthy: endpoint.is_healthy(),
            active_connections: endpoint.active_connections(),
            max_connections: endpoint.max_connections(),
        })
        .collect();
    Json(endpoints)
}
