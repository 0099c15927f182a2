//! Downstream endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend host:port
//! - Track active calls (for Least Connections LB)
//! - Own the connection slots the pool hands out
//! - Track health state (Unknown/Healthy/Unhealthy)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::health::state::{EndpointHealth, HealthState};

/// A single downstream endpoint.
#[derive(Debug)]
pub struct Endpoint {
    host: String,
    port: u16,
    /// Pre-formatted `host:port`.
    authority: String,
    /// Path the active prober requests.
    probe_path: String,
    /// Maximum concurrent calls allowed.
    max_connections: usize,
    slots: Arc<Semaphore>,
    active_connections: AtomicUsize,
    health: EndpointHealth,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16, max_connections: usize, probe_path: impl Into<String>) -> Self {
        let host = host.into();
        let authority = format!("{}:{}", host, port);
        Self {
            host,
            port,
            authority,
            probe_path: probe_path.into(),
            max_connections,
            slots: Arc::new(Semaphore::new(max_connections)),
            active_connections: AtomicUsize::new(0),
            health: EndpointHealth::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn probe_path(&self) -> &str {
        &self.probe_path
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Get the current number of in-flight calls.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn slots(&self) -> Arc<Semaphore> {
        self.slots.clone()
    }

    /// Number of free connection slots.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn health(&self) -> &EndpointHealth {
        &self.health
    }

    pub fn health_state(&self) -> HealthState {
        self.health.state()
    }

    /// Return true if the endpoint may receive traffic (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.health.is_available()
    }

    /// Whether this endpoint can be carried over unchanged into a rebuilt table.
    pub(crate) fn same_settings(&self, host: &str, port: u16, max_connections: usize, probe_path: &str) -> bool {
        self.host == host
            && self.port == port
            && self.max_connections == max_connections
            && self.probe_path == probe_path
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.authority)
    }
}
