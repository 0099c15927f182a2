//! Live route table with atomic reload.
//!
//! # Data Flow
//! ```text
//! Request path:   router.current() → RouteTable::lookup   (lock-free load)
//! Reload:         GatewayConfig → RouteTable::rebuild (off to the side)
//!                 → ArcSwap::store (single visible step)
//! ```
//!
//! A request holds the `Arc<RouteTable>` it loaded for its whole lifetime, so a
//! reload never changes the route an in-flight request is using.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::config::{ConfigError, GatewayConfig};
use crate::routing::matcher::RouteMatch;
use crate::routing::table::RouteTable;

/// The gateway's current route table.
#[derive(Debug)]
pub struct Router {
    table: ArcSwap<RouteTable>,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(RouteTable::build(config)?))
    }

    /// Snapshot of the active table.
    pub fn current(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Match against the active table.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.table.load().lookup(method, path)
    }

    /// Build a table from `config` and swap it in. On error the active table is
    /// left untouched.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let previous = self.current();
        let table = RouteTable::rebuild(config, &previous)?;
        let routes = table.len();
        self.table.store(Arc::new(table));
        tracing::info!(routes, "Route table reloaded");
        Ok(())
    }
}
