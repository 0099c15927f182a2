//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → route's TargetSet
//!     → target.rs (filter healthy, prefer endpoints not yet tried)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through endpoints)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (pick endpoint with fewest in-flight calls)
//!     → Return endpoint; dispatch::pool acquires a slot on it
//! ```
//!
//! # Design Decisions
//! - Strategies only choose among candidates; filtering lives in TargetSet
//! - Algorithm selection per route
//! - Unhealthy endpoints excluded from selection

use std::sync::Arc;

pub mod endpoint;
pub mod least_conn;
pub mod random;
pub mod round_robin;
pub mod target;

pub use endpoint::Endpoint;
pub use target::TargetSet;

/// An endpoint selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Choose one of `candidates` (indices into `endpoints`).
    ///
    /// Returns the chosen index into `endpoints`, or `None` when `candidates` is empty.
    fn next_server(&self, endpoints: &[Arc<Endpoint>], candidates: &[usize]) -> Option<usize>;
}
