//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every endpoint of the current route table
//!     → Update state.rs
//!
//! Passive health checks (passive.rs):
//!     Connect failure observed by the dispatcher
//!     → Increment failure count
//!     → Update state.rs if threshold exceeded
//!
//! State machine (state.rs):
//!     Unknown/Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - State transitions require consecutive successes/failures
//! - Health state is per-endpoint atomics, shared by every route using it

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use passive::PassiveHealth;
pub use state::{EndpointHealth, HealthState};
