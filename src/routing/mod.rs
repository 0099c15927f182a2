//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (load current table)
//!     → matcher.rs (method bucket, segment comparison, specificity order)
//!     → Return: RouteMatch (route + captured params) or None (404)
//!
//! Route Compilation (startup and reload):
//!     RouteConfig[] + AggregateConfig[]
//!     → template.rs (parse upstream/downstream templates)
//!     → table.rs (validate, resolve endpoints and middleware)
//!     → Freeze as immutable RouteTable, swap into Router
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; reload replaces the whole table
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;
pub mod table;
pub mod template;

pub use matcher::RouteMatch;
pub use router::Router;
pub use table::{AggregatePlan, Downstream, Route, RouteKind, RoutePolicy, RouteTable};
