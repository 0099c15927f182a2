//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Downstream attempt:
//!     → timeouts.rs (attempt budget = min(attempt timeout, time left))
//!     → On failure: retries.rs (retryable for this method?)
//!     → backoff.rs (exponential delay, bounded by time left)
//! ```
//!
//! # Design Decisions
//! - One hard deadline per request covers connect, response read and backoff
//! - Connect failures, timeouts and 502/503/504 retry for every method, up to
//!   the route's retry count

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{is_retryable, is_retryable_status, AttemptFailure, RetryPolicy};
pub use timeouts::attempt_budget;
