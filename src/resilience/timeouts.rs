//! Deadline arithmetic.
//!
//! Every request has one hard deadline (the route timeout). Each attempt gets the
//! per-attempt timeout or whatever is left of the deadline, whichever is shorter.

use std::time::Duration;

use tokio::time::Instant;

/// Budget for the next attempt.
pub fn attempt_budget(attempt_timeout: Duration, deadline: Instant) -> Duration {
    attempt_timeout.min(deadline.saturating_duration_since(Instant::now()))
}
