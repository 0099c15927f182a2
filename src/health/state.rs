//! Endpoint health state machine.
//!
//! # States
//! - Unknown: never checked; receives traffic
//! - Healthy: receives traffic
//! - Unhealthy: excluded from load balancing until the prober restores it
//!
//! # State Transitions
//! ```text
//! Unknown/Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unknown/Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! All state is atomic and per endpoint; updating one endpoint never blocks
//! selection of another.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// A state change caused by a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Lock-free health tracking for a single endpoint.
#[derive(Debug)]
pub struct EndpointHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }
}

impl EndpointHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// True unless the endpoint is marked unhealthy.
    pub fn is_available(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Record a successful check. Returns the transition if this call caused one.
    pub fn record_success(&self, healthy_threshold: u32) -> Option<Transition> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let current = self.state();
        if current == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes < healthy_threshold {
            return None;
        }
        self.transition(current, HealthState::Healthy)
    }

    /// Record a failure. Returns the transition if this call caused one.
    pub fn record_failure(&self, unhealthy_threshold: u32) -> Option<Transition> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        let current = self.state();
        if current == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures < unhealthy_threshold {
            return None;
        }
        self.transition(current, HealthState::Unhealthy)
    }

    /// Reset the failure streak without changing state.
    pub fn clear_failures(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    // Only the caller whose CAS wins reports the transition.
    fn transition(&self, from: HealthState, to: HealthState) -> Option<Transition> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_after_threshold_failures() {
        let health = EndpointHealth::new();
        assert!(health.record_failure(3).is_none());
        assert!(health.record_failure(3).is_none());
        assert_eq!(
            health.record_failure(3),
            Some(Transition {
                from: HealthState::Unknown,
                to: HealthState::Unhealthy
            })
        );
        assert!(!health.is_available());
        assert!(health.record_failure(3).is_none());
    }

    #[test]
    fn success_breaks_failure_streak() {
        let health = EndpointHealth::new();
        health.record_failure(2);
        health.clear_failures();
        assert!(health.record_failure(2).is_none());
        assert!(health.is_available());
    }

    #[test]
    fn restores_after_healthy_threshold() {
        let health = EndpointHealth::new();
        health.record_failure(1);
        assert_eq!(health.state(), HealthState::Unhealthy);

        assert!(health.record_success(2).is_none());
        let t = health.record_success(2).unwrap();
        assert_eq!(t.to, HealthState::Healthy);
        assert!(health.is_available());
        assert!(health.record_success(2).is_none());
    }
}
