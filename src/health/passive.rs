//! Passive health checking (failure detection during dispatch).
//!
//! # Design Decisions
//! - Only connect failures count; they prove the endpoint is unreachable
//! - Any response, even 5xx, ends the failure streak
//! - Passive checks only take endpoints out; the active prober brings them back

use crate::health::state::HealthState;
use crate::load_balancer::Endpoint;
use crate::observability::metrics;

/// Dispatch-side health observer.
#[derive(Debug, Clone, Copy)]
pub struct PassiveHealth {
    unhealthy_threshold: u32,
}

impl PassiveHealth {
    pub fn new(unhealthy_threshold: u32) -> Self {
        Self {
            unhealthy_threshold: unhealthy_threshold.max(1),
        }
    }

    /// The endpoint refused or failed the connection.
    pub fn on_connect_failure(&self, endpoint: &Endpoint) {
        if let Some(transition) = endpoint.health().record_failure(self.unhealthy_threshold) {
            tracing::warn!(
                endpoint = %endpoint,
                from = transition.from.as_str(),
                failures = self.unhealthy_threshold,
                "Endpoint marked unhealthy after consecutive connect failures"
            );
            metrics::record_endpoint_health(endpoint.authority(), false);
        }
    }

    /// The endpoint produced a response.
    pub fn on_response(&self, endpoint: &Endpoint) {
        if endpoint.health_state() != HealthState::Unhealthy {
            endpoint.health().clear_failures();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_unhealthy_after_consecutive_connect_failures() {
        let passive = PassiveHealth::new(2);
        let endpoint = Endpoint::new("127.0.0.1", 1, 10, "/health");

        passive.on_connect_failure(&endpoint);
        passive.on_response(&endpoint);
        passive.on_connect_failure(&endpoint);
        assert!(endpoint.is_healthy(), "streak was broken by a response");

        passive.on_connect_failure(&endpoint);
        assert!(!endpoint.is_healthy());

        // Responses do not restore; that is the prober's job.
        passive.on_response(&endpoint);
        assert!(!endpoint.is_healthy());
    }
}
