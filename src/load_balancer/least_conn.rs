//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Least connections selector.
/// Selects the candidate with the fewest in-flight calls.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, endpoints: &[Arc<Endpoint>], candidates: &[usize]) -> Option<usize> {
        // In case of tie, the first candidate is selected (stability)
        candidates
            .iter()
            .copied()
            .min_by_key(|&i| endpoints[i].active_connections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let b1 = Arc::new(Endpoint::new("127.0.0.1", 8080, 100, "/health"));
        let b2 = Arc::new(Endpoint::new("127.0.0.1", 8081, 100, "/health"));
        let endpoints = vec![b1.clone(), b2.clone()];

        b1.inc_connections();
        assert_eq!(lb.next_server(&endpoints, &[0, 1]), Some(1));

        b2.inc_connections();
        b2.inc_connections();
        assert_eq!(lb.next_server(&endpoints, &[0, 1]), Some(0));

        // Only candidates are considered, even if busier.
        assert_eq!(lb.next_server(&endpoints, &[1]), Some(1));
    }
}
