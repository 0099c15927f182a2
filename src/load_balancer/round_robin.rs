//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, _endpoints: &[Arc<Endpoint>], candidates: &[usize]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(candidates[n % candidates.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let endpoints = vec![
            Arc::new(Endpoint::new("127.0.0.1", 8080, 100, "/health")),
            Arc::new(Endpoint::new("127.0.0.1", 8081, 100, "/health")),
        ];
        let all = [0, 1];

        assert_eq!(lb.next_server(&endpoints, &all), Some(0));
        assert_eq!(lb.next_server(&endpoints, &all), Some(1));
        assert_eq!(lb.next_server(&endpoints, &all), Some(0));
        assert_eq!(lb.next_server(&endpoints, &[1]), Some(1));
        assert_eq!(lb.next_server(&endpoints, &[]), None);
    }
}
