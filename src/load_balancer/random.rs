//! Uniform random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_server(&self, _endpoints: &[Arc<Endpoint>], candidates: &[usize]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[fastrand::usize(..candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_only_candidates() {
        let lb = Random::new();
        let endpoints: Vec<_> = (0..3)
            .map(|i| Arc::new(Endpoint::new("127.0.0.1", 9000 + i, 10, "/health")))
            .collect();

        for _ in 0..100 {
            let i = lb.next_server(&endpoints, &[0, 2]).unwrap();
            assert!(i == 0 || i == 2);
        }
        assert_eq!(lb.next_server(&endpoints, &[]), None);
    }
}
