//! Per-route downstream target sets.
//!
//! # Responsibilities
//! - Hold the endpoints that can serve one route
//! - Exclude unhealthy endpoints from selection
//! - Prefer endpoints not yet tried for this request (retries)

use std::sync::Arc;

use crate::config::Strategy;
use crate::load_balancer::{
    endpoint::Endpoint, least_conn::LeastConnections, random::Random, round_robin::RoundRobin,
    LoadBalancer,
};

/// The endpoints of a route plus its selection algorithm.
#[derive(Debug)]
pub struct TargetSet {
    endpoints: Vec<Arc<Endpoint>>,
    strategy: Strategy,
    balancer: Box<dyn LoadBalancer>,
}

impl TargetSet {
    pub fn new(endpoints: Vec<Arc<Endpoint>>, strategy: Strategy) -> Self {
        let balancer: Box<dyn LoadBalancer> = match strategy {
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::Random => Box::new(Random::new()),
            Strategy::LeastConnections => Box::new(LeastConnections::new()),
        };
        Self {
            endpoints,
            strategy,
            balancer,
        }
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Select an endpoint, skipping unhealthy ones.
    ///
    /// `tried` holds indices already used by this request. They are avoided while an
    /// untried healthy endpoint exists, and reused otherwise so a single-endpoint
    /// route can still retry.
    pub fn select(&self, tried: &[usize]) -> Option<(usize, Arc<Endpoint>)> {
        let healthy: Vec<usize> = (0..self.endpoints.len())
            .filter(|&i| self.endpoints[i].is_healthy())
            .collect();

        let untried: Vec<usize> = healthy
            .iter()
            .copied()
            .filter(|i| !tried.contains(i))
            .collect();

        let candidates = if untried.is_empty() { &healthy } else { &untried };
        let index = self.balancer.next_server(&self.endpoints, candidates)?;

        if index >= self.endpoints.len() {
            tracing::debug!(index, "Load balancer returned out-of-range index");
            return None;
        }
        Some((index, self.endpoints[index].clone()))
    }
}
