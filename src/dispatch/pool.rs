//! Scoped downstream connection slots.
//!
//! # Responsibilities
//! - Bound concurrent calls per endpoint
//! - Hand out a guard whose `Drop` returns the slot on every exit path
//! - Keep acquire/release counts for leak detection
//!
//! # Design Decisions
//! - Slots are semaphore permits owned by the endpoint, so they survive reloads
//!   together with the endpoint
//! - Waiting is bounded by `pool.acquire_timeout_ms` and by the request deadline
//! - Cancellation drops the guard like any other exit

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;

use crate::dispatch::transport::Transport;
use crate::error::GatewayError;
use crate::load_balancer::Endpoint;

#[derive(Debug, Default)]
struct PoolCounters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
}

impl PoolStats {
    pub fn in_use(&self) -> u64 {
        self.acquired - self.released
    }
}

/// Hands out connection slots and the shared transport.
pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    acquire_timeout: Duration,
    counters: Arc<PoolCounters>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("acquire_timeout", &self.acquire_timeout)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    pub fn new(transport: Arc<dyn Transport>, acquire_timeout: Duration) -> Self {
        Self {
            transport,
            acquire_timeout,
            counters: Arc::new(PoolCounters::default()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Wait for a free slot on `endpoint`, at most `min(acquire_timeout, budget)`.
    pub async fn acquire(&self, endpoint: &Arc<Endpoint>, budget: Duration) -> Result<PooledConnection, GatewayError> {
        let wait = self.acquire_timeout.min(budget);
        let exhausted = || GatewayError::PoolExhausted {
            endpoint: endpoint.authority().to_string(),
        };

        let permit = match tokio::time::timeout(wait, endpoint.slots().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            // Closed semaphore or timeout
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(endpoint = %endpoint, waited = ?wait, "Connection pool exhausted");
                return Err(exhausted());
            }
        };

        endpoint.inc_connections();
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            endpoint: endpoint.clone(),
            transport: self.transport.clone(),
            counters: self.counters.clone(),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
        }
    }
}

/// A held connection slot. Dropping it releases the slot.
pub struct PooledConnection {
    endpoint: Arc<Endpoint>,
    transport: Arc<dyn Transport>,
    counters: Arc<PoolCounters>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("endpoint", &self.endpoint.authority())
            .finish()
    }
}

impl PooledConnection {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.endpoint.dec_connections();
        self.counters.released.fetch_add(1, Ordering::Relaxed);
    }
}
