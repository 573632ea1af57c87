//! Process-wide service state shared by health checks and job runs.
//!
//! Only two pieces of state are shared across requests: the downstream
//! readiness flag (write-once, read-many) and a request counter kept for
//! statistics. Both are atomics, so the struct is shared behind an `Arc`
//! with no locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServiceState {
    downstream_ready: AtomicBool,
    total_requests: AtomicU64,
}

impl ServiceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the downstream service has answered a status probe.
    pub fn is_ready(&self) -> bool {
        self.downstream_ready.load(Ordering::Acquire)
    }

    /// Record that the downstream service answered a status probe.
    pub fn mark_ready(&self) {
        self.downstream_ready.store(true, Ordering::Release);
    }

    /// Count one incoming generation request; returns the new total.
    pub fn record_request(&self) -> u64 {
        self.total_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }
}
