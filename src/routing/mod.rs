//! Round-robin load balancing across healthy service instances.
//!
//! Each service type has its own monotonic counter; a selection picks
//! `candidates[counter % len]` and advances the counter. Candidates are
//! supplied fresh on every call, so membership changes between calls can make
//! the rotation skip or repeat an instance.

use crate::registry::ServiceEndpoint;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Round-robin selector keyed by service type.
#[derive(Default)]
pub struct LoadBalancer {
    counters: DashMap<String, AtomicU64>,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next instance for `service_type`, or `None` if there are no candidates.
    pub fn select<'a>(
        &self,
        service_type: &str,
        candidates: &'a [ServiceEndpoint],
    ) -> Option<&'a ServiceEndpoint> {
        if candidates.is_empty() {
            return None;
        }

        let counter = match self.counters.get(service_type) {
            Some(counter) => counter.fetch_add(1, Ordering::Relaxed),
            None => self
                .counters
                .entry(service_type.to_string())
                .or_default()
                .fetch_add(1, Ordering::Relaxed),
        };
        let index = (counter % candidates.len() as u64) as usize;
        candidates.get(index)
    }

    /// Selections made so far for a service type.
    pub fn counter(&self, service_type: &str) -> u64 {
        self.counters
            .get(service_type)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}
