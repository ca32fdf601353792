//! TTL- and size-bounded cache of successful gateway responses.

use crate::config::CacheConfig;
use crate::gateway::GatewayResponse;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// A stored response and when it was inserted.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: GatewayResponse,
    pub inserted_at: Instant,
}

/// Derive the cache key for a call.
///
/// The payload is serialized with `serde_json`; `None` means the payload could
/// not be serialized and the call should skip the cache.
pub fn cache_key(service: &str, operation: &str, payload: &serde_json::Value) -> Option<String> {
    let payload = serde_json::to_string(payload).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update([0u8]);
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Response cache keyed by [`cache_key`].
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return a stored response younger than the TTL.
    ///
    /// An expired entry is removed on lookup.
    pub fn get(&self, key: &str) -> Option<GatewayResponse> {
        if !self.config.enabled {
            return None;
        }

        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() < self.config.ttl() {
            return Some(entry.response.clone());
        }
        drop(entry);

        self.entries.remove(key);
        tracing::trace!(key = %key, "Evicted expired cache entry");
        None
    }

    /// Store a response, evicting the oldest tenth when over capacity.
    pub fn put(&self, key: String, response: GatewayResponse) {
        if !self.config.enabled {
            return;
        }

        self.entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );

        if self.entries.len() > self.config.max_size {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&self) {
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let evict = (by_age.len() / 10).max(1);
        for (key, _) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = evict, remaining = self.entries.len(), "Cache size bound reached");
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
