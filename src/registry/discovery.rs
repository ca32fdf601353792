//! Discovery filters and the short-lived per-filter result cache.

use super::{HealthStatus, ServiceEndpoint};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Filter applied by [`ServiceRegistry::discover_services`].
///
/// Two queries with the same fields share one discovery cache entry.
///
/// [`ServiceRegistry::discover_services`]: super::ServiceRegistry::discover_services
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryQuery {
    /// Exact service type match
    pub service_type: Option<String>,
    /// Every listed capability must be present
    pub capabilities: BTreeSet<String>,
    /// At least one listed tag must be present
    pub tags: BTreeSet<String>,
    /// Only return instances whose status is `Healthy`
    pub healthy_only: bool,
}

impl Default for DiscoveryQuery {
    fn default() -> Self {
        Self {
            service_type: None,
            capabilities: BTreeSet::new(),
            tags: BTreeSet::new(),
            healthy_only: true,
        }
    }
}

impl DiscoveryQuery {
    /// Healthy instances of one service type, the query used for dispatch.
    pub fn healthy_of_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: Some(service_type.into()),
            ..Self::default()
        }
    }

    /// Every registered instance regardless of health.
    pub fn all() -> Self {
        Self {
            healthy_only: false,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_unhealthy(mut self) -> Self {
        self.healthy_only = false;
        self
    }

    /// Apply the filters in order: health, type, capability subset, tag intersection.
    pub fn matches(&self, endpoint: &ServiceEndpoint) -> bool {
        if self.healthy_only && endpoint.health_status != HealthStatus::Healthy {
            return false;
        }
        if let Some(service_type) = &self.service_type {
            if &endpoint.service_type != service_type {
                return false;
            }
        }
        if !self.capabilities.is_subset(&endpoint.capabilities) {
            return false;
        }
        if !self.tags.is_empty() && self.tags.is_disjoint(&endpoint.tags) {
            return false;
        }
        true
    }
}

struct CachedDiscovery {
    stored_at: Instant,
    generation: u64,
    endpoints: Vec<ServiceEndpoint>,
}

/// Discovery results keyed by filter, each valid for a fixed TTL.
///
/// Every invalidation bumps `generation`. A result computed under an older
/// generation never outlives the invalidation that raced with it.
pub(crate) struct DiscoveryCache {
    entries: DashMap<DiscoveryQuery, CachedDiscovery>,
    generation: AtomicU64,
    ttl: Duration,
}

impl DiscoveryCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    pub(crate) fn get(&self, query: &DiscoveryQuery) -> Option<Vec<ServiceEndpoint>> {
        let entry = self.entries.get(query)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.endpoints.clone());
        }
        drop(entry);
        self.entries.remove(query);
        None
    }

    /// Read before scanning the registry; pass the value to [`Self::insert`].
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a result computed while the cache was at `generation`.
    pub(crate) fn insert(
        &self,
        query: DiscoveryQuery,
        endpoints: Vec<ServiceEndpoint>,
        generation: u64,
    ) {
        if self.ttl.is_zero() || self.generation() != generation {
            return;
        }
        self.entries.insert(
            query.clone(),
            CachedDiscovery {
                stored_at: Instant::now(),
                generation,
                endpoints,
            },
        );
        // An invalidation may have landed between the check and the write.
        if self.generation() != generation {
            self.entries
                .remove_if(&query, |_, cached| cached.generation == generation);
        }
    }

    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRegistration;

    fn endpoints() -> Vec<ServiceEndpoint> {
        vec![ServiceEndpoint::from_registration(ServiceRegistration::new(
            "engine-1",
            "Engine 1",
            "analytics_engine",
            "http://127.0.0.1:1",
        ))]
    }

    #[test]
    fn test_insert_from_older_generation_is_dropped() {
        let cache = DiscoveryCache::new(Duration::from_secs(60));
        let before = cache.generation();
        cache.invalidate();

        cache.insert(DiscoveryQuery::all(), endpoints(), before);
        assert_eq!(cache.len(), 0);
        assert!(cache.get(&DiscoveryQuery::all()).is_none());

        cache.insert(DiscoveryQuery::all(), endpoints(), cache.generation());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_advances_generation() {
        let cache = DiscoveryCache::new(Duration::from_secs(60));
        let start = cache.generation();
        cache.invalidate();
        cache.invalidate();
        assert_eq!(cache.generation(), start + 2);
    }
}
