//! Per-service circuit breakers.
//!
//! A breaker opens once a service accumulates `failure_threshold` consecutive
//! failures and rejects calls until `recovery_timeout` has passed. There is no
//! half-open probing state: the first check after the window closes the
//! breaker and lets traffic through. The failure count is kept across that
//! transition, so a single further failure re-opens it.

use crate::config::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// Breaker bookkeeping for one service.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerState {
    /// Consecutive failures since the last success
    pub failures: u32,
    /// Whether calls are currently rejected
    pub open: bool,
    /// When the breaker last opened
    pub open_time: Option<Instant>,
    /// Wall-clock time of the most recent failure
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Serializable view of a breaker for statistics output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerView {
    pub service: String,
    pub failures: u32,
    pub open: bool,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Circuit breakers for every service that has recorded an outcome.
pub struct CircuitBreakerTable {
    states: DashMap<String, CircuitBreakerState>,
    config: CircuitBreakerConfig,
    trips: AtomicU64,
}

impl CircuitBreakerTable {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: DashMap::new(),
            config,
            trips: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether calls to `service` must be rejected.
    ///
    /// Closes an open breaker whose recovery window has elapsed.
    pub fn is_open(&self, service: &str) -> bool {
        let Some(mut state) = self.states.get_mut(service) else {
            return false;
        };
        if !state.open {
            return false;
        }

        let elapsed = state
            .open_time
            .map(|opened| opened.elapsed())
            .unwrap_or_default();
        if elapsed > self.config.recovery_timeout() {
            state.open = false;
            state.open_time = None;
            tracing::info!(
                service = %service,
                failures = state.failures,
                "Circuit breaker closed after recovery timeout"
            );
            return false;
        }
        true
    }

    /// Reset the failure count after a successful call.
    pub fn record_success(&self, service: &str) {
        if let Some(mut state) = self.states.get_mut(service) {
            state.failures = 0;
        }
    }

    /// Count a failure, opening the breaker when the threshold is reached.
    ///
    /// Returns true if this failure opened the breaker.
    pub fn record_failure(&self, service: &str) -> bool {
        let mut state = self.states.entry(service.to_string()).or_default();
        state.failures = state.failures.saturating_add(1);
        state.last_failure_time = Some(Utc::now());

        if state.open || state.failures < self.config.failure_threshold {
            return false;
        }

        state.open = true;
        state.open_time = Some(Instant::now());
        let failures = state.failures;
        drop(state);

        self.trips.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("analytics_gateway_circuit_breaker_trips_total",
            "service" => service.to_string()
        )
        .increment(1);
        tracing::warn!(
            service = %service,
            failures,
            recovery_timeout_seconds = self.config.recovery_timeout_seconds,
            "Circuit breaker opened"
        );
        true
    }

    /// Forget all state for a service.
    pub fn reset(&self, service: &str) {
        self.states.remove(service);
    }

    pub fn state(&self, service: &str) -> Option<CircuitBreakerState> {
        self.states.get(service).map(|entry| entry.value().clone())
    }

    /// Services whose breaker is currently open, sorted.
    ///
    /// Read-only: an expired breaker still shows until the next `is_open` check.
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .states
            .iter()
            .filter(|entry| entry.value().open)
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        open
    }

    pub fn views(&self) -> Vec<CircuitBreakerView> {
        let mut views: Vec<CircuitBreakerView> = self
            .states
            .iter()
            .map(|entry| CircuitBreakerView {
                service: entry.key().clone(),
                failures: entry.value().failures,
                open: entry.value().open,
                last_failure_time: entry.value().last_failure_time,
            })
            .collect();
        views.sort_by(|a, b| a.service.cmp(&b.service));
        views
    }

    /// Number of closed-to-open transitions since creation.
    pub fn trip_count(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn table(threshold: u32, recovery_seconds: u64) -> CircuitBreakerTable {
        CircuitBreakerTable::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_seconds: recovery_seconds,
        })
    }

    #[test]
    fn unknown_service_is_closed() {
        let breakers = table(5, 60);
        assert!(!breakers.is_open("analytics_engine"));
        assert!(breakers.state("analytics_engine").is_none());
    }

    #[test]
    fn opens_after_exactly_threshold_failures() {
        let breakers = table(5, 60);
        for i in 1..5 {
            assert!(!breakers.record_failure("x"), "failure {} must not open", i);
            assert!(!breakers.is_open("x"));
        }
        assert!(breakers.record_failure("x"));
        assert!(breakers.is_open("x"));
        assert_eq!(breakers.trip_count(), 1);
        assert_eq!(breakers.open_circuits(), vec!["x".to_string()]);
    }

    #[test]
    fn success_resets_failure_count() {
        let breakers = table(3, 60);
        breakers.record_failure("x");
        breakers.record_failure("x");
        breakers.record_success("x");
        assert_eq!(breakers.state("x").unwrap().failures, 0);

        breakers.record_failure("x");
        breakers.record_failure("x");
        assert!(!breakers.is_open("x"));
    }

    #[test]
    fn breakers_are_per_service() {
        let breakers = table(2, 60);
        breakers.record_failure("a");
        breakers.record_failure("a");
        breakers.record_failure("b");
        assert!(breakers.is_open("a"));
        assert!(!breakers.is_open("b"));
    }

    #[test]
    fn failures_while_open_do_not_count_extra_trips() {
        let breakers = table(2, 60);
        breakers.record_failure("a");
        breakers.record_failure("a");
        breakers.record_failure("a");
        assert_eq!(breakers.trip_count(), 1);
        assert_eq!(breakers.state("a").unwrap().failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn closes_after_recovery_timeout() {
        let breakers = table(2, 60);
        breakers.record_failure("x");
        breakers.record_failure("x");
        assert!(breakers.is_open("x"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(breakers.is_open("x"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!breakers.is_open("x"));
        assert!(breakers.open_circuits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn single_failure_after_recovery_reopens() {
        let breakers = table(3, 10);
        for _ in 0..3 {
            breakers.record_failure("x");
        }
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!breakers.is_open("x"));

        assert!(breakers.record_failure("x"));
        assert!(breakers.is_open("x"));
        assert_eq!(breakers.trip_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_recovery_fully_closes() {
        let breakers = table(2, 10);
        breakers.record_failure("x");
        breakers.record_failure("x");
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!breakers.is_open("x"));

        breakers.record_success("x");
        assert!(!breakers.record_failure("x"));
        assert!(!breakers.is_open("x"));
    }

    #[test]
    fn reset_forgets_service() {
        let breakers = table(1, 60);
        breakers.record_failure("x");
        assert!(breakers.is_open("x"));
        breakers.reset("x");
        assert!(!breakers.is_open("x"));
        assert_eq!(breakers.trip_count(), 1);
    }
}
