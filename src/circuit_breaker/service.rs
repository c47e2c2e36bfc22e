use super::breaker::CircuitBreaker;
use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use crate::error::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Circuit breaker service holding one breaker per call site
#[derive(Debug, Clone)]
pub struct CircuitBreakerService {
    /// Circuit breakers per call site
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    /// Configuration applied to every new breaker
    config: CircuitBreakerConfig,
}

impl CircuitBreakerService {
    /// Create a new circuit breaker service
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Get or create the circuit breaker for a call site
    pub fn breaker(&self, call_site: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(call_site.to_string())
            .or_insert_with(|| {
                debug!(call_site = call_site, "Creating new circuit breaker");
                Arc::new(CircuitBreaker::new(
                    call_site.to_string(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Run `f` under the breaker of `call_site`
    pub async fn call<F, Fut, T>(&self, call_site: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Clone the Arc out so no map guard is held across the await
        let breaker = self.breaker(call_site);
        breaker.call(f).await
    }

    /// Check if a call can proceed for a call site
    pub async fn can_proceed(&self, call_site: &str) -> bool {
        let breaker = self.breaker(call_site);
        breaker.can_proceed().await
    }

    /// Record a successful call for a call site
    pub async fn record_success(&self, call_site: &str) {
        let breaker = self.breaker(call_site);
        breaker.record_success().await;
    }

    /// Record a failed call for a call site
    pub async fn record_failure(&self, call_site: &str) {
        let breaker = self.breaker(call_site);
        breaker.record_failure().await;
    }

    /// Get the state of the breaker for a call site
    pub async fn state(&self, call_site: &str) -> CircuitState {
        let breaker = self.breakers.get(call_site).map(|b| b.value().clone());
        match breaker {
            Some(breaker) => breaker.state().await,
            None => CircuitState::Closed,
        }
    }

    /// Get metrics for a call site
    pub async fn metrics(&self, call_site: &str) -> Option<CircuitBreakerMetrics> {
        let breaker = self.breakers.get(call_site).map(|b| b.value().clone())?;
        Some(breaker.metrics().await)
    }

    /// Get all call sites that have a breaker
    pub fn call_sites(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Get metrics for all call sites
    pub async fn all_metrics(&self) -> Vec<(String, CircuitBreakerMetrics, CircuitState)> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();

        let mut results = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            let metrics = breaker.metrics().await;
            let state = breaker.state().await;
            results.push((breaker.call_site().to_string(), metrics, state));
        }
        results
    }
}

impl Default for CircuitBreakerService {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
