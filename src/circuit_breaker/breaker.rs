use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use crate::error::{AdminError, Result};
use crate::metrics;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Circuit breaker for a single call site
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: Arc<RwLock<State>>,
    /// Held while the half-open trial call is in flight
    trial_slot: Arc<AtomicBool>,
    /// Call site identifier
    call_site: String,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Number of consecutive failures in closed state
    consecutive_failures: u32,
    /// Time when the circuit was opened
    opened_at: Option<Instant>,
    /// Metrics
    metrics: CircuitBreakerMetrics,
}

/// Admission to make one call through a breaker.
///
/// When the call is the half-open trial, dropping the permit before its
/// outcome is recorded frees the trial slot again.
#[must_use = "dropping the permit releases the half-open trial slot"]
#[derive(Debug)]
pub struct CallPermit {
    trial_slot: Option<Arc<AtomicBool>>,
}

impl CallPermit {
    /// Whether this permit holds the half-open trial slot
    pub fn is_trial(&self) -> bool {
        self.trial_slot.is_some()
    }

    /// Hand the trial slot over to `record_success`/`record_failure`
    pub fn complete(mut self) {
        self.trial_slot = None;
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if let Some(slot) = self.trial_slot.take() {
            slot.store(false, Ordering::Release);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(call_site: String, config: CircuitBreakerConfig) -> Self {
        info!(
            call_site = %call_site,
            failure_threshold = config.failure_threshold,
            recovery_timeout_ms = config.recovery_timeout_ms,
            "Creating circuit breaker"
        );

        Self {
            config,
            state: Arc::new(RwLock::new(State {
                circuit_state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                metrics: CircuitBreakerMetrics::default(),
            })),
            trial_slot: Arc::new(AtomicBool::new(false)),
            call_site,
        }
    }

    /// Call site this breaker guards
    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    /// Run `f` under the breaker.
    ///
    /// While the circuit is open `f` is never invoked and `BreakerOpen` is
    /// returned. Any `Err` from `f` counts as one failure, any `Ok` as one
    /// success.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(permit) = self.try_acquire().await else {
            return Err(AdminError::BreakerOpen(self.call_site.clone()));
        };

        let result = f().await;
        match &result {
            Ok(_) => self.record_success().await,
            Err(_) => self.record_failure().await,
        }
        permit.complete();
        result
    }

    /// Check if a call can proceed.
    ///
    /// A half-open trial admitted here stays in flight until its outcome is
    /// recorded. Callers that may be cancelled use `try_acquire` instead.
    pub async fn can_proceed(&self) -> bool {
        match self.try_acquire().await {
            Some(permit) => {
                permit.complete();
                true
            }
            None => false,
        }
    }

    /// Ask for admission, returning a permit when the call may proceed
    pub async fn try_acquire(&self) -> Option<CallPermit> {
        let mut state = self.state.write().await;
        let recovery_timeout = self.config.recovery_timeout();

        match state.circuit_state {
            CircuitState::Closed => {
                state.metrics.total_requests += 1;
                Some(CallPermit { trial_slot: None })
            }
            CircuitState::Open => {
                let Some(opened_at) = state.opened_at else {
                    warn!(call_site = %self.call_site, "Circuit open but no opened_at timestamp");
                    state.metrics.rejected_requests += 1;
                    return None;
                };

                if opened_at.elapsed() >= recovery_timeout {
                    self.transition_to_half_open(&mut state);
                    state.metrics.total_requests += 1;
                    self.trial_slot.store(true, Ordering::Release);
                    Some(CallPermit {
                        trial_slot: Some(self.trial_slot.clone()),
                    })
                } else {
                    state.metrics.rejected_requests += 1;
                    debug!(
                        call_site = %self.call_site,
                        time_remaining = ?recovery_timeout.saturating_sub(opened_at.elapsed()),
                        "Circuit breaker open, rejecting call"
                    );
                    None
                }
            }
            CircuitState::HalfOpen => {
                let claimed = self
                    .trial_slot
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();

                if claimed {
                    state.metrics.total_requests += 1;
                    debug!(call_site = %self.call_site, "Allowing half-open probe call");
                    Some(CallPermit {
                        trial_slot: Some(self.trial_slot.clone()),
                    })
                } else {
                    state.metrics.rejected_requests += 1;
                    debug!(call_site = %self.call_site, "Probe in flight, rejecting call");
                    None
                }
            }
        }
    }

    /// Record a successful call
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        state.metrics.successful_requests += 1;

        match state.circuit_state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                debug!(call_site = %self.call_site, "Half-open probe call succeeded");
                self.transition_to_closed(&mut state);
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
                debug!(call_site = %self.call_site, "Recording success in open state");
            }
        }
    }

    /// Record a failed call
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        state.metrics.failed_requests += 1;

        match state.circuit_state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;

                debug!(
                    call_site = %self.call_site,
                    consecutive_failures = state.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Call failed in closed state"
                );

                if state.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    call_site = %self.call_site,
                    "Half-open probe call failed, reopening circuit"
                );
                self.transition_to_open(&mut state);
            }
            CircuitState::Open => {
                debug!(call_site = %self.call_site, "Recording failure in open state");
            }
        }
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.circuit_state
    }

    /// Get the consecutive failure count
    pub async fn consecutive_failures(&self) -> u32 {
        self.state.read().await.consecutive_failures
    }

    /// Get metrics
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        self.state.read().await.metrics.clone()
    }

    /// Transition to open state
    fn transition_to_open(&self, state: &mut State) {
        info!(
            call_site = %self.call_site,
            consecutive_failures = state.consecutive_failures,
            "Circuit breaker opening"
        );

        metrics::record_circuit_breaker_transition(
            &self.call_site,
            state.circuit_state,
            CircuitState::Open,
        );
        state.circuit_state = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        self.trial_slot.store(false, Ordering::Release);
        state.metrics.circuit_opened_count += 1;
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self, state: &mut State) {
        info!(
            call_site = %self.call_site,
            recovery_timeout = ?self.config.recovery_timeout(),
            "Circuit breaker transitioning to half-open"
        );

        metrics::record_circuit_breaker_transition(
            &self.call_site,
            state.circuit_state,
            CircuitState::HalfOpen,
        );
        state.circuit_state = CircuitState::HalfOpen;
        state.metrics.circuit_half_opened_count += 1;
    }

    /// Transition to closed state
    fn transition_to_closed(&self, state: &mut State) {
        info!(call_site = %self.call_site, "Circuit breaker closing");

        metrics::record_circuit_breaker_transition(
            &self.call_site,
            state.circuit_state,
            CircuitState::Closed,
        );
        state.circuit_state = CircuitState::Closed;
        state.opened_at = None;
        self.trial_slot.store(false, Ordering::Release);
        state.consecutive_failures = 0;
        state.metrics.circuit_closed_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_recovery(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_starts_closed() {
        let cb = CircuitBreaker::new("test-site".to_string(), CircuitBreakerConfig::default());
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_default_threshold_trips_on_first_failure() {
        let cb = CircuitBreaker::new("test-site".to_string(), CircuitBreakerConfig::default());

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_failures() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(3));

        for _ in 0..2 {
            assert!(cb.can_proceed().await);
            cb.record_failure().await;
        }
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.consecutive_failures().await, 2);

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_circuit_resets_on_success() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(3));

        for _ in 0..2 {
            assert!(cb.can_proceed().await);
            cb.record_failure().await;
        }

        assert!(cb.can_proceed().await);
        cb.record_success().await;

        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.consecutive_failures().await, 0);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_probe() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cb.can_proceed().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        // The probe has not reported back yet
        assert!(!cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_trial_stays_exclusive_past_recovery_timeout() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        let trial = cb.try_acquire().await.unwrap();
        assert!(trial.is_trial());

        // Longer than the recovery timeout, the trial still has no outcome
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cb.try_acquire().await.is_none());
        assert!(!cb.can_proceed().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_success().await;
        trial.complete();
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_trial_frees_slot() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The caller goes away before the trial call returns
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            cb.call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        let result = cb.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_on_success() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cb.can_proceed().await);
        cb.record_success().await;

        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.consecutive_failures().await, 0);
        assert!(cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_half_open_reopens_on_failure() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        // The cooldown starts over
        assert!(!cb.can_proceed().await);
    }

    #[tokio::test]
    async fn test_open_never_closes_without_probe() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(1));

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        // A late success from a call admitted before the trip
        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_skips_closure_while_open() {
        let cb = CircuitBreaker::new("test-site".to_string(), CircuitBreakerConfig::default());
        let counter = AtomicUsize::new(0);
        let invocations = &counter;

        let result: Result<()> = cb
            .call(move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err(AdminError::Transport("refused".to_string()))
            })
            .await;
        assert!(matches!(result, Err(AdminError::Transport(_))));

        let result: Result<()> = cb
            .call(move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AdminError::BreakerOpen(site)) if site == "test-site"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metrics_tracking() {
        let cb = CircuitBreaker::new("test-site".to_string(), fast_recovery(2));

        assert!(cb.can_proceed().await);
        cb.record_success().await;

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        assert!(cb.can_proceed().await);
        cb.record_failure().await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.can_proceed().await);

        let metrics = cb.metrics().await;
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.rejected_requests, 1);
        assert_eq!(metrics.circuit_opened_count, 1);
    }
}
