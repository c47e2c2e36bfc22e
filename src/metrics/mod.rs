use crate::circuit_breaker::CircuitState;
use crate::error::{AdminError, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics service exposing the Prometheus recorder
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsService").finish_non_exhaustive()
    }
}

impl MetricsService {
    /// Install the global Prometheus recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            AdminError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "admin_dispatch_total",
            "Outbound calls by service and outcome"
        );
        describe_histogram!(
            "admin_dispatch_duration_seconds",
            "Outbound call round-trip time in seconds"
        );
        describe_gauge!(
            "admin_circuit_breaker_state",
            "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_counter!(
            "admin_circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "admin_registry_updates_total",
            "Registry update calls by outcome"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Prometheus scrape handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record the outcome of one outbound call
pub fn record_dispatch(service: &str, outcome: &'static str, duration: f64) {
    let labels = [
        ("service", service.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("admin_dispatch_total", &labels).increment(1);
    histogram!("admin_dispatch_duration_seconds", &labels).record(duration);
}

/// Record a circuit breaker transition and its new state
pub fn record_circuit_breaker_transition(call_site: &str, from: CircuitState, to: CircuitState) {
    let labels = [
        ("call_site", call_site.to_string()),
        ("from", from.to_string()),
        ("to", to.to_string()),
    ];
    counter!("admin_circuit_breaker_transitions_total", &labels).increment(1);

    let labels = [("call_site", call_site.to_string())];
    gauge!("admin_circuit_breaker_state", &labels).set(to.as_gauge());
}

/// Record a registry update attempt
pub fn record_registry_update(applied: bool) {
    let labels = [(
        "outcome",
        if applied { "applied" } else { "ignored" }.to_string(),
    )];
    counter!("admin_registry_updates_total", &labels).increment(1);
}
