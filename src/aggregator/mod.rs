use crate::dispatcher::{CallOutcome, Dispatcher, Payload};
use crate::error::{AdminError, CheckKind, Result};
use crate::registry::ServiceName;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One dependency endpoint probed by an aggregate check
#[derive(Debug, Clone, Copy)]
struct Probe {
    service: ServiceName,
    path: &'static str,
    /// Phrase reported when the probe fails
    dependency: &'static str,
}

const HEALTH_PROBES: [Probe; 3] = [
    Probe {
        service: ServiceName::Ecostreet,
        path: "/lg",
        dependency: "login service",
    },
    Probe {
        service: ServiceName::Configuration,
        path: "/cf",
        dependency: "configuration",
    },
    Probe {
        service: ServiceName::Database,
        path: "/db",
        dependency: "database",
    },
];

// The database probe hits the configuration health route and is reported
// as "configuration", matching what callers of /admetrics already parse.
const DATABASE_METRIC_PROBE: Probe = Probe {
    service: ServiceName::Database,
    path: "/cfhealthcheck",
    dependency: "configuration",
};

const LOGIN_METRIC_PROBE: Probe = Probe {
    service: ServiceName::Ecostreet,
    path: "/lghealthcheck",
    dependency: "login service",
};

/// Round-trip report produced by `aggregate_metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(rename = "metric check")]
    pub metric_check: String,
    /// Milliseconds
    #[serde(rename = "database response time")]
    pub database_response_time: f64,
    /// Milliseconds
    #[serde(rename = "login response time")]
    pub login_response_time: f64,
}

/// Runs the fixed dependency checks through the dispatcher
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    dispatcher: Dispatcher,
}

impl HealthAggregator {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Probe every dependency in order, stopping at the first one that is down
    pub async fn aggregate_health(&self) -> Result<()> {
        for probe in HEALTH_PROBES {
            self.run(CheckKind::Health, probe).await?;
        }

        info!("All dependencies reachable");
        Ok(())
    }

    /// Time the database and login probes, stopping at the first failure
    pub async fn aggregate_metrics(&self) -> Result<MetricsReport> {
        let database_response_time = self.run(CheckKind::Metrics, DATABASE_METRIC_PROBE).await?;
        let login_response_time = self.run(CheckKind::Metrics, LOGIN_METRIC_PROBE).await?;

        Ok(MetricsReport {
            metric_check: "successful".to_string(),
            database_response_time,
            login_response_time,
        })
    }

    /// Run one probe and return its round trip in milliseconds
    async fn run(&self, check: CheckKind, probe: Probe) -> Result<f64> {
        let prefix = match check {
            CheckKind::Health => "health",
            CheckKind::Metrics => "metrics",
        };
        let call_site = format!("{}.{}", prefix, probe.service);

        let start = Instant::now();
        let outcome = self
            .dispatcher
            .invoke(
                &call_site,
                probe.service.as_str(),
                Method::GET,
                probe.path,
                Payload::Empty,
            )
            .await?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            CallOutcome::Success(_) => {
                debug!(call_site = %call_site, elapsed_ms, "Probe succeeded");
                Ok(elapsed_ms)
            }
            CallOutcome::Failure(e) => {
                warn!(call_site = %call_site, error = %e, "Probe failed");
                Err(AdminError::Dependency {
                    check,
                    dependency: probe.dependency,
                })
            }
            CallOutcome::Rejected => {
                warn!(call_site = %call_site, "Probe rejected by circuit breaker");
                Err(AdminError::Dependency {
                    check,
                    dependency: probe.dependency,
                })
            }
        }
    }
}
