use crate::circuit_breaker::CircuitBreakerService;
use crate::error::{AdminError, Result};
use crate::metrics;
use crate::registry::ServiceRegistry;
use reqwest::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Body of an outbound call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    Empty,
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl Payload {
    pub fn form<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Payload::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Why no response came back from a downstream service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Connect(String),
    Timeout(String),
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "connect failed: {}", msg),
            TransportError::Timeout(msg) => write!(f, "timed out: {}", msg),
            TransportError::Other(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Result of a single outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// A response was received; carries the raw body whatever the status
    Success(String),
    /// No response was received
    Failure(TransportError),
    /// The breaker rejected the call before any transport attempt
    Rejected,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Convert into the error taxonomy used by the handlers
    pub fn into_result(self, call_site: &str) -> Result<String> {
        match self {
            CallOutcome::Success(body) => Ok(body),
            CallOutcome::Failure(TransportError::Timeout(msg)) => Err(AdminError::Timeout(msg)),
            CallOutcome::Failure(e) => Err(AdminError::Transport(e.to_string())),
            CallOutcome::Rejected => Err(AdminError::BreakerOpen(call_site.to_string())),
        }
    }
}

/// Issues outbound calls to registry-resolved services under a breaker
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: ServiceRegistry,
    breakers: Arc<CircuitBreakerService>,
    client: reqwest::Client,
    scheme: String,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        registry: ServiceRegistry,
        breakers: Arc<CircuitBreakerService>,
        scheme: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            registry,
            breakers,
            client,
            scheme: scheme.into(),
        })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerService> {
        &self.breakers
    }

    /// Build the outbound URL for `service` and `path`
    pub fn target(&self, service: &str, path: &str) -> Result<String> {
        let address = self.registry.get(service)?;
        Ok(format!("{}://{}{}", self.scheme, address, path))
    }

    /// Call `path` on `service` guarded by the breaker of `call_site`.
    ///
    /// Only an unknown service name is returned as `Err`; transport
    /// failures and breaker rejections come back as a `CallOutcome`.
    pub async fn invoke(
        &self,
        call_site: &str,
        service: &str,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<CallOutcome> {
        let url = self.target(service, path)?;

        let breaker = self.breakers.breaker(call_site);
        let Some(permit) = breaker.try_acquire().await else {
            warn!(call_site = %call_site, service = %service, "Circuit breaker open, rejecting call");
            metrics::record_dispatch(service, "rejected", 0.0);
            return Ok(CallOutcome::Rejected);
        };

        debug!(call_site = %call_site, method = %method, url = %url, "Dispatching call");

        let start = Instant::now();
        let outcome = match self.send(method, &url, payload).await {
            Ok(body) => {
                breaker.record_success().await;
                CallOutcome::Success(body)
            }
            Err(e) => {
                breaker.record_failure().await;
                warn!(call_site = %call_site, url = %url, error = %e, "Outbound call failed");
                CallOutcome::Failure(e)
            }
        };
        permit.complete();

        let label = if outcome.is_success() {
            "success"
        } else {
            "failure"
        };
        metrics::record_dispatch(service, label, start.elapsed().as_secs_f64());

        Ok(outcome)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> std::result::Result<String, TransportError> {
        let mut request = self.client.request(method, url);
        if let Payload::Form(fields) = &payload {
            request = request.form(fields);
        }

        let response = request.send().await?;
        let status = response.status();
        // The downstream answered, so a truncated body still counts as a response
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, status = %status, error = %e, "Failed to read downstream body");
                String::new()
            }
        };

        debug!(url = %url, status = %status, bytes = body.len(), "Received downstream response");
        Ok(body)
    }
}
