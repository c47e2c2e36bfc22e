use crate::aggregator::HealthAggregator;
use crate::circuit_breaker::CircuitBreakerService;
use crate::config::{AdminConfig, IdentityConfig};
use crate::dispatcher::{Dispatcher, Payload};
use crate::error::{AdminError, Result};
use crate::metrics;
use crate::registry::{ServiceName, ServiceRegistry};
use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: ServiceRegistry,
    pub breakers: Arc<CircuitBreakerService>,
    pub dispatcher: Dispatcher,
    pub aggregator: HealthAggregator,
    pub identity: Arc<IdentityConfig>,
}

impl AppState {
    /// Build a fresh, isolated state from configuration
    pub fn new(config: &AdminConfig) -> Result<Self> {
        let registry = ServiceRegistry::from_config(config);
        let breakers = Arc::new(CircuitBreakerService::new(config.circuit_breaker.clone()));
        let dispatcher = Dispatcher::new(
            registry.clone(),
            breakers.clone(),
            config.dispatch.scheme.clone(),
            config.server.timeout(),
        )?;
        let aggregator = HealthAggregator::new(dispatcher.clone());

        Ok(Self {
            registry,
            breakers,
            dispatcher,
            aggregator,
            identity: Arc::new(config.identity.clone()),
        })
    }
}

/// Body shape shared by every route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub response: String,
}

impl ApiResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct AddGameForm {
    pub name: String,
    pub date: String,
    #[serde(rename = "AccessToken")]
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveGameForm {
    pub name: String,
    #[serde(rename = "AccessToken")]
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIpForm {
    #[serde(default)]
    pub name: Option<String>,
    pub ip: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfigForm {
    pub name: String,
    pub ip: String,
}

type FormInput<T> = std::result::Result<Form<T>, FormRejection>;

fn form_fields<T>(input: FormInput<T>) -> Result<T> {
    input
        .map(|Form(fields)| fields)
        .map_err(|rejection| AdminError::InvalidForm(rejection.body_text()))
}

/// Build the admin routes over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ad", get(home))
        .route("/adaddgame", post(add_game))
        .route("/adremovegame", post(remove_game).delete(remove_game))
        .route("/adupdate_ip", post(update_ip).put(update_ip))
        .route("/adconfig", post(config_update).put(config_update))
        .route("/adgetconfig", get(get_config))
        .route("/admetrics", get(get_metrics))
        .route("/adhealthcheck", get(health_check))
        .fallback(not_found)
        .with_state(state)
}

/// Liveness
pub async fn health(State(state): State<AppState>) -> Result<ApiResponse> {
    state
        .breakers
        .call("root", || async { Ok(ApiResponse::new("200")) })
        .await
        .map_err(with_fallback)
}

pub async fn home(State(state): State<AppState>) -> Result<ApiResponse> {
    state
        .breakers
        .call("ad", || async { Ok(ApiResponse::new("Admin microservice.")) })
        .await
        .map_err(with_fallback)
}

/// Routes with a fallback answer breaker rejections with it
fn with_fallback(err: AdminError) -> AdminError {
    match err {
        AdminError::BreakerOpen(call_site) => AdminError::ServiceUnavailable(call_site),
        other => other,
    }
}

/// Forward a new game to the database service
pub async fn add_game(
    State(state): State<AppState>,
    form: FormInput<AddGameForm>,
) -> Result<ApiResponse> {
    info!("/adaddgame accessed");
    let form = form_fields(form)?;

    let payload = Payload::form([
        ("name", form.name),
        ("date", form.date),
        ("AccessToken", form.access_token),
    ]);
    forward(&state, "database.addgame", ServiceName::Database, "/dbaddgame", payload).await
}

/// Forward a game removal to the database service
pub async fn remove_game(
    State(state): State<AppState>,
    form: FormInput<RemoveGameForm>,
) -> Result<ApiResponse> {
    info!("/adremovegame accessed");
    let form = form_fields(form)?;

    let payload = Payload::form([("name", form.name), ("AccessToken", form.access_token)]);
    forward(
        &state,
        "database.removegame",
        ServiceName::Database,
        "/dbremovegame",
        payload,
    )
    .await
}

/// Record this service's new address and announce it to the configuration service
pub async fn update_ip(
    State(state): State<AppState>,
    form: FormInput<UpdateIpForm>,
) -> Result<ApiResponse> {
    info!("/adupdate_ip accessed");
    let form = form_fields(form)?;

    state.registry.set(ServiceName::SelfService, &form.ip);
    info!(
        requested_name = form.name.as_deref().unwrap_or(""),
        ip = %form.ip,
        "Own address updated"
    );

    let payload = Payload::form([
        ("name", state.identity.name.clone()),
        ("ip", form.ip),
    ]);
    forward(
        &state,
        "configuration.update",
        ServiceName::Configuration,
        "/cfupdate",
        payload,
    )
    .await
}

/// Overwrite the address of a sibling service
pub async fn config_update(
    State(state): State<AppState>,
    form: FormInput<ConfigForm>,
) -> Result<ApiResponse> {
    info!("/adconfig accessed");
    let form = form_fields(form)?;

    let applied = state.registry.update(&form.name, &form.ip);
    metrics::record_registry_update(applied);
    if !applied {
        // Newer configuration services may push names this build does not know
        warn!(name = %form.name, "Ignoring config update for unknown service");
    }

    Ok(ApiResponse::new("200 OK"))
}

pub async fn get_config(State(state): State<AppState>) -> ApiResponse {
    info!("/adgetconfig accessed");
    ApiResponse::new(state.registry.listing())
}

/// Round-trip times of the database and login services
pub async fn get_metrics(State(state): State<AppState>) -> Result<ApiResponse> {
    info!("/admetrics accessed");
    let report = state.aggregator.aggregate_metrics().await?;

    let body = serde_json::to_string(&report)
        .map_err(|e| AdminError::Internal(format!("Failed to serialize metrics: {}", e)))?;
    Ok(ApiResponse::new(body))
}

pub async fn health_check(State(state): State<AppState>) -> Result<ApiResponse> {
    info!("/adhealthcheck accessed");
    state.aggregator.aggregate_health().await?;
    Ok(ApiResponse::new("200 OK"))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn forward(
    state: &AppState,
    call_site: &str,
    service: ServiceName,
    path: &str,
    payload: Payload,
) -> Result<ApiResponse> {
    let body = state
        .dispatcher
        .invoke(call_site, service.as_str(), Method::POST, path, payload)
        .await?
        .into_result(call_site)?;

    Ok(ApiResponse::new(body))
}
