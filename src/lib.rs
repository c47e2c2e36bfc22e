pub mod aggregator;
pub mod circuit_breaker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod registry;

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::handlers::AppState;
use crate::metrics::{metrics_handler, MetricsService};
use crate::observability::request_id_middleware;
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::observability::init_tracing;

/// Assemble the HTTP application around `state`
pub fn build_app(state: AppState, metrics: Option<MetricsService>) -> Router {
    let mut app = handlers::router(state);

    if let Some(service) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(service),
        );
    }

    app.layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Initialize and run the admin service
pub async fn init_service(config: AdminConfig) -> Result<()> {
    config.validate()?;

    info!("Starting admin service");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );

    let state = AppState::new(&config)?;

    let metrics = if config.metrics.enabled {
        Some(MetricsService::new()?)
    } else {
        None
    };

    let app = build_app(state, metrics);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AdminError::Io)?;

    info!("Admin service ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| AdminError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
