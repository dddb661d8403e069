//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use dripflow_core::DripflowConfig;
use dripflow_core::error::{DripflowError, Result};
use dripflow_store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<DripflowConfig>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/leads", post(super::routes::create_lead))
        .route("/api/v1/email-logs", get(super::routes::list_email_logs))
        .route("/api/v1/settings", get(super::routes::get_settings))
        .route("/api/v1/settings", put(super::routes::update_settings))
        .route("/api/v1/campaigns", post(super::routes::create_campaign))
        .route("/api/v1/lead-magnets", post(super::routes::create_lead_magnet))
        .route("/api/v1/sequences", post(super::routes::create_sequence))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind and serve the gateway until shutdown.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DripflowError::Config(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("🌐 Gateway listening on http://{addr}");

    axum::serve(listener, router)
        .await
        .map_err(|e| DripflowError::Http(e.to_string()))?;
    Ok(())
}
