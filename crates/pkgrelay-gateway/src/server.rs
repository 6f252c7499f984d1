// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use pkgrelay_core::{BlobStore, PackageStore, Publisher, RelayError};
use pkgrelay_pipeline::Orchestrator;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Prometheus text renderer for `/metrics`.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// `None` when the exporter is disabled; `/metrics` then answers 404.
    pub prometheus_render: Option<MetricsRender>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    pub store: Arc<dyn PackageStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub publisher: Arc<dyn Publisher>,
    pub auth: AuthConfig,
    pub health: HealthState,
    /// Fires on shutdown; aborts requests that have not committed yet.
    pub shutdown: CancellationToken,
}

impl GatewayState {
    /// Assemble handler state around an orchestrator. The store probed by
    /// `/health` and read by the lookup route is the orchestrator's own.
    pub fn new(
        orchestrator: Orchestrator,
        blobs: Arc<dyn BlobStore>,
        publisher: Arc<dyn Publisher>,
        bearer_token: Option<String>,
        prometheus_render: Option<MetricsRender>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store: orchestrator.store().clone(),
            orchestrator,
            blobs,
            publisher,
            auth: AuthConfig { bearer_token },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
            shutdown,
        }
    }
}

/// Bind address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the gateway router.
///
/// - `POST /v1/packages` (bearer auth)
/// - `GET /v1/packages/{name}` (bearer auth)
/// - `GET /health`, `GET /metrics` (public)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/packages", post(handlers::post_package))
        .route("/v1/packages/{name}", get(handlers::get_package))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway until `shutdown` fires, then drain in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
