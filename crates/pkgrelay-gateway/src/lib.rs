// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway: the synchronous entry point of pkgrelay.
//!
//! `POST /v1/packages` runs a package through the same orchestrator the
//! queue consumer uses and answers with the outcome. Lookup, health and
//! metrics endpoints sit alongside it.

pub mod auth;
pub mod handlers;
pub mod server;

use axum::Router;
use pkgrelay_config::model::GatewayConfig;
use pkgrelay_core::RelayError;

pub use auth::AuthConfig;
pub use server::{router, GatewayState, HealthState, MetricsRender, ServerConfig};

/// A configured gateway ready to serve.
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, state: GatewayState) -> Self {
        if state.auth.bearer_token.is_none() {
            tracing::warn!("gateway.bearer_token is not set; every /v1 request will be rejected");
        }
        Self {
            config: ServerConfig {
                host: config.host.clone(),
                port: config.port,
            },
            state,
        }
    }

    pub fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    /// Serve until the state's shutdown token fires.
    pub async fn serve(self) -> Result<(), RelayError> {
        let shutdown = self.state.shutdown.clone();
        server::start_server(&self.config, self.state, shutdown).await
    }
}
