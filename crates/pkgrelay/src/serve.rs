// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pkgrelay serve` command implementation.
//!
//! Opens the package store (failing fast on lookup-table drift), the blob
//! store, the archive packer and the configured publisher, then runs the
//! queue consumer and the HTTP gateway around one shared orchestrator until
//! SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use pkgrelay_bus::{ConsumerSettings, HttpPublisher, QueueConsumer, QueuePublisher};
use pkgrelay_config::model::PkgrelayConfig;
use pkgrelay_config::ForwardMode;
use pkgrelay_core::{PluginAdapter, Publisher, RelayError};
use pkgrelay_packing::ArchivePacker;
use pkgrelay_pipeline::{Orchestrator, PipelineSettings};
use pkgrelay_storage::{Database, FsBlobStore, SqlitePackageStore};
use tracing::{error, info, warn};

#[cfg(feature = "gateway")]
use pkgrelay_gateway::{Gateway, GatewayState};

#[cfg(feature = "prometheus")]
use pkgrelay_prometheus::PrometheusAdapter;

use crate::shutdown;

/// Runs the `pkgrelay serve` command.
pub async fn run_serve(config: PkgrelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting pkgrelay serve");

    #[cfg(feature = "prometheus")]
    let prometheus = if config.prometheus.enabled {
        Some(PrometheusAdapter::new()?)
    } else {
        None
    };

    let store = Arc::new(SqlitePackageStore::open(&config.storage).await?);
    let db = store.database().clone();
    let blobs = Arc::new(FsBlobStore::from_config(&config.blob).await?);
    let packer = Arc::new(ArchivePacker::from_config(&config.packing)?);
    info!(signer = %packer.verifying_key_hex(), "archive packer ready");
    let publisher = build_publisher(&config, &db)?;
    info!(publisher = publisher.name(), "downstream publisher ready");

    let orchestrator = Orchestrator::new(
        store.clone(),
        blobs.clone(),
        packer,
        publisher.clone(),
        PipelineSettings::from_config(&config),
    );

    let cancel = shutdown::install_signal_handler();

    let consumer = QueueConsumer::new(
        db.clone(),
        orchestrator.clone(),
        ConsumerSettings::from_config(&config.queue),
    );
    let consumer_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.run(cancel).await })
    };

    #[cfg(feature = "gateway")]
    let gateway_task = if config.gateway.enabled {
        #[cfg(feature = "prometheus")]
        let render = prometheus.as_ref().map(|p| {
            let handle = p.handle().clone();
            Arc::new(move || handle.render()) as pkgrelay_gateway::MetricsRender
        });
        #[cfg(not(feature = "prometheus"))]
        let render = None;

        let state = GatewayState::new(
            orchestrator.clone(),
            blobs.clone(),
            publisher.clone(),
            config.gateway.bearer_token.clone(),
            render,
            cancel.clone(),
        );
        let gateway = Gateway::new(&config.gateway, state);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            let result = gateway.serve().await;
            if let Err(e) = &result {
                error!(error = %e, "gateway failed; shutting down");
                cancel.cancel();
            }
            result
        }))
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;
    info!("shutdown requested; waiting for in-flight work");

    if let Err(e) = consumer_task.await {
        error!(error = %e, "queue consumer task failed");
    }

    #[cfg(feature = "gateway")]
    let gateway_result = match gateway_task {
        Some(task) => task
            .await
            .map_err(|e| RelayError::Internal(format!("gateway task failed: {e}")))
            .and_then(|r| r),
        None => Ok(()),
    };
    #[cfg(not(feature = "gateway"))]
    let gateway_result: Result<(), RelayError> = Ok(());

    if let Err(e) = publisher.shutdown().await {
        warn!(error = %e, "publisher shutdown failed");
    }
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "package store shutdown failed");
    }

    info!("pkgrelay stopped");
    gateway_result
}

/// Pick the downstream publisher from `forward.mode`.
fn build_publisher(
    config: &PkgrelayConfig,
    db: &Database,
) -> Result<Arc<dyn Publisher>, RelayError> {
    match config.forward.mode {
        ForwardMode::Queue => Ok(Arc::new(QueuePublisher::new(
            db.clone(),
            config.forward.queue_name.clone(),
        ))),
        ForwardMode::Http => {
            let url = config.forward.http_url.clone().ok_or_else(|| {
                RelayError::Config("forward.http_url is required when mode = \"http\"".into())
            })?;
            Ok(Arc::new(HttpPublisher::new(
                url,
                Duration::from_millis(config.forward.timeout_ms),
            )?))
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `service.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pkgrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
