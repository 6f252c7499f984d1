// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package lifecycle orchestration.
//!
//! Both entry points call [`Orchestrator::process_package`]. One call:
//!
//! 1. resolves the package by name, creating it on first sight, and appends
//!    `Created`, `GotAgain` or `Reprocess`;
//! 2. forwards right away when the package already succeeded;
//! 3. packs the payload, stores the container under the package name and
//!    records the outcome in one transaction;
//! 4. forwards the package.
//!
//! Failures keep the severity chosen by the component that produced them.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pkgrelay_config::PkgrelayConfig;
use pkgrelay_core::{
    BlobStore, Failure, FailureCode, Outcome, Package, PackageEventType, PackageRequest,
    PackageStatus, PackageStore, Packer, Publisher, RelayError,
};
use pkgrelay_packing::PackingDispatcher;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::forwarder::Forwarder;
use crate::recorder::ResultRecorder;

/// Timeouts and routing for one orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub blob_timeout: Duration,
    pub forward_timeout: Duration,
    /// Passed to the publisher with every package.
    pub routing_hint: String,
}

impl PipelineSettings {
    pub fn from_config(config: &PkgrelayConfig) -> Self {
        Self {
            blob_timeout: Duration::from_millis(config.blob.timeout_ms),
            forward_timeout: Duration::from_millis(config.forward.timeout_ms),
            routing_hint: config.forward.receipt_url.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&PkgrelayConfig::default())
    }
}

/// Keeps `pkgrelay_packages_in_work` accurate even if the caller drops the future.
struct InWork;

impl InWork {
    fn enter() -> Self {
        pkgrelay_prometheus::inc_in_work();
        InWork
    }
}

impl Drop for InWork {
    fn drop(&mut self) {
        pkgrelay_prometheus::dec_in_work();
    }
}

/// Drives one package request through resolve, pack, store, record and forward.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn PackageStore>,
    blobs: Arc<dyn BlobStore>,
    dispatcher: PackingDispatcher,
    recorder: ResultRecorder,
    forwarder: Forwarder,
    blob_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn PackageStore>,
        blobs: Arc<dyn BlobStore>,
        packer: Arc<dyn Packer>,
        publisher: Arc<dyn Publisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            dispatcher: PackingDispatcher::new(blobs.clone(), packer, settings.blob_timeout),
            recorder: ResultRecorder::new(store.clone()),
            forwarder: Forwarder::new(
                store.clone(),
                publisher,
                settings.routing_hint,
                settings.forward_timeout,
            ),
            blob_timeout: settings.blob_timeout,
            store,
            blobs,
        }
    }

    pub fn store(&self) -> &Arc<dyn PackageStore> {
        &self.store
    }

    /// Process one delivery of `request` and classify the result.
    pub async fn process_package(
        &self,
        request: &PackageRequest,
        cancel: &CancellationToken,
    ) -> Outcome {
        let _in_work = InWork::enter();
        let started = Instant::now();

        let result = self.run(request, cancel).await;

        let elapsed = started.elapsed();
        pkgrelay_prometheus::record_processing_time(elapsed.as_secs_f64());
        match &result {
            Ok(()) => info!(
                package = %request.package_name,
                elapsed_ms = elapsed.as_millis() as u64,
                "package processed"
            ),
            Err(f) => {
                pkgrelay_prometheus::record_error(f.is_critical(), f.code().into());
                warn!(
                    package = %request.package_name,
                    code = %f.code(),
                    severity = %f.severity(),
                    error = %f.developer_message(),
                    "package processing failed"
                );
            }
        }
        Outcome::from(result)
    }

    async fn run(&self, request: &PackageRequest, cancel: &CancellationToken) -> Result<(), Failure> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let mut package = self.resolve(request).await?;

        if package.status == PackageStatus::Success && !request.reprocess {
            info!(package = %package.name, "package already processed, forwarding only");
            return self.forwarder.forward(&package, cancel).await;
        }

        debug!(package = %package.name, package_type = %package.package_type, "packing");
        let packed = until_cancelled(
            cancel,
            self.dispatcher
                .pack(&package.package_type, &request.description),
        )
        .await?;
        let container = match packed {
            Ok(container) => container,
            Err(f) => return Err(self.fail(&mut package, f).await),
        };

        let save_started = Instant::now();
        let saved = until_cancelled(cancel, self.save(&package.name, container)).await?;
        if let Err(f) = saved {
            return Err(self.fail(&mut package, f).await);
        }
        pkgrelay_prometheus::record_blob_save_time(save_started.elapsed().as_secs_f64());

        self.recorder.record(&mut package, Ok(())).await?;

        self.forwarder.forward(&package, cancel).await
    }

    /// Find or create the package and append the receipt event.
    async fn resolve(&self, request: &PackageRequest) -> Result<Package, Failure> {
        let name = &request.package_name;
        let seen_before = if request.reprocess {
            PackageEventType::Reprocess
        } else {
            PackageEventType::GotAgain
        };

        let (mut package, event) = match self.find(name).await? {
            Some(package) => (package, seen_before),
            None => match self.store.insert_package(&request.new_package()).await {
                Ok(package) => (package, PackageEventType::Created),
                Err(RelayError::Conflict { .. }) => {
                    // Another delivery created it first.
                    debug!(package = %name, "lost creation race, re-reading");
                    let package = self.find(name).await?.ok_or_else(|| {
                        Failure::transient(
                            FailureCode::SelectPackage,
                            format!("package {name} conflicted on insert but cannot be read"),
                        )
                    })?;
                    (package, seen_before)
                }
                Err(e) => {
                    return Err(Failure::from_error(
                        FailureCode::InsertPackage,
                        format!("insert package {name}"),
                        e,
                    ));
                }
            },
        };

        // The latest delivery's declared routing wins.
        package.package_type = request.package_type.clone();
        package.destination_url = request.destination_url.clone();

        self.store
            .append_event(package.id, event, &package.name)
            .await
            .map_err(|e| {
                Failure::from_error(
                    FailureCode::InsertEvent,
                    format!("append {event} event for package {name}"),
                    e,
                )
            })?;
        debug!(package = %name, id = package.id, %event, "package resolved");
        Ok(package)
    }

    async fn find(&self, name: &str) -> Result<Option<Package>, Failure> {
        self.store.find_by_name(name).await.map_err(|e| {
            Failure::from_error(
                FailureCode::SelectPackage,
                format!("look up package {name}"),
                e,
            )
        })
    }

    async fn save(&self, name: &str, container: Vec<u8>) -> Result<(), Failure> {
        let err = match tokio::time::timeout(self.blob_timeout, self.blobs.put(name, container)).await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => RelayError::Timeout {
                duration: self.blob_timeout,
            },
        };
        Err(Failure::from_error(
            FailureCode::SaveBlob,
            format!("store container for package {name}"),
            err,
        ))
    }

    /// Record `failure` and return what the caller should see.
    ///
    /// When the outcome cannot be recorded, the recorder's transient failure
    /// replaces the original one so the delivery is retried.
    async fn fail(&self, package: &mut Package, failure: Failure) -> Failure {
        match self.recorder.record(package, Err(&failure)).await {
            Ok(()) => failure,
            Err(unrecorded) => {
                warn!(
                    package = %package.name,
                    original = %failure,
                    "failure outcome not recorded, reporting as transient"
                );
                unrecorded
            }
        }
    }
}

fn cancelled() -> Failure {
    Failure::from_error(
        FailureCode::Cancelled,
        "processing cancelled",
        RelayError::Cancelled,
    )
}

/// Run `fut` unless `cancel` fires first. The outer error is the cancellation.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, Failure> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled()),
        out = fut => Ok(out),
    }
}
