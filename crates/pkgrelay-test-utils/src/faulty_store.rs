// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package store wrapper with switchable faults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use pkgrelay_core::{
    AdapterType, HealthStatus, NewPackage, Package, PackageEvent, PackageEventType, PackageStore,
    PluginAdapter, RelayError, TransactionStep,
};

/// Delegates to a real store unless a fault is switched on.
pub struct FaultyStore {
    inner: Arc<dyn PackageStore>,
    fail_sent_events: AtomicBool,
    fail_commits: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn PackageStore>) -> Self {
        Self {
            inner,
            fail_sent_events: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Fail every `Sent` event append.
    pub fn fail_sent_events(&self, fail: bool) {
        self.fail_sent_events.store(fail, Ordering::SeqCst);
    }

    /// Fail every `record_outcome` at commit, without writing anything.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for FaultyStore {
    fn name(&self) -> &str {
        "faulty-store"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PackageStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl PackageStore for FaultyStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Package>, RelayError> {
        self.inner.find_by_name(name).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Package>, RelayError> {
        self.inner.find_by_id(id).await
    }

    async fn insert_package(&self, package: &NewPackage) -> Result<Package, RelayError> {
        self.inner.insert_package(package).await
    }

    async fn update_package(&self, package: &Package) -> Result<(), RelayError> {
        self.inner.update_package(package).await
    }

    async fn append_event(
        &self,
        package_id: i64,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError> {
        if event == PackageEventType::Sent && self.fail_sent_events.load(Ordering::SeqCst) {
            return Err(RelayError::storage(std::io::Error::other("disk full")));
        }
        self.inner.append_event(package_id, event, description).await
    }

    async fn list_events(&self, package_id: i64) -> Result<Vec<PackageEvent>, RelayError> {
        self.inner.list_events(package_id).await
    }

    async fn record_outcome(
        &self,
        package: &Package,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(RelayError::Transaction {
                step: TransactionStep::Commit,
                source: "database is locked".into(),
            });
        }
        self.inner.record_outcome(package, event, description).await
    }

    async fn destination_url_id(&self, url: &str) -> Result<i64, RelayError> {
        self.inner.destination_url_id(url).await
    }
}
