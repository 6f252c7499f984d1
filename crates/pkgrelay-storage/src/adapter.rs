// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the PackageStore trait.

use async_trait::async_trait;
use tracing::debug;

use pkgrelay_config::model::StorageConfig;
use pkgrelay_core::{
    AdapterType, HealthStatus, NewPackage, Package, PackageEvent, PackageEventType, PackageStore,
    PluginAdapter, RelayError,
};

use crate::database::{map_call_err, map_tr_err, Database};
use crate::queries::{destination_urls, events, packages};

/// SQLite-backed package store.
///
/// Every method is one `call` on the shared connection thread; the sync
/// query functions do the work inside the closure.
#[derive(Clone)]
pub struct SqlitePackageStore {
    db: Database,
}

impl SqlitePackageStore {
    /// Open the configured database. Fails on lookup-table drift.
    pub async fn open(config: &StorageConfig) -> Result<Self, RelayError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite package store initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// The underlying handle, shared with the delivery queue.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqlitePackageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PackageStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PackageStore for SqlitePackageStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Package>, RelayError> {
        let enums = self.db.enums();
        let name = name.to_string();
        self.db
            .connection()
            .call(move |conn| packages::find_by_name(conn, &enums, &name))
            .await
            .map_err(map_call_err)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Package>, RelayError> {
        let enums = self.db.enums();
        self.db
            .connection()
            .call(move |conn| packages::find_by_id(conn, &enums, id))
            .await
            .map_err(map_call_err)
    }

    async fn insert_package(&self, package: &NewPackage) -> Result<Package, RelayError> {
        let enums = self.db.enums();
        let package = package.clone();
        self.db
            .connection()
            .call(move |conn| packages::insert_package(conn, &enums, &package))
            .await
            .map_err(map_call_err)
    }

    async fn update_package(&self, package: &Package) -> Result<(), RelayError> {
        let enums = self.db.enums();
        let package = package.clone();
        self.db
            .connection()
            .call(move |conn| packages::update_package(conn, &enums, &package))
            .await
            .map_err(map_call_err)
    }

    async fn append_event(
        &self,
        package_id: i64,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError> {
        let enums = self.db.enums();
        let description = description.to_string();
        self.db
            .connection()
            .call(move |conn| {
                events::append_event(conn, &enums, package_id, event, &description).map(|_| ())
            })
            .await
            .map_err(map_call_err)
    }

    async fn list_events(&self, package_id: i64) -> Result<Vec<PackageEvent>, RelayError> {
        let enums = self.db.enums();
        self.db
            .connection()
            .call(move |conn| events::list_events(conn, &enums, package_id))
            .await
            .map_err(map_call_err)
    }

    async fn record_outcome(
        &self,
        package: &Package,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError> {
        let enums = self.db.enums();
        let package = package.clone();
        let description = description.to_string();
        self.db
            .connection()
            .call(move |conn| events::record_outcome(conn, &enums, &package, event, &description))
            .await
            .map_err(map_call_err)
    }

    async fn destination_url_id(&self, url: &str) -> Result<i64, RelayError> {
        let url = url.to_string();
        self.db
            .connection()
            .call(move |conn| destination_urls::get_or_insert(conn, &url))
            .await
            .map_err(map_call_err)
    }
}
