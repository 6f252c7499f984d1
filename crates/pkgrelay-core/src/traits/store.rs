// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package store trait: packages, audit events, and destination URLs.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{NewPackage, Package, PackageEvent, PackageEventType};

/// Durable record of packages, their status, and the append-only event log.
///
/// Implementations must make `insert_package` fail with
/// [`RelayError::Conflict`] when the name already exists, so that a caller
/// losing a creation race can fall back to re-reading the existing row.
#[async_trait]
pub trait PackageStore: PluginAdapter {
    /// Look up a package by its unique name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Package>, RelayError>;

    /// Look up a package by its store-assigned id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Package>, RelayError>;

    /// Insert a new package in `Created` status.
    async fn insert_package(&self, package: &NewPackage) -> Result<Package, RelayError>;

    /// Persist the mutable fields of a package (status, error, routing).
    async fn update_package(&self, package: &Package) -> Result<(), RelayError>;

    /// Append one audit event.
    async fn append_event(
        &self,
        package_id: i64,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError>;

    /// All events of a package in insertion order.
    async fn list_events(&self, package_id: i64) -> Result<Vec<PackageEvent>, RelayError>;

    /// Append `event` and update `package` inside a single transaction.
    ///
    /// Either both statements commit or neither does.
    async fn record_outcome(
        &self,
        package: &Package,
        event: PackageEventType,
        description: &str,
    ) -> Result<(), RelayError>;

    /// Race-safe get-or-insert of a destination URL, returning its id.
    async fn destination_url_id(&self, url: &str) -> Result<i64, RelayError>;
}
