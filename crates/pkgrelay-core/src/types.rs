// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the pkgrelay workspace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Declared package type. Parsed from the wire string, case-insensitive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Messages,
    Invitation,
    TechnicalReceipt,
}

/// Lifecycle status of a package row.
///
/// The string form matches `package_status_enum.package_status_desc`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Created,
    Success,
    Failed,
}

/// Audit event kinds.
///
/// The string form matches `package_event_enum.package_event_desc`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PackageEventType {
    Created,
    GotAgain,
    Reprocess,
    Success,
    Sent,
    Error,
}

/// Error shadow of a failed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageError {
    pub code: String,
    pub text: String,
}

/// One row per logical package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    /// Declared type exactly as the latest delivery sent it.
    pub package_type: String,
    pub destination_url: String,
    pub receiver_is_hub: bool,
    pub receiver_operator_id: String,
    pub sender_operator_id: String,
    pub status: PackageStatus,
    pub created_at: String,
    pub error: Option<PackageError>,
}

/// Fields for inserting a new package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    pub name: String,
    pub package_type: String,
    pub destination_url: String,
    pub receiver_is_hub: bool,
    pub receiver_operator_id: String,
    pub sender_operator_id: String,
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEvent {
    pub id: i64,
    pub package_id: i64,
    pub event_type: PackageEventType,
    pub description: Option<String>,
    pub created_at: String,
}

/// An inbound "create and forward" request, identical for both entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub package_type: String,
    pub package_name: String,
    pub destination_url: String,
    pub receiver_is_hub: bool,
    pub receiver_operator_id: String,
    pub sender_operator_id: String,
    /// Raw JSON description payload. Interpreted by the packing dispatcher.
    pub description: Vec<u8>,
    /// Force packing again even when the package already succeeded.
    pub reprocess: bool,
}

impl PackageRequest {
    /// Insert fields for a first-seen package.
    pub fn new_package(&self) -> NewPackage {
        NewPackage {
            name: self.package_name.clone(),
            package_type: self.package_type.clone(),
            destination_url: self.destination_url.clone(),
            receiver_is_hub: self.receiver_is_hub,
            receiver_operator_id: self.receiver_operator_id.clone(),
            sender_operator_id: self.sender_operator_id.clone(),
        }
    }
}

/// Description attached to a logical message, by message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "body")]
pub enum MessageDescription {
    Message(serde_json::Value),
    Invitation(serde_json::Value),
}

/// A set of named files plus descriptive metadata; the unit the packer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMessage {
    pub id: String,
    pub files: BTreeMap<String, Vec<u8>>,
    pub description: MessageDescription,
}

/// A structured technical receipt with its file catalog filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalReceipt {
    pub description: serde_json::Value,
    pub file_catalog: BTreeMap<String, Vec<u8>>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Identifies the kind of capability behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    PackageStore,
    BlobStore,
    Packer,
    Publisher,
    Observability,
}
