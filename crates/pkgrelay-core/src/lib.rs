// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for pkgrelay.
//!
//! This crate provides the domain types, the failure taxonomy, and the
//! capability traits that the store, blob store, packer, and publisher
//! implementations plug into.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{Failure, FailureCode, Outcome, RelayError, Severity, TransactionStep};
pub use types::{
    AdapterType, HealthStatus, LogicalMessage, MessageDescription, NewPackage, Package,
    PackageError, PackageEvent, PackageEventType, PackageRequest, PackageStatus, PackageType,
    TechnicalReceipt,
};

pub use traits::{BlobStore, PackageStore, Packer, PluginAdapter, Publisher};
