// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream channel trait.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Package;

/// Publishes a completed package reference to the downstream service.
#[async_trait]
pub trait Publisher: PluginAdapter {
    /// Publish `package` with the given routing hint.
    async fn publish(&self, package: &Package, routing_hint: &str) -> Result<(), RelayError>;
}
