// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Packing capability trait: turns logical structures into a signed container.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{LogicalMessage, TechnicalReceipt};

/// Produces the opaque binary container for a package.
#[async_trait]
pub trait Packer: PluginAdapter {
    /// Pack one or more logical messages into a single container.
    async fn pack_logical_messages(
        &self,
        messages: Vec<LogicalMessage>,
    ) -> Result<Vec<u8>, RelayError>;

    /// Pack a technical receipt into a container.
    async fn pack_technical_receipt(
        &self,
        receipt: TechnicalReceipt,
    ) -> Result<Vec<u8>, RelayError>;
}
