// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store trait for package payload files and packed containers.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;

/// Simple durable key/blob store.
///
/// Errors are [`RelayError::Blob`] and carry the severity the store assigns.
#[async_trait]
pub trait BlobStore: PluginAdapter {
    /// Read the blob stored under `name`.
    async fn get(&self, name: &str) -> Result<Vec<u8>, RelayError>;

    /// Store `data` under `name`, replacing any previous blob.
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), RelayError>;
}
