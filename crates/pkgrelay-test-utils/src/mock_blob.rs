// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory blob store for deterministic testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pkgrelay_core::{AdapterType, BlobStore, HealthStatus, PluginAdapter, RelayError, Severity};

/// A blob store backed by a `HashMap`.
///
/// Missing keys fail like the filesystem store does (transient). Writes can
/// be made to fail with [`MemoryBlobStore::fail_puts`] or to hang with
/// [`MemoryBlobStore::stall_puts`].
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    put_delay: Mutex<Option<Duration>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without counting it as a put.
    pub async fn insert(&self, name: &str, data: &[u8]) {
        self.blobs.lock().await.insert(name.to_string(), data.to_vec());
    }

    pub async fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(name).cloned()
    }

    /// Number of successful `put` calls.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Sleep for `delay` inside every following `put`.
    pub async fn stall_puts(&self, delay: Option<Duration>) {
        *self.put_delay.lock().await = delay;
    }

    /// Make every following `put` fail with a transient error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BlobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Vec<u8>, RelayError> {
        self.blobs
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::Blob {
                key: name.to_string(),
                message: "blob not found".into(),
                severity: Severity::Transient,
                source: None,
            })
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), RelayError> {
        let delay = *self.put_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RelayError::Blob {
                key: name.to_string(),
                message: "storage unavailable".into(),
                severity: Severity::Transient,
                source: None,
            });
        }
        self.blobs.lock().await.insert(name.to_string(), data);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
