// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem blob store.
//!
//! Blobs are flat files under one root directory. Writes go to a temporary
//! sibling and are renamed into place, so readers never see a partial blob.
//!
//! Any non-empty key is accepted. A key made only of ASCII letters, digits,
//! `.`, `_` and `-` that does not start with `.` is used as the file name
//! as-is; every other key is stored as `~` followed by its hex encoding, so
//! keys such as `out/msg-1` never leave the root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pkgrelay_config::model::BlobConfig;
use pkgrelay_core::{AdapterType, BlobStore, HealthStatus, PluginAdapter, RelayError, Severity};
use tracing::debug;

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the store, creating the root directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, RelayError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| RelayError::Config(format!("cannot create blob root {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    pub async fn from_config(config: &BlobConfig) -> Result<Self, RelayError> {
        Self::open(&config.root_dir).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, RelayError> {
        Ok(self.root.join(file_name(key)?))
    }
}

fn is_plain(key: &str) -> bool {
    !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// File name for `key`. Plain names never start with `~` or `.`, so encoded
/// names and temp files cannot collide with them.
fn file_name(key: &str) -> Result<String, RelayError> {
    if key.is_empty() {
        return Err(RelayError::Blob {
            key: String::new(),
            message: "blob name is empty".to_string(),
            severity: Severity::Critical,
            source: None,
        });
    }
    if is_plain(key) {
        Ok(key.to_string())
    } else {
        Ok(format!("~{}", hex::encode(key.as_bytes())))
    }
}

fn io_error(key: &str, action: &str, err: std::io::Error) -> RelayError {
    let message = match err.kind() {
        ErrorKind::NotFound => format!("{action}: blob not found"),
        _ => format!("{action}: {err}"),
    };
    // Every I/O failure is retryable, a missing file included.
    RelayError::Blob {
        key: key.to_string(),
        message,
        severity: Severity::Transient,
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl PluginAdapter for FsBlobStore {
    fn name(&self) -> &str {
        "fs-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BlobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Ok(HealthStatus::Healthy),
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Degraded(format!(
                "{} is read-only",
                self.root.display()
            ))),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "{}: {e}",
                self.root.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, name: &str) -> Result<Vec<u8>, RelayError> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(name, "read", e))
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), RelayError> {
        let path = self.path_for(name)?;
        let tmp = self.root.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let size = data.len();

        if let Err(e) = tokio::fs::write(&tmp, data).await {
            return Err(io_error(name, "write", e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(name, "rename", e));
        }
        debug!(blob = name, size, "blob stored");
        Ok(())
    }
}
