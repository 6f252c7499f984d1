// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock downstream publisher capturing published packages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pkgrelay_core::{AdapterType, HealthStatus, Package, PluginAdapter, Publisher, RelayError};

/// One captured publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub package_name: String,
    pub package_id: i64,
    pub routing_hint: String,
}

/// A publisher that records calls, and can be made to fail or stall.
#[derive(Default)]
pub struct MockPublisher {
    published: Mutex<Vec<Published>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make following publishes fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Sleep for `delay` inside every following publish.
    pub async fn stall(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub async fn published(&self) -> Vec<Published> {
        self.published.lock().await.clone()
    }

    pub async fn publish_count(&self) -> usize {
        self.published.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockPublisher {
    fn name(&self) -> &str {
        "mock-publisher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Publisher
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("mock publisher failing".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, package: &Package, routing_hint: &str) -> Result<(), RelayError> {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Publish {
                message: "downstream unavailable".into(),
                source: None,
            });
        }
        self.published.lock().await.push(Published {
            package_name: package.name.clone(),
            package_id: package.id,
            routing_hint: routing_hint.to_string(),
        });
        Ok(())
    }
}
