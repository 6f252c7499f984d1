// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream publishing onto the durable queue.

use async_trait::async_trait;
use pkgrelay_core::{AdapterType, HealthStatus, Package, PluginAdapter, Publisher, RelayError};
use pkgrelay_storage::queries::queue;
use pkgrelay_storage::Database;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the downstream service receives: a reference to the stored
/// container (keyed by `package_name`), never the container itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardEnvelope {
    pub package_id: i64,
    pub package_name: String,
    pub package_type: String,
    pub destination_url: String,
    pub receiver_is_hub: bool,
    pub receiver_operator_id: String,
    pub sender_operator_id: String,
    pub routing_hint: String,
}

impl ForwardEnvelope {
    pub fn new(package: &Package, routing_hint: &str) -> Self {
        Self {
            package_id: package.id,
            package_name: package.name.clone(),
            package_type: package.package_type.clone(),
            destination_url: package.destination_url.clone(),
            receiver_is_hub: package.receiver_is_hub,
            receiver_operator_id: package.receiver_operator_id.clone(),
            sender_operator_id: package.sender_operator_id.clone(),
            routing_hint: routing_hint.to_string(),
        }
    }
}

fn publish_err(message: &str, source: impl std::error::Error + Send + Sync + 'static) -> RelayError {
    RelayError::Publish {
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}

/// Publishes forward envelopes onto a named `delivery_queue`.
pub struct QueuePublisher {
    db: Database,
    queue_name: String,
}

impl QueuePublisher {
    pub fn new(db: Database, queue_name: impl Into<String>) -> Self {
        Self {
            db,
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl PluginAdapter for QueuePublisher {
    fn name(&self) -> &str {
        "queue-publisher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Publisher
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match queue::queue_depth(&self.db, &self.queue_name).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("queue unavailable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Publisher for QueuePublisher {
    async fn publish(&self, package: &Package, routing_hint: &str) -> Result<(), RelayError> {
        let payload = serde_json::to_string(&ForwardEnvelope::new(package, routing_hint))
            .map_err(|e| publish_err("encode forward envelope", e))?;
        let id = queue::enqueue(&self.db, &self.queue_name, &payload)
            .await
            .map_err(|e| RelayError::Publish {
                message: format!("enqueue on {}", self.queue_name),
                source: Some(Box::new(e)),
            })?;
        debug!(package = %package.name, queue = %self.queue_name, entry_id = id, "package published");
        Ok(())
    }
}
