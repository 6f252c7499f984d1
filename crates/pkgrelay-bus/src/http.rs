// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream publishing over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use pkgrelay_core::{AdapterType, HealthStatus, Package, PluginAdapter, Publisher, RelayError};
use tracing::debug;

use crate::publisher::ForwardEnvelope;

/// POSTs a [`ForwardEnvelope`] as JSON to a fixed URL. Non-2xx is a failure.
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpPublisher {
    fn name(&self) -> &str {
        "http-publisher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Publisher
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, package: &Package, routing_hint: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ForwardEnvelope::new(package, routing_hint))
            .send()
            .await
            .map_err(|e| RelayError::Publish {
                message: format!("POST {}", self.url),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Publish {
                message: format!("downstream answered {status}: {body}"),
                source: None,
            });
        }
        debug!(package = %package.name, %status, "package published over HTTP");
        Ok(())
    }
}
