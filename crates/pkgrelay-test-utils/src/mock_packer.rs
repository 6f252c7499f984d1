// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock packing capability that records its inputs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pkgrelay_core::{
    AdapterType, HealthStatus, LogicalMessage, Packer, PluginAdapter, RelayError,
    TechnicalReceipt,
};

/// What one packer call received.
#[derive(Debug, Clone, PartialEq)]
pub enum PackCall {
    Messages(Vec<LogicalMessage>),
    Receipt(TechnicalReceipt),
}

/// A packer that returns `container:<ids>` and remembers every call.
#[derive(Default)]
pub struct MockPacker {
    calls: Mutex<Vec<PackCall>>,
    reject: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make following calls fail as a structural defect.
    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Sleep for `delay` before every following pack.
    pub async fn stall(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub async fn calls(&self) -> Vec<PackCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn check(&self) -> Result<(), RelayError> {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(RelayError::Packing {
                message: "mock packer rejected the input".into(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MockPacker {
    fn name(&self) -> &str {
        "mock-packer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Packer
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Packer for MockPacker {
    async fn pack_logical_messages(
        &self,
        messages: Vec<LogicalMessage>,
    ) -> Result<Vec<u8>, RelayError> {
        self.check().await?;
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        let container = format!("container:{}", ids.join(",")).into_bytes();
        self.calls.lock().await.push(PackCall::Messages(messages));
        Ok(container)
    }

    async fn pack_technical_receipt(
        &self,
        receipt: TechnicalReceipt,
    ) -> Result<Vec<u8>, RelayError> {
        self.check().await?;
        self.calls.lock().await.push(PackCall::Receipt(receipt));
        Ok(b"container:receipt".to_vec())
    }
}
