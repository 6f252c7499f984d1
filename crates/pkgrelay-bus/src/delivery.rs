// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shape of an inbound queue delivery.

use pkgrelay_core::PackageRequest;
use pkgrelay_storage::QueueEntry;
use serde::{Deserialize, Serialize};

/// JSON payload of an inbound queue entry.
///
/// `description` is the package description as JSON. A JSON string is taken
/// as already-encoded JSON text. A missing or null description becomes an
/// empty payload, which the pipeline rejects after recording the package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    pub package_type: String,
    pub package_name: String,
    pub destination_url: String,
    #[serde(default)]
    pub receiver_is_hub: bool,
    pub receiver_operator_id: String,
    pub sender_operator_id: String,
    #[serde(default)]
    pub description: serde_json::Value,
    #[serde(default)]
    pub reprocess: bool,
}

/// Why a queue payload cannot become a request.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed delivery envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("delivery envelope has an empty `{0}`")]
    EmptyField(&'static str),
}

impl DeliveryEnvelope {
    pub fn parse(payload: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(payload)?;
        for (field, value) in [
            ("package_type", &envelope.package_type),
            ("package_name", &envelope.package_name),
            ("destination_url", &envelope.destination_url),
            ("receiver_operator_id", &envelope.receiver_operator_id),
            ("sender_operator_id", &envelope.sender_operator_id),
        ] {
            if value.trim().is_empty() {
                return Err(EnvelopeError::EmptyField(field));
            }
        }
        Ok(envelope)
    }

    pub fn into_request(self) -> PackageRequest {
        let description = match self.description {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::String(text) => text.into_bytes(),
            other => other.to_string().into_bytes(),
        };
        PackageRequest {
            package_type: self.package_type,
            package_name: self.package_name,
            destination_url: self.destination_url,
            receiver_is_hub: self.receiver_is_hub,
            receiver_operator_id: self.receiver_operator_id,
            sender_operator_id: self.sender_operator_id,
            description,
            reprocess: self.reprocess,
        }
    }
}

/// A decoded queue entry ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub entry_id: i64,
    /// 1 on the first delivery, incremented on every redelivery.
    pub deliveries: u32,
    pub request: PackageRequest,
}

impl Delivery {
    pub fn decode(entry: &QueueEntry) -> Result<Self, EnvelopeError> {
        Ok(Self {
            entry_id: entry.id,
            deliveries: entry.deliveries,
            request: DeliveryEnvelope::parse(&entry.payload)?.into_request(),
        })
    }

    pub fn is_first(&self) -> bool {
        self.deliveries <= 1
    }
}
