// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON shapes of the description payload, one per package type.

use pkgrelay_core::PackageType;
use serde::Deserialize;

/// One logical message: its id, the blob names of its files, and a free-form description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageSpec {
    pub message_id: String,
    #[serde(default)]
    pub files: Vec<String>,
    pub description: serde_json::Value,
}

/// A technical receipt: blob names and the receipt body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceiptSpec {
    #[serde(default)]
    pub files: Vec<String>,
    pub description: serde_json::Value,
}

/// A decoded description payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Messages(Vec<MessageSpec>),
    Invitation(MessageSpec),
    TechnicalReceipt(ReceiptSpec),
}

impl Payload {
    /// Decode `raw` according to the declared package type.
    pub fn parse(package_type: PackageType, raw: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match package_type {
            PackageType::Messages => Payload::Messages(serde_json::from_slice(raw)?),
            PackageType::Invitation => Payload::Invitation(serde_json::from_slice(raw)?),
            PackageType::TechnicalReceipt => {
                Payload::TechnicalReceipt(serde_json::from_slice(raw)?)
            }
        })
    }
}

/// True when the payload carries no content at all.
pub fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(u8::is_ascii_whitespace)
}
