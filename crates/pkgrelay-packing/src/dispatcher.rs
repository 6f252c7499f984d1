// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes a declared package type to the packing capability.
//!
//! The dispatcher owns input validation (blank payload, unknown type,
//! malformed JSON), fetches every referenced file from the blob store and
//! hands the assembled structures to the [`Packer`]. Each failure carries
//! the severity of the component that produced it.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use pkgrelay_core::{
    BlobStore, Failure, FailureCode, LogicalMessage, MessageDescription, PackageType, Packer,
    RelayError, Severity, TechnicalReceipt,
};
use tracing::debug;

use crate::payload::{self, MessageSpec, Payload};

/// Assembles packer input from a raw description payload.
#[derive(Clone)]
pub struct PackingDispatcher {
    blobs: Arc<dyn BlobStore>,
    packer: Arc<dyn Packer>,
    blob_timeout: Duration,
}

impl PackingDispatcher {
    pub fn new(blobs: Arc<dyn BlobStore>, packer: Arc<dyn Packer>, blob_timeout: Duration) -> Self {
        Self {
            blobs,
            packer,
            blob_timeout,
        }
    }

    /// Pack `raw` according to the declared `package_type`.
    pub async fn pack(&self, package_type: &str, raw: &[u8]) -> Result<Vec<u8>, Failure> {
        if payload::is_blank(raw) {
            return Err(Failure::critical(
                FailureCode::EmptyBody,
                "description payload is empty",
            ));
        }

        let kind = PackageType::from_str(package_type).map_err(|_| {
            Failure::critical(
                FailureCode::UnknownPackageType,
                format!("unknown package type `{package_type}`"),
            )
        })?;

        let payload = Payload::parse(kind, raw).map_err(|e| {
            Failure::critical(
                FailureCode::Unmarshal,
                format!("decode {kind} description: {e}"),
            )
        })?;

        let packed = match payload {
            Payload::Messages(specs) => {
                let mut messages = Vec::with_capacity(specs.len());
                for spec in specs {
                    messages.push(self.logical_message(spec, MessageDescription::Message).await?);
                }
                self.packer.pack_logical_messages(messages).await
            }
            Payload::Invitation(spec) => {
                let message = self
                    .logical_message(spec, MessageDescription::Invitation)
                    .await?;
                self.packer.pack_logical_messages(vec![message]).await
            }
            Payload::TechnicalReceipt(spec) => {
                let file_catalog = self.fetch_files(&spec.files).await?;
                self.packer
                    .pack_technical_receipt(TechnicalReceipt {
                        description: spec.description,
                        file_catalog,
                    })
                    .await
            }
        };

        let container = packed.map_err(|e| {
            Failure::with_severity(
                FailureCode::PackContainer,
                Severity::Critical,
                format!("pack {kind} container"),
                e,
            )
        })?;
        debug!(package_type = %kind, size = container.len(), "package packed");
        Ok(container)
    }

    async fn logical_message(
        &self,
        spec: MessageSpec,
        describe: fn(serde_json::Value) -> MessageDescription,
    ) -> Result<LogicalMessage, Failure> {
        let files = self
            .fetch_files(&spec.files)
            .await
            .map_err(|f| f.context(format!("message {}", spec.message_id)))?;
        Ok(LogicalMessage {
            id: spec.message_id,
            files,
            description: describe(spec.description),
        })
    }

    /// Fetch every named file, in order, each bounded by the blob timeout.
    /// A name listed more than once is fetched and packed once.
    async fn fetch_files(&self, names: &[String]) -> Result<BTreeMap<String, Vec<u8>>, Failure> {
        let mut files = BTreeMap::new();
        for name in names {
            if files.contains_key(name) {
                continue;
            }
            let data = match tokio::time::timeout(self.blob_timeout, self.blobs.get(name)).await {
                Ok(Ok(data)) => data,
                Ok(Err(e)) => {
                    return Err(Failure::from_error(
                        FailureCode::GetBlob,
                        format!("fetch file `{name}`"),
                        e,
                    ));
                }
                Err(_) => {
                    return Err(Failure::from_error(
                        FailureCode::GetBlob,
                        format!("fetch file `{name}`"),
                        RelayError::Timeout {
                            duration: self.blob_timeout,
                        },
                    ));
                }
            };
            files.insert(name.clone(), data);
        }
        Ok(files)
    }
}
