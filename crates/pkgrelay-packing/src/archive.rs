// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed tar.gz container.
//!
//! Layout:
//!
//! ```text
//! <message_id>/<file>            one directory per logical message
//! <message_id>/description.json
//! receipt/<file>                 technical receipts instead use `receipt/`
//! receipt/description.json
//! manifest.json                  path, size and SHA-256 of every entry above
//! manifest.sig                   hex Ed25519 signature over manifest.json
//! ```

use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pkgrelay_config::model::PackingConfig;
use pkgrelay_core::{
    AdapterType, HealthStatus, LogicalMessage, Packer, PluginAdapter, RelayError,
    TechnicalReceipt,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const DESCRIPTION_FILE: &str = "description.json";
const MANIFEST_FILE: &str = "manifest.json";
const SIGNATURE_FILE: &str = "manifest.sig";
const RECEIPT_DIR: &str = "receipt";

/// What a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    LogicalMessages,
    TechnicalReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Signed table of contents of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub kind: ContainerKind,
    /// Hex-encoded verifying key of the signer.
    pub signer: String,
    pub entries: Vec<ManifestEntry>,
}

/// A decoded container.
#[derive(Debug, Clone)]
pub struct Container {
    pub manifest: Manifest,
    pub files: BTreeMap<String, Vec<u8>>,
    manifest_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl Container {
    /// Check the signature and every digest against `key`.
    pub fn verify(&self, key: &VerifyingKey) -> Result<(), RelayError> {
        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| packing_err("malformed manifest signature", Some(e)))?;
        key.verify(&self.manifest_bytes, &signature)
            .map_err(|e| packing_err("manifest signature does not verify", Some(e)))?;

        for entry in &self.manifest.entries {
            let data = self.files.get(&entry.path).ok_or_else(|| {
                packing_err::<std::io::Error>(&format!("missing entry {}", entry.path), None)
            })?;
            if hex::encode(Sha256::digest(data)) != entry.sha256 {
                return Err(packing_err::<std::io::Error>(
                    &format!("digest mismatch for {}", entry.path),
                    None,
                ));
            }
        }
        Ok(())
    }
}

fn packing_err<E>(message: &str, source: Option<E>) -> RelayError
where
    E: std::error::Error + Send + Sync + 'static,
{
    RelayError::Packing {
        message: message.to_string(),
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

fn defect(message: String) -> RelayError {
    RelayError::Packing {
        message,
        source: None,
    }
}

/// A single path component that cannot escape its directory.
fn check_component(what: &str, value: &str) -> Result<(), RelayError> {
    if value.is_empty() {
        return Err(defect(format!("{what} is empty")));
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(defect(format!("{what} `{value}` is not a valid path component")));
    }
    Ok(())
}

/// Packer producing signed tar.gz containers.
pub struct ArchivePacker {
    signing_key: SigningKey,
}

impl ArchivePacker {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Packer with a fresh random key.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Build from config: the hex seed when present, otherwise a generated key.
    pub fn from_config(config: &PackingConfig) -> Result<Self, RelayError> {
        match config.signing_key.as_deref() {
            Some(seed_hex) => {
                let seed: [u8; 32] = hex::decode(seed_hex.trim())
                    .map_err(|e| RelayError::Config(format!("packing.signing_key: {e}")))?
                    .try_into()
                    .map_err(|_| {
                        RelayError::Config("packing.signing_key must decode to 32 bytes".into())
                    })?;
                Ok(Self::new(SigningKey::from_bytes(&seed)))
            }
            None => {
                let packer = Self::generate();
                warn!(
                    signer = %packer.verifying_key_hex(),
                    "packing.signing_key not set; containers are signed with an ephemeral key"
                );
                Ok(packer)
            }
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    /// Digest, sign and compress on the blocking pool; large containers must
    /// not stall the async workers.
    async fn build(
        &self,
        kind: ContainerKind,
        entries: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<u8>, RelayError> {
        let signing_key = self.signing_key.clone();
        tokio::task::spawn_blocking(move || build_container(&signing_key, kind, entries))
            .await
            .map_err(|e| RelayError::Internal(format!("container build task failed: {e}")))?
    }
}

fn build_container(
    signing_key: &SigningKey,
    kind: ContainerKind,
    entries: Vec<(String, Vec<u8>)>,
) -> Result<Vec<u8>, RelayError> {
    let manifest = Manifest {
        kind,
        signer: hex::encode(signing_key.verifying_key().to_bytes()),
        entries: entries
            .iter()
            .map(|(path, data)| ManifestEntry {
                path: path.clone(),
                size: data.len() as u64,
                sha256: hex::encode(Sha256::digest(data)),
            })
            .collect(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| packing_err("encode manifest", Some(e)))?;
    let signature = hex::encode(signing_key.sign(&manifest_bytes).to_bytes());

    let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let all = entries
        .iter()
        .map(|(p, d)| (p.as_str(), d.as_slice()))
        .chain([
            (MANIFEST_FILE, manifest_bytes.as_slice()),
            (SIGNATURE_FILE, signature.as_bytes()),
        ]);
    for (path, data) in all {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        tar.append_data(&mut header, path, data)
            .map_err(|e| packing_err(&format!("append {path}"), Some(e)))?;
    }

    let gz = tar
        .into_inner()
        .map_err(|e| packing_err("finish tar stream", Some(e)))?;
    let mut bytes = gz
        .finish()
        .map_err(|e| packing_err("finish gzip stream", Some(e)))?;
    bytes.flush().map_err(|e| packing_err("flush container", Some(e)))?;

    debug!(?kind, entries = manifest.entries.len(), size = bytes.len(), "container built");
    Ok(bytes)
}

/// Decode a container produced by [`ArchivePacker`]. Does not verify it.
pub fn unpack(bytes: &[u8]) -> Result<Container, RelayError> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = BTreeMap::new();
    let entries = archive
        .entries()
        .map_err(|e| packing_err("read container", Some(e)))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| packing_err("read entry", Some(e)))?;
        let path = entry
            .path()
            .map_err(|e| packing_err("read entry path", Some(e)))?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| packing_err(&format!("read {path}"), Some(e)))?;
        files.insert(path, data);
    }

    let manifest_bytes = files
        .remove(MANIFEST_FILE)
        .ok_or_else(|| defect("container has no manifest".into()))?;
    let signature_hex = files
        .remove(SIGNATURE_FILE)
        .ok_or_else(|| defect("container has no signature".into()))?;
    let signature = hex::decode(&signature_hex)
        .map_err(|e| packing_err("decode manifest signature", Some(e)))?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| packing_err("decode manifest", Some(e)))?;

    Ok(Container {
        manifest,
        files,
        manifest_bytes,
        signature,
    })
}

#[async_trait]
impl PluginAdapter for ArchivePacker {
    fn name(&self) -> &str {
        "archive"
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
impl Packer for ArchivePacker {
    async fn pack_logical_messages(
        &self,
        messages: Vec<LogicalMessage>,
    ) -> Result<Vec<u8>, RelayError> {
        if messages.is_empty() {
            return Err(defect("no logical messages to pack".into()));
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for message in messages {
            check_component("message id", &message.id)?;
            if message.id == MANIFEST_FILE || message.id == SIGNATURE_FILE {
                return Err(defect(format!("message id `{}` is reserved", message.id)));
            }
            if !seen.insert(message.id.clone()) {
                return Err(defect(format!("duplicate message id `{}`", message.id)));
            }

            for (name, data) in message.files {
                check_component("file name", &name)?;
                if name == DESCRIPTION_FILE {
                    return Err(defect(format!(
                        "message `{}` has a file named {DESCRIPTION_FILE}",
                        message.id
                    )));
                }
                entries.push((format!("{}/{name}", message.id), data));
            }
            let description = serde_json::to_vec_pretty(&message.description)
                .map_err(|e| packing_err("encode description", Some(e)))?;
            entries.push((format!("{}/{DESCRIPTION_FILE}", message.id), description));
        }

        self.build(ContainerKind::LogicalMessages, entries).await
    }

    async fn pack_technical_receipt(
        &self,
        receipt: TechnicalReceipt,
    ) -> Result<Vec<u8>, RelayError> {
        if receipt.file_catalog.is_empty() {
            return Err(defect("technical receipt has no files".into()));
        }

        let mut entries = Vec::with_capacity(receipt.file_catalog.len() + 1);
        for (name, data) in receipt.file_catalog {
            check_component("file name", &name)?;
            if name == DESCRIPTION_FILE {
                return Err(defect(format!("receipt has a file named {DESCRIPTION_FILE}")));
            }
            entries.push((format!("{RECEIPT_DIR}/{name}"), data));
        }
        let description = serde_json::to_vec_pretty(&receipt.description)
            .map_err(|e| packing_err("encode description", Some(e)))?;
        entries.push((format!("{RECEIPT_DIR}/{DESCRIPTION_FILE}"), description));

        self.build(ContainerKind::TechnicalReceipt, entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrelay_core::MessageDescription;
    use serde_json::json;

    fn message(id: &str, files: &[(&str, &[u8])]) -> LogicalMessage {
        LogicalMessage {
            id: id.to_string(),
            files: files
                .iter()
                .map(|(n, d)| (n.to_string(), d.to_vec()))
                .collect(),
            description: MessageDescription::Message(json!({"subject": id})),
        }
    }

    #[tokio::test]
    async fn packs_and_verifies_logical_messages() {
        let packer = ArchivePacker::generate();
        let bytes = packer
            .pack_logical_messages(vec![
                message("m1", &[("a.txt", b"alpha")]),
                message("m2", &[("b.txt", b"beta"), ("c.txt", b"gamma")]),
            ])
            .await
            .unwrap();

        let container = unpack(&bytes).unwrap();
        container.verify(&packer.verifying_key()).unwrap();
        assert_eq!(container.manifest.kind, ContainerKind::LogicalMessages);
        assert_eq!(container.files["m1/a.txt"], b"alpha");
        assert_eq!(container.files["m2/c.txt"], b"gamma");
        let desc: serde_json::Value =
            serde_json::from_slice(&container.files["m1/description.json"]).unwrap();
        assert_eq!(desc["kind"], "message");
        assert_eq!(desc["body"]["subject"], "m1");
        assert_eq!(container.manifest.entries.len(), 5);
    }

    #[tokio::test]
    async fn another_key_does_not_verify() {
        let packer = ArchivePacker::generate();
        let bytes = packer
            .pack_logical_messages(vec![message("m1", &[("a.txt", b"x")])])
            .await
            .unwrap();
        let other = ArchivePacker::generate();
        assert!(unpack(&bytes).unwrap().verify(&other.verifying_key()).is_err());
    }

    #[tokio::test]
    async fn structural_defects_are_rejected() {
        let packer = ArchivePacker::generate();
        let cases = vec![
            vec![],
            vec![message("", &[])],
            vec![message("m1", &[]), message("m1", &[])],
            vec![message("../up", &[])],
            vec![message("m1", &[("description.json", b"{}")])],
        ];
        for case in cases {
            let err = packer.pack_logical_messages(case).await.unwrap_err();
            assert!(matches!(err, RelayError::Packing { .. }), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn technical_receipt_requires_files() {
        let packer = ArchivePacker::generate();
        let empty = TechnicalReceipt {
            description: json!({"status": "accepted"}),
            file_catalog: BTreeMap::new(),
        };
        assert!(packer.pack_technical_receipt(empty).await.is_err());

        let receipt = TechnicalReceipt {
            description: json!({"status": "accepted"}),
            file_catalog: [("r.xml".to_string(), b"<r/>".to_vec())].into_iter().collect(),
        };
        let bytes = packer.pack_technical_receipt(receipt).await.unwrap();
        let container = unpack(&bytes).unwrap();
        container.verify(&packer.verifying_key()).unwrap();
        assert_eq!(container.manifest.kind, ContainerKind::TechnicalReceipt);
        assert!(container.files.contains_key("receipt/r.xml"));
    }

    #[tokio::test]
    async fn large_container_is_built_off_the_async_worker() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let packer = Arc::new(ArchivePacker::generate());
        let ticked = Arc::new(AtomicBool::new(false));
        let big = vec![7u8; 4 * 1024 * 1024];

        // Single-threaded runtime: the tick can only run if packing yields.
        let pack = {
            let packer = packer.clone();
            let ticked = ticked.clone();
            tokio::spawn(async move {
                let bytes = packer
                    .pack_logical_messages(vec![message("m1", &[("big.bin", big.as_slice())])])
                    .await
                    .unwrap();
                (bytes, ticked.load(Ordering::SeqCst))
            })
        };
        let tick = {
            let ticked = ticked.clone();
            tokio::spawn(async move { ticked.store(true, Ordering::SeqCst) })
        };

        let (bytes, ticked_while_building) = pack.await.unwrap();
        tick.await.unwrap();
        assert!(ticked_while_building);
        let container = unpack(&bytes).unwrap();
        container.verify(&packer.verifying_key()).unwrap();
        assert_eq!(container.files["m1/big.bin"].len(), 4 * 1024 * 1024);
    }

    #[test]
    fn key_from_config_seed_is_deterministic() {
        let config = PackingConfig {
            signing_key: Some("07".repeat(32)),
        };
        let a = ArchivePacker::from_config(&config).unwrap();
        let b = ArchivePacker::from_config(&config).unwrap();
        assert_eq!(a.verifying_key_hex(), b.verifying_key_hex());

        let bad = PackingConfig {
            signing_key: Some("abcd".into()),
        };
        assert!(matches!(
            ArchivePacker::from_config(&bad),
            Err(RelayError::Config(_))
        ));
    }
}
