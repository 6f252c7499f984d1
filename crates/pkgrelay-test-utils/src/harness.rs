// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles the full orchestrator on a temp SQLite database
//! with an in-memory blob store, a recording packer and a recording
//! publisher. Provides `process()` to drive a request through the pipeline
//! and query helpers for assertions.

use std::sync::Arc;

use pkgrelay_core::{
    Outcome, Package, PackageEventType, PackageRequest, PackageStore, RelayError,
};
use pkgrelay_pipeline::{Orchestrator, PipelineSettings};
use pkgrelay_storage::database::map_tr_err;
use pkgrelay_storage::{Database, SqlitePackageStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::faulty_store::FaultyStore;
use crate::mock_blob::MemoryBlobStore;
use crate::mock_packer::MockPacker;
use crate::mock_publisher::MockPublisher;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    blobs: Vec<(String, Vec<u8>)>,
    settings: PipelineSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            blobs: Vec::new(),
            settings: PipelineSettings {
                routing_hint: "https://receipts.example/v1".to_string(),
                ..PipelineSettings::default()
            },
        }
    }

    /// Seed a blob that package descriptions can reference.
    pub fn with_blob(mut self, name: &str, data: &[u8]) -> Self {
        self.blobs.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, RelayError> {
        let temp_dir = tempfile::TempDir::new().map_err(RelayError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;
        let sqlite = Arc::new(SqlitePackageStore::from_database(db));
        let store = Arc::new(FaultyStore::new(sqlite.clone()));

        let blobs = Arc::new(MemoryBlobStore::new());
        for (name, data) in &self.blobs {
            blobs.insert(name, data).await;
        }
        let packer = Arc::new(MockPacker::new());
        let publisher = Arc::new(MockPublisher::new());

        let orchestrator = Orchestrator::new(
            store.clone(),
            blobs.clone(),
            packer.clone(),
            publisher.clone(),
            self.settings,
        );

        Ok(TestHarness {
            sqlite,
            store,
            blobs,
            packer,
            publisher,
            orchestrator,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline with mock capabilities and temp storage.
pub struct TestHarness {
    /// The SQLite store underneath `store`.
    pub sqlite: Arc<SqlitePackageStore>,
    /// The store the orchestrator writes through; switch faults here.
    pub store: Arc<FaultyStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub packer: Arc<MockPacker>,
    pub publisher: Arc<MockPublisher>,
    pub orchestrator: Orchestrator,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run `request` through the orchestrator with a fresh cancellation token.
    pub async fn process(&self, request: &PackageRequest) -> Outcome {
        self.orchestrator
            .process_package(request, &CancellationToken::new())
            .await
    }

    pub async fn package(&self, name: &str) -> Option<Package> {
        self.sqlite.find_by_name(name).await.ok().flatten()
    }

    /// Event types of `name` in insertion order; empty when the package is unknown.
    pub async fn event_types(&self, name: &str) -> Vec<PackageEventType> {
        let Some(package) = self.package(name).await else {
            return Vec::new();
        };
        self.sqlite
            .list_events(package.id)
            .await
            .map(|events| events.into_iter().map(|e| e.event_type).collect())
            .unwrap_or_default()
    }

    /// Number of `packages` rows carrying `name`.
    pub async fn package_rows(&self, name: &str) -> Result<i64, RelayError> {
        let name = name.to_string();
        self.sqlite
            .database()
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM packages WHERE package_name = ?1",
                    [name],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }
}

/// A request with every identity field filled in.
pub fn package_request(name: &str, package_type: &str, description: &[u8]) -> PackageRequest {
    PackageRequest {
        package_type: package_type.to_string(),
        package_name: name.to_string(),
        destination_url: "https://hub.example/inbox".to_string(),
        receiver_is_hub: false,
        receiver_operator_id: "OP-RECV".to_string(),
        sender_operator_id: "OP-SEND".to_string(),
        description: description.to_vec(),
        reprocess: false,
    }
}

/// A `messages` request with one logical message referencing `files`.
pub fn messages_request(name: &str, files: &[&str]) -> PackageRequest {
    let description = json!([{
        "message_id": format!("{name}-m1"),
        "files": files,
        "description": { "subject": name },
    }]);
    package_request(name, "messages", description.to_string().as_bytes())
}

/// An `invitation` request referencing `files`.
pub fn invitation_request(name: &str, files: &[&str]) -> PackageRequest {
    let description = json!({
        "message_id": format!("{name}-inv"),
        "files": files,
        "description": { "inviter": "OP-SEND" },
    });
    package_request(name, "invitation", description.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_with_seeded_blobs() {
        let h = TestHarness::builder()
            .with_blob("a.txt", b"alpha")
            .build()
            .await
            .unwrap();
        assert!(h.blobs.contents("a.txt").await.is_some());
        assert!(h.package("nothing").await.is_none());
        assert_eq!(h.package_rows("nothing").await.unwrap(), 0);
        assert!(h.event_types("nothing").await.is_empty());
    }

    #[test]
    fn request_helpers_fill_identity_fields() {
        let req = messages_request("msg-1", &["a.txt"]);
        assert_eq!(req.package_type, "messages");
        let body: serde_json::Value = serde_json::from_slice(&req.description).unwrap();
        assert_eq!(body[0]["files"][0], "a.txt");
        assert!(!req.sender_operator_id.is_empty());
    }
}
