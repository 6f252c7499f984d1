// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over the production adapters: SQLite store and queue,
//! filesystem blob store, signed archive packer, queue publisher.
//!
//! Each test builds an isolated stack in its own temp directory.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use pkgrelay_bus::{
    ConsumerSettings, ForwardEnvelope, QueueConsumer, QueuePublisher, Settlement,
};
use pkgrelay_core::{BlobStore, PackageEventType, PackageStatus, PackageStore};
use pkgrelay_gateway::{router, GatewayState};
use pkgrelay_packing::{unpack, ArchivePacker, ContainerKind};
use pkgrelay_pipeline::{Orchestrator, PipelineSettings};
use pkgrelay_storage::queries::queue;
use pkgrelay_storage::{Database, FsBlobStore, QueueStatus, SqlitePackageStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const INBOUND: &str = "package-creator";
const OUTBOUND: &str = "package-sender";

struct Stack {
    db: Database,
    store: Arc<SqlitePackageStore>,
    blobs: Arc<FsBlobStore>,
    packer: Arc<ArchivePacker>,
    publisher: Arc<QueuePublisher>,
    orchestrator: Orchestrator,
    _dir: tempfile::TempDir,
}

impl Stack {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("pkgrelay.db").to_string_lossy())
            .await
            .unwrap();
        let store = Arc::new(SqlitePackageStore::from_database(db.clone()));
        let blobs = Arc::new(FsBlobStore::open(dir.path().join("blobs")).await.unwrap());
        let packer = Arc::new(ArchivePacker::generate());
        let publisher = Arc::new(QueuePublisher::new(db.clone(), OUTBOUND));
        let orchestrator = Orchestrator::new(
            store.clone(),
            blobs.clone(),
            packer.clone(),
            publisher.clone(),
            PipelineSettings {
                routing_hint: "https://receipts.example/v1".into(),
                ..PipelineSettings::default()
            },
        );
        Self {
            db,
            store,
            blobs,
            packer,
            publisher,
            orchestrator,
            _dir: dir,
        }
    }

    fn consumer(&self, max_deliver: u32, ack_wait: Duration) -> QueueConsumer {
        QueueConsumer::new(
            self.db.clone(),
            self.orchestrator.clone(),
            ConsumerSettings {
                queue_name: INBOUND.into(),
                workers: 1,
                max_deliver,
                ack_wait,
                nak_delay: Duration::ZERO,
                poll_interval: Duration::from_millis(10),
            },
        )
    }

    async fn events(&self, name: &str) -> Vec<PackageEventType> {
        let package = self.store.find_by_name(name).await.unwrap().unwrap();
        self.store
            .list_events(package.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

fn messages_envelope(name: &str) -> String {
    json!({
        "package_type": "messages",
        "package_name": name,
        "destination_url": "https://hub.example/in",
        "receiver_is_hub": true,
        "receiver_operator_id": "OP-R",
        "sender_operator_id": "OP-S",
        "description": [
            {"message_id": "m1", "files": ["a.txt", "b.xml"], "description": {"subject": "first"}},
            {"message_id": "m2", "files": ["b.xml"], "description": {"subject": "second"}}
        ],
    })
    .to_string()
}

#[tokio::test]
async fn queue_delivery_produces_signed_container_and_forward_envelope() {
    let stack = Stack::new().await;
    stack.blobs.put("a.txt", b"alpha".to_vec()).await.unwrap();
    stack.blobs.put("b.xml", b"<b/>".to_vec()).await.unwrap();
    queue::enqueue(&stack.db, INBOUND, &messages_envelope("msg-1"))
        .await
        .unwrap();

    let consumer = stack.consumer(5, Duration::from_secs(60));
    assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Acked));

    let package = stack.store.find_by_name("msg-1").await.unwrap().unwrap();
    assert_eq!(package.status, PackageStatus::Success);
    assert!(package.error.is_none());
    assert_eq!(
        stack.events("msg-1").await,
        vec![
            PackageEventType::Created,
            PackageEventType::Success,
            PackageEventType::Sent
        ]
    );

    let container = unpack(&stack.blobs.get("msg-1").await.unwrap()).unwrap();
    container.verify(&stack.packer.verifying_key()).unwrap();
    assert_eq!(container.manifest.kind, ContainerKind::LogicalMessages);
    assert_eq!(container.files["m1/a.txt"], b"alpha");
    assert_eq!(container.files["m2/b.xml"], b"<b/>");
    assert!(container.files.contains_key("m1/description.json"));

    let forwarded = queue::dequeue(&stack.db, OUTBOUND, Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();
    let envelope: ForwardEnvelope = serde_json::from_str(&forwarded.payload).unwrap();
    assert_eq!(envelope.package_name, "msg-1");
    assert_eq!(envelope.package_id, package.id);
    assert_eq!(envelope.routing_hint, "https://receipts.example/v1");
    assert!(envelope.receiver_is_hub);
}

#[tokio::test]
async fn redelivery_after_success_forwards_again_without_repacking() {
    let stack = Stack::new().await;
    stack.blobs.put("a.txt", b"alpha".to_vec()).await.unwrap();
    stack.blobs.put("b.xml", b"<b/>".to_vec()).await.unwrap();
    let consumer = stack.consumer(5, Duration::from_secs(60));

    for _ in 0..2 {
        queue::enqueue(&stack.db, INBOUND, &messages_envelope("msg-2"))
            .await
            .unwrap();
        assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Acked));
    }
    let first = stack.blobs.get("msg-2").await.unwrap();

    assert_eq!(
        stack.events("msg-2").await,
        vec![
            PackageEventType::Created,
            PackageEventType::Success,
            PackageEventType::Sent,
            PackageEventType::GotAgain,
            PackageEventType::Sent,
        ]
    );
    assert_eq!(stack.blobs.get("msg-2").await.unwrap(), first);
    let depth = queue::queue_depth(&stack.db, OUTBOUND).await.unwrap();
    assert_eq!(depth.pending, 2);
}

#[tokio::test]
async fn missing_blob_is_retried_then_succeeds_once_it_lands() {
    let stack = Stack::new().await;
    let consumer = stack.consumer(5, Duration::from_secs(60));
    let id = queue::enqueue(&stack.db, INBOUND, &messages_envelope("msg-3"))
        .await
        .unwrap();

    assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Nacked));
    let failed = stack.store.find_by_name("msg-3").await.unwrap().unwrap();
    assert_eq!(failed.status, PackageStatus::Failed);
    assert_eq!(failed.error.unwrap().code, "GET_BLOB");

    stack.blobs.put("a.txt", b"alpha".to_vec()).await.unwrap();
    stack.blobs.put("b.xml", b"<b/>".to_vec()).await.unwrap();
    assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Acked));

    let done = stack.store.find_by_name("msg-3").await.unwrap().unwrap();
    assert_eq!(done.status, PackageStatus::Success);
    assert!(done.error.is_none());
    let entry = queue::get_entry(&stack.db, id).await.unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Completed);
    assert_eq!(entry.deliveries, 2);
}

#[tokio::test]
async fn delivery_abandoned_mid_flight_is_redelivered() {
    let stack = Stack::new().await;
    stack.blobs.put("a.txt", b"alpha".to_vec()).await.unwrap();
    stack.blobs.put("b.xml", b"<b/>".to_vec()).await.unwrap();
    let id = queue::enqueue(&stack.db, INBOUND, &messages_envelope("msg-4"))
        .await
        .unwrap();

    // A worker that claimed the entry and died: its lock expires immediately.
    let claimed = queue::dequeue(&stack.db, INBOUND, Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, id);

    let consumer = stack.consumer(5, Duration::from_secs(60));
    assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Acked));
    let entry = queue::get_entry(&stack.db, id).await.unwrap().unwrap();
    assert_eq!(entry.deliveries, 2);
    assert_eq!(stack.events("msg-4").await[0], PackageEventType::Created);
}

#[tokio::test]
async fn http_request_packs_a_technical_receipt() {
    let stack = Stack::new().await;
    stack.blobs.put("receipt.xml", b"<ok/>".to_vec()).await.unwrap();
    let app = router(GatewayState::new(
        stack.orchestrator.clone(),
        stack.blobs.clone(),
        stack.publisher.clone(),
        Some("e2e-token".into()),
        None,
        CancellationToken::new(),
    ));

    let body = json!({
        "package_type": "technical_receipt",
        "package_name": "tr-1",
        "destination_url": "https://hub.example/in",
        "receiver_operator_id": "OP-R",
        "sender_operator_id": "OP-S",
        "description": {"files": ["receipt.xml"], "description": {"for": "msg-1"}},
    });
    let req = Request::builder()
        .method(Method::POST)
        .uri("/v1/packages")
        .header(header::AUTHORIZATION, "Bearer e2e-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let container = unpack(&stack.blobs.get("tr-1").await.unwrap()).unwrap();
    container.verify(&stack.packer.verifying_key()).unwrap();
    assert_eq!(container.manifest.kind, ContainerKind::TechnicalReceipt);
    assert_eq!(container.files["receipt/receipt.xml"], b"<ok/>");
}

#[tokio::test]
async fn unknown_type_is_rejected_and_recorded() {
    let stack = Stack::new().await;
    let envelope = messages_envelope("msg-5").replace("\"messages\"", "\"zip\"");
    let id = queue::enqueue(&stack.db, INBOUND, &envelope).await.unwrap();

    let consumer = stack.consumer(5, Duration::from_secs(60));
    assert_eq!(consumer.process_next().await.unwrap(), Some(Settlement::Rejected));

    let entry = queue::get_entry(&stack.db, id).await.unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Rejected);
    let package = stack.store.find_by_name("msg-5").await.unwrap().unwrap();
    assert_eq!(package.package_type, "zip");
    assert_eq!(package.error.unwrap().code, "UNKNOWN_PACKAGE_TYPE");
    assert_eq!(
        stack.events("msg-5").await,
        vec![PackageEventType::Created, PackageEventType::Error]
    );
}
