// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle tests for the orchestrator on a real SQLite store.

use std::time::Duration;

use futures::future::join_all;
use pkgrelay_core::{FailureCode, Outcome, PackageEventType, PackageStatus, RelayError};
use pkgrelay_pipeline::PipelineSettings;
use pkgrelay_test_utils::{
    invitation_request, messages_request, package_request, TestHarness,
};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use PackageEventType::{Created, Error, GotAgain, Reprocess, Sent, Success};

fn failure_code(outcome: &Outcome) -> FailureCode {
    outcome.failure().expect("expected a failure").code()
}

#[tokio::test]
async fn new_messages_package_succeeds_and_is_forwarded() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();

    let outcome = h.process(&messages_request("msg-1", &["a.txt"])).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let pkg = h.package("msg-1").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Success);
    assert!(pkg.error.is_none());
    assert_eq!(h.event_types("msg-1").await, vec![Created, Success, Sent]);

    assert_eq!(h.packer.call_count().await, 1);
    assert_eq!(h.blobs.contents("msg-1").await.unwrap(), b"container:msg-1-m1");
    let published = h.publisher.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].package_name, "msg-1");
    assert_eq!(published[0].routing_hint, "https://receipts.example/v1");
}

#[tokio::test]
async fn missing_invitation_file_fails_without_forwarding() {
    let h = TestHarness::builder().build().await.unwrap();

    let outcome = h.process(&invitation_request("inv-1", &["ghost.txt"])).await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::GetBlob);

    let pkg = h.package("inv-1").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Failed);
    let error = pkg.error.unwrap();
    assert_eq!(error.code, "GET_BLOB");
    assert!(error.text.contains("ghost.txt"));
    assert_eq!(h.event_types("inv-1").await, vec![Created, Error]);
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn redelivery_after_success_only_forwards_again() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    let request = messages_request("msg-1", &["a.txt"]);

    assert!(h.process(&request).await.is_success());
    assert!(h.process(&request).await.is_success());

    assert_eq!(h.package("msg-1").await.unwrap().status, PackageStatus::Success);
    assert_eq!(
        h.event_types("msg-1").await,
        vec![Created, Success, Sent, GotAgain, Sent]
    );
    assert_eq!(h.packer.call_count().await, 1);
    assert_eq!(h.blobs.put_count(), 1);
    assert_eq!(h.publisher.publish_count().await, 2);
    assert_eq!(h.package_rows("msg-1").await.unwrap(), 1);
}

#[tokio::test]
async fn empty_description_is_rejected_after_creation() {
    let h = TestHarness::builder().build().await.unwrap();

    let outcome = h.process(&package_request("empty-1", "messages", b"")).await;
    assert!(matches!(outcome, Outcome::FatalFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::EmptyBody);

    assert_eq!(h.event_types("empty-1").await, vec![Created, Error]);
    assert_eq!(h.packer.call_count().await, 0);
    assert_eq!(h.blobs.put_count(), 0);
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn unknown_package_type_is_always_fatal() {
    let h = TestHarness::builder().build().await.unwrap();
    let request = package_request("zip-1", "zip", br#"{"files":[]}"#);

    for _ in 0..3 {
        let outcome = h.process(&request).await;
        assert!(matches!(outcome, Outcome::FatalFailure(_)), "{outcome:?}");
        assert_eq!(failure_code(&outcome), FailureCode::UnknownPackageType);
    }
    let pkg = h.package("zip-1").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Failed);
    assert_eq!(pkg.error.unwrap().code, "UNKNOWN_PACKAGE_TYPE");
    assert_eq!(
        h.event_types("zip-1").await,
        vec![Created, Error, GotAgain, Error, GotAgain, Error]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_deliveries_create_one_package() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    let request = messages_request("race-1", &["a.txt"]);

    let outcomes = join_all((0..12).map(|_| h.process(&request))).await;
    for outcome in &outcomes {
        assert!(outcome.is_success(), "{outcome:?}");
    }

    assert_eq!(h.package_rows("race-1").await.unwrap(), 1);
    let events = h.event_types("race-1").await;
    assert_eq!(events.iter().filter(|e| **e == Created).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == GotAgain).count(), 11);
    assert_eq!(events.iter().filter(|e| **e == Sent).count(), 12);
    assert_eq!(h.package("race-1").await.unwrap().status, PackageStatus::Success);
}

#[tokio::test]
async fn later_success_clears_the_error_and_refreshes_routing() {
    let h = TestHarness::builder().build().await.unwrap();
    let mut request = invitation_request("inv-2", &["ghost.txt"]);

    assert!(!h.process(&request).await.is_success());
    let failed = h.package("inv-2").await.unwrap();
    assert_eq!(failed.status == PackageStatus::Failed, failed.error.is_some());

    h.blobs.insert("ghost.txt", b"boo").await;
    request.destination_url = "https://other-hub.example/inbox".to_string();
    assert!(h.process(&request).await.is_success());

    let pkg = h.package("inv-2").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Success);
    assert!(pkg.error.is_none());
    assert_eq!(pkg.destination_url, "https://other-hub.example/inbox");
    assert_eq!(
        h.event_types("inv-2").await,
        vec![Created, Error, GotAgain, Success, Sent]
    );
}

#[tokio::test]
async fn blob_save_failure_is_recorded_with_its_severity() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    h.blobs.fail_puts(true);

    let outcome = h.process(&messages_request("msg-2", &["a.txt"])).await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::SaveBlob);

    let pkg = h.package("msg-2").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Failed);
    assert_eq!(pkg.error.unwrap().code, "SAVE_BLOB");
    assert_eq!(h.event_types("msg-2").await, vec![Created, Error]);
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn publish_failure_is_transient_and_retried_by_forwarding_only() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    let request = messages_request("msg-3", &["a.txt"]);

    h.publisher.fail(true);
    let outcome = h.process(&request).await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::Publish);
    assert_eq!(h.package("msg-3").await.unwrap().status, PackageStatus::Success);
    assert_eq!(h.event_types("msg-3").await, vec![Created, Success]);

    h.publisher.fail(false);
    assert!(h.process(&request).await.is_success());
    assert_eq!(
        h.event_types("msg-3").await,
        vec![Created, Success, GotAgain, Sent]
    );
    assert_eq!(h.packer.call_count().await, 1);
}

#[tokio::test]
#[traced_test]
async fn failed_sent_event_is_logged_not_returned() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    h.store.fail_sent_events(true);

    let outcome = h.process(&messages_request("msg-4", &["a.txt"])).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(h.publisher.publish_count().await, 1);
    assert_eq!(h.event_types("msg-4").await, vec![Created, Success]);
    assert!(logs_contain("sent event could not be recorded"));
}

#[tokio::test]
async fn unrecorded_critical_failure_becomes_transient() {
    let h = TestHarness::builder().build().await.unwrap();
    h.store.fail_commits(true);

    let outcome = h.process(&package_request("empty-2", "messages", b"  ")).await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::CommitTransaction);

    let pkg = h.package("empty-2").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Created);
    assert!(pkg.error.is_none());
    assert_eq!(h.event_types("empty-2").await, vec![Created]);
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let h = TestHarness::builder().build().await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .orchestrator
        .process_package(&messages_request("msg-5", &[]), &cancel)
        .await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::Cancelled);
    assert!(h.package("msg-5").await.is_none());
}

fn cancel_after(delay: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    cancel
}

#[tokio::test]
async fn cancellation_while_packing_records_nothing() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    h.packer.stall(Some(Duration::from_secs(5))).await;
    let cancel = cancel_after(Duration::from_millis(100));

    let outcome = h
        .orchestrator
        .process_package(&messages_request("msg-10", &["a.txt"]), &cancel)
        .await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::Cancelled);

    let pkg = h.package("msg-10").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Created);
    assert!(pkg.error.is_none());
    assert_eq!(h.event_types("msg-10").await, vec![Created]);
    assert_eq!(h.blobs.put_count(), 0);
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn cancellation_while_saving_the_container_records_nothing() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    h.blobs.stall_puts(Some(Duration::from_secs(5))).await;
    let cancel = cancel_after(Duration::from_millis(100));

    let outcome = h
        .orchestrator
        .process_package(&messages_request("msg-11", &["a.txt"]), &cancel)
        .await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::Cancelled);

    let pkg = h.package("msg-11").await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Created);
    assert!(pkg.error.is_none());
    assert_eq!(h.event_types("msg-11").await, vec![Created]);
    assert_eq!(h.packer.call_count().await, 1);
    assert_eq!(h.blobs.put_count(), 0);
    assert!(h.blobs.contents("msg-11").await.is_none());
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn cancellation_after_commit_surfaces_as_transient() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    h.publisher.stall(Some(Duration::from_secs(5))).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = h
        .orchestrator
        .process_package(&messages_request("msg-6", &["a.txt"]), &cancel)
        .await;
    assert!(matches!(outcome, Outcome::TemporaryFailure(_)), "{outcome:?}");
    assert_eq!(failure_code(&outcome), FailureCode::Cancelled);
    assert_eq!(h.package("msg-6").await.unwrap().status, PackageStatus::Success);
    assert_eq!(h.publisher.publish_count().await, 0);
}

#[tokio::test]
async fn slow_downstream_times_out_as_transient() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .with_settings(PipelineSettings {
            forward_timeout: Duration::from_millis(50),
            ..PipelineSettings::default()
        })
        .build()
        .await
        .unwrap();
    h.publisher.stall(Some(Duration::from_secs(2))).await;

    let outcome = h.process(&messages_request("msg-7", &["a.txt"])).await;
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.code(), FailureCode::Publish);
    assert!(!failure.is_critical());
    assert!(matches!(failure.source_error(), Some(RelayError::Timeout { .. })));
}

#[tokio::test]
async fn reprocess_packs_a_succeeded_package_again() {
    let h = TestHarness::builder()
        .with_blob("a.txt", b"alpha")
        .build()
        .await
        .unwrap();
    let mut request = messages_request("msg-8", &["a.txt"]);
    assert!(h.process(&request).await.is_success());

    request.reprocess = true;
    assert!(h.process(&request).await.is_success());

    assert_eq!(h.packer.call_count().await, 2);
    assert_eq!(h.blobs.put_count(), 2);
    assert_eq!(
        h.event_types("msg-8").await,
        vec![Created, Success, Sent, Reprocess, Success, Sent]
    );
}
