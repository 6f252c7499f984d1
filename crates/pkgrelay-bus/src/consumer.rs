// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool draining the inbound delivery queue.
//!
//! Each worker claims one entry at a time, runs it through the orchestrator
//! and settles it from the outcome: success acks, a transient failure nacks
//! for redelivery, a fatal failure rejects. Entries that cannot be decoded
//! are rejected without reaching the orchestrator.

use std::time::Duration;

use pkgrelay_config::model::QueueConfig;
use pkgrelay_core::{Outcome, RelayError};
use pkgrelay_pipeline::Orchestrator;
use pkgrelay_storage::queries::queue;
use pkgrelay_storage::{Database, QueueEntry, QueueStatus};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::Delivery;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    /// Returned to the queue for a later attempt.
    Nacked,
    /// Transient failure on the last allowed attempt.
    DeadLettered,
    Rejected,
    /// The lock expired and another worker re-claimed the entry; its state
    /// belongs to that worker and was left untouched.
    ClaimLost,
}

impl Settlement {
    fn as_label(self) -> &'static str {
        match self {
            Settlement::Acked => "ack",
            Settlement::Nacked => "nack",
            Settlement::DeadLettered => "dead",
            Settlement::Rejected => "reject",
            Settlement::ClaimLost => "claim_lost",
        }
    }
}

/// Queue consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub queue_name: String,
    pub workers: usize,
    pub max_deliver: u32,
    pub ack_wait: Duration,
    pub nak_delay: Duration,
    pub poll_interval: Duration,
}

impl ConsumerSettings {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            queue_name: config.inbound.clone(),
            workers: config.workers,
            max_deliver: config.max_deliver,
            ack_wait: Duration::from_secs(config.ack_wait_secs),
            nak_delay: Duration::from_secs(config.nak_delay_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Asynchronous entry point of the pipeline.
#[derive(Clone)]
pub struct QueueConsumer {
    db: Database,
    orchestrator: Orchestrator,
    settings: ConsumerSettings,
}

impl QueueConsumer {
    pub fn new(db: Database, orchestrator: Orchestrator, settings: ConsumerSettings) -> Self {
        Self {
            db,
            orchestrator,
            settings,
        }
    }

    /// Run `workers` workers until `cancel` fires, then wait for them to stop.
    ///
    /// A worker finishes the delivery it is processing before it exits.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            queue = %self.settings.queue_name,
            workers = self.settings.workers,
            "queue consumer running"
        );

        let mut workers = JoinSet::new();
        for worker in 0..self.settings.workers {
            let consumer = self.clone();
            let cancel = cancel.clone();
            workers.spawn(async move { consumer.worker_loop(worker, cancel).await });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "queue worker panicked");
            }
        }

        info!(queue = %self.settings.queue_name, "queue consumer stopped");
    }

    async fn worker_loop(&self, worker: usize, cancel: CancellationToken) {
        debug!(worker, "queue worker started");
        while !cancel.is_cancelled() {
            let idle = match self.process_next().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(worker, error = %e, "queue poll failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                }
            }
        }
        debug!(worker, "queue worker stopped");
    }

    /// Claim and settle one due entry. `None` when the queue has nothing due.
    pub async fn process_next(&self) -> Result<Option<Settlement>, RelayError> {
        let Some(entry) =
            queue::dequeue(&self.db, &self.settings.queue_name, self.settings.ack_wait).await?
        else {
            return Ok(None);
        };
        self.handle(entry).await.map(Some)
    }

    async fn handle(&self, entry: QueueEntry) -> Result<Settlement, RelayError> {
        let delivery = match Delivery::decode(&entry) {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(delivery_id = entry.id, error = %e, "undecodable delivery rejected");
                let settlement = if queue::reject(&self.db, entry.id, entry.deliveries).await? {
                    Settlement::Rejected
                } else {
                    self.claim_lost(entry.id, entry.deliveries)
                };
                return Ok(self.settled(settlement));
            }
        };

        if delivery.is_first() {
            pkgrelay_prometheus::record_package("queue");
        }
        debug!(
            delivery_id = delivery.entry_id,
            deliveries = delivery.deliveries,
            package = %delivery.request.package_name,
            "processing delivery"
        );

        // Shutdown does not interrupt a delivery in progress; its own timeouts bound it.
        let outcome = self
            .orchestrator
            .process_package(&delivery.request, &CancellationToken::new())
            .await;

        let (id, claim) = (delivery.entry_id, delivery.deliveries);
        let settlement = match outcome {
            Outcome::Success if queue::ack(&self.db, id, claim).await? => Settlement::Acked,
            Outcome::FatalFailure(_) if queue::reject(&self.db, id, claim).await? => {
                Settlement::Rejected
            }
            Outcome::Success | Outcome::FatalFailure(_) => self.claim_lost(id, claim),
            Outcome::TemporaryFailure(_) => {
                let status = queue::nack(
                    &self.db,
                    id,
                    claim,
                    self.settings.nak_delay,
                    self.settings.max_deliver,
                )
                .await?;
                match status {
                    Some(QueueStatus::Dead) => {
                        error!(
                            delivery_id = id,
                            package = %delivery.request.package_name,
                            deliveries = claim,
                            "delivery exhausted its attempts"
                        );
                        Settlement::DeadLettered
                    }
                    Some(_) => Settlement::Nacked,
                    None => self.claim_lost(id, claim),
                }
            }
        };
        Ok(self.settled(settlement))
    }

    fn claim_lost(&self, id: i64, deliveries: u32) -> Settlement {
        warn!(
            delivery_id = id,
            deliveries,
            "delivery was re-claimed after its lock expired; settlement skipped"
        );
        Settlement::ClaimLost
    }

    fn settled(&self, settlement: Settlement) -> Settlement {
        pkgrelay_prometheus::record_queue_result(settlement.as_label());
        settlement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrelay_core::{PackageEventType, PackageStatus};
    use pkgrelay_test_utils::TestHarness;

    fn settings(max_deliver: u32) -> ConsumerSettings {
        ConsumerSettings {
            queue_name: "package-creator".into(),
            workers: 2,
            max_deliver,
            ack_wait: Duration::from_secs(60),
            nak_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn consumer(h: &TestHarness, max_deliver: u32) -> QueueConsumer {
        QueueConsumer::new(
            h.sqlite.database().clone(),
            h.orchestrator.clone(),
            settings(max_deliver),
        )
    }

    fn envelope(name: &str, package_type: &str, files: &[&str]) -> String {
        serde_json::json!({
            "package_type": package_type,
            "package_name": name,
            "destination_url": "https://hub.example/in",
            "receiver_operator_id": "R",
            "sender_operator_id": "S",
            "description": [{"message_id": "m1", "files": files, "description": {}}],
        })
        .to_string()
    }

    async fn status_of(db: &Database, id: i64) -> QueueStatus {
        queue::get_entry(db, id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn success_is_acked() {
        let h = TestHarness::builder()
            .with_blob("a.txt", b"alpha")
            .build()
            .await
            .unwrap();
        let c = consumer(&h, 5);
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", &envelope("q-1", "messages", &["a.txt"]))
            .await
            .unwrap();

        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Acked));
        assert_eq!(status_of(db, id).await, QueueStatus::Completed);
        assert_eq!(h.package("q-1").await.unwrap().status, PackageStatus::Success);
        assert_eq!(c.process_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_type_is_rejected_not_retried() {
        let h = TestHarness::builder().build().await.unwrap();
        let c = consumer(&h, 5);
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", &envelope("q-2", "zip", &[]))
            .await
            .unwrap();

        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Rejected));
        assert_eq!(status_of(db, id).await, QueueStatus::Rejected);
        assert_eq!(c.process_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn transient_failure_is_redelivered_until_dead() {
        let h = TestHarness::builder().build().await.unwrap();
        let c = consumer(&h, 2);
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", &envelope("q-3", "messages", &["ghost.txt"]))
            .await
            .unwrap();

        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Nacked));
        assert_eq!(status_of(db, id).await, QueueStatus::Pending);
        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::DeadLettered));
        assert_eq!(status_of(db, id).await, QueueStatus::Dead);

        assert_eq!(
            h.event_types("q-3").await,
            vec![
                PackageEventType::Created,
                PackageEventType::Error,
                PackageEventType::GotAgain,
                PackageEventType::Error,
            ]
        );
    }

    #[tokio::test]
    async fn redelivery_after_fix_succeeds() {
        let h = TestHarness::builder().build().await.unwrap();
        let c = consumer(&h, 5);
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", &envelope("q-4", "messages", &["late.txt"]))
            .await
            .unwrap();

        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Nacked));
        h.blobs.insert("late.txt", b"finally").await;
        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Acked));
        assert_eq!(queue::get_entry(db, id).await.unwrap().unwrap().deliveries, 2);
    }

    #[tokio::test]
    async fn undecodable_entry_is_rejected_without_a_package() {
        let h = TestHarness::builder().build().await.unwrap();
        let c = consumer(&h, 5);
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", "{not json").await.unwrap();

        assert_eq!(c.process_next().await.unwrap(), Some(Settlement::Rejected));
        assert_eq!(status_of(db, id).await, QueueStatus::Rejected);
        assert_eq!(h.packer.call_count().await, 0);
    }

    #[tokio::test]
    async fn late_worker_does_not_resurrect_a_rejected_entry() {
        let h = TestHarness::builder().build().await.unwrap();
        let db = h.sqlite.database();
        let id = queue::enqueue(db, "package-creator", &envelope("q-5", "messages", &["ghost.txt"]))
            .await
            .unwrap();

        // A first worker claims the entry and stalls past its lock.
        let stale = queue::dequeue(db, "package-creator", Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The redelivery is rejected by a current worker.
        let current = queue::dequeue(db, "package-creator", Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        assert!(queue::reject(db, id, current.deliveries).await.unwrap());

        // The stale worker finishes with a transient failure.
        let c = consumer(&h, 5);
        assert_eq!(c.handle(stale).await.unwrap(), Settlement::ClaimLost);
        assert_eq!(status_of(db, id).await, QueueStatus::Rejected);
        assert_eq!(c.process_next().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_drains_the_queue_and_stops_on_cancel() {
        let h = TestHarness::builder()
            .with_blob("a.txt", b"alpha")
            .build()
            .await
            .unwrap();
        let c = consumer(&h, 5);
        let db = h.sqlite.database().clone();
        for i in 0..5 {
            queue::enqueue(&db, "package-creator", &envelope(&format!("w-{i}"), "messages", &["a.txt"]))
                .await
                .unwrap();
        }

        let cancel = CancellationToken::new();
        let running = {
            let c = c.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { c.run(cancel).await })
        };

        let mut drained = false;
        for _ in 0..200 {
            let depth = queue::queue_depth(&db, "package-creator").await.unwrap();
            if depth.completed == 5 {
                drained = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();

        assert!(drained);
        assert_eq!(h.publisher.publish_count().await, 5);
    }
}
