// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable at-least-once delivery queue.
//!
//! A dequeued entry is locked for the ack-wait window. If the consumer dies
//! before settling it, the lock expires and the entry is handed out again
//! with an incremented `deliveries` counter.

use std::str::FromStr;
use std::time::Duration;

use pkgrelay_core::RelayError;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::database::{map_tr_err, Database};
use crate::models::{QueueDepth, QueueEntry, QueueStatus};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQLite date modifier for `d` from now, with millisecond precision.
fn offset(d: Duration) -> String {
    format!("+{:.3} seconds", d.as_secs_f64())
}

fn parse_status(raw: &str) -> rusqlite::Result<QueueStatus> {
    QueueStatus::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    let status: String = row.get(3)?;
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: parse_status(&status)?,
        deliveries: row.get(4)?,
        available_at: row.get(5)?,
        locked_until: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Enqueue a payload. Returns the new entry id.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, RelayError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_queue (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next due entry of `queue_name`, locking it for `lock`.
///
/// Due means `pending` and past `available_at`, or `processing` with an
/// expired lock. Returns `None` when nothing is due.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock: Duration,
) -> Result<Option<QueueEntry>, RelayError> {
    let queue_name = queue_name.to_string();
    let lock = offset(lock);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let candidate = tx
                .query_row(
                    &format!(
                        "SELECT id, queue_name, payload, status, deliveries, available_at,
                                locked_until, created_at, updated_at
                         FROM delivery_queue
                         WHERE queue_name = ?1
                           AND ((status = 'pending' AND available_at <= {NOW})
                             OR (status = 'processing' AND locked_until <= {NOW}))
                         ORDER BY id ASC
                         LIMIT 1"
                    ),
                    params![queue_name],
                    entry_from_row,
                )
                .optional()?;

            let Some(entry) = candidate else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                &format!(
                    "UPDATE delivery_queue SET status = 'processing',
                         deliveries = deliveries + 1,
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                         updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![entry.id, lock],
            )?;
            let claimed = tx.query_row(
                "SELECT id, queue_name, payload, status, deliveries, available_at,
                        locked_until, created_at, updated_at
                 FROM delivery_queue WHERE id = ?1",
                params![entry.id],
                entry_from_row,
            )?;
            tx.commit()?;
            Ok(Some(claimed))
        })
        .await
        .map_err(map_tr_err)
}

/// Settle an entry as processed.
///
/// Settlement is fenced on the claim: `deliveries` must be the counter seen
/// at dequeue and the entry must still be `processing`. Returns `false` when
/// the claim was lost to a redelivery, in which case nothing is written.
pub async fn ack(db: &Database, id: i64, deliveries: u32) -> Result<bool, RelayError> {
    set_terminal(db, id, deliveries, QueueStatus::Completed).await
}

/// Settle an entry as permanently unprocessable. It is never redelivered.
///
/// Fenced on the claim like [`ack`].
pub async fn reject(db: &Database, id: i64, deliveries: u32) -> Result<bool, RelayError> {
    set_terminal(db, id, deliveries, QueueStatus::Rejected).await
}

async fn set_terminal(
    db: &Database,
    id: i64,
    deliveries: u32,
    status: QueueStatus,
) -> Result<bool, RelayError> {
    let status: &'static str = status.into();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE delivery_queue SET status = ?1, locked_until = NULL, updated_at = {NOW}
                     WHERE id = ?2 AND status = 'processing' AND deliveries = ?3"
                ),
                params![status, id, deliveries],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Return an entry for redelivery after `delay`.
///
/// Once the entry has been delivered `max_deliveries` times it is moved to
/// `dead` instead. Returns the resulting status, or `None` when the claim
/// identified by `deliveries` was lost and nothing was written.
pub async fn nack(
    db: &Database,
    id: i64,
    deliveries: u32,
    delay: Duration,
    max_deliveries: u32,
) -> Result<Option<QueueStatus>, RelayError> {
    let delay = offset(delay);
    db.connection()
        .call(move |conn| {
            let changed = if deliveries >= max_deliveries {
                conn.execute(
                    &format!(
                        "UPDATE delivery_queue SET status = 'dead', locked_until = NULL,
                             updated_at = {NOW}
                         WHERE id = ?1 AND status = 'processing' AND deliveries = ?2"
                    ),
                    params![id, deliveries],
                )?
            } else {
                conn.execute(
                    &format!(
                        "UPDATE delivery_queue SET status = 'pending', locked_until = NULL,
                             available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                             updated_at = {NOW}
                         WHERE id = ?1 AND status = 'processing' AND deliveries = ?2"
                    ),
                    params![id, deliveries, delay],
                )?
            };

            Ok(match changed {
                0 => None,
                _ if deliveries >= max_deliveries => Some(QueueStatus::Dead),
                _ => Some(QueueStatus::Pending),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a single entry.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, queue_name, payload, status, deliveries, available_at,
                        locked_until, created_at, updated_at
                 FROM delivery_queue WHERE id = ?1",
                params![id],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Entry counts by status for `queue_name`.
pub async fn queue_depth(db: &Database, queue_name: &str) -> Result<QueueDepth, RelayError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM delivery_queue WHERE queue_name = ?1 GROUP BY status",
            )?;
            let mut depth = QueueDepth::default();
            let rows = stmt.query_map(params![queue_name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                match parse_status(&status)? {
                    QueueStatus::Pending => depth.pending = count,
                    QueueStatus::Processing => depth.processing = count,
                    QueueStatus::Completed => depth.completed = count,
                    QueueStatus::Rejected => depth.rejected = count,
                    QueueStatus::Dead => depth.dead = count,
                }
            }
            Ok(depth)
        })
        .await
        .map_err(map_tr_err)
}
