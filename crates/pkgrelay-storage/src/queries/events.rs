// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only package event log and the outcome transaction.

use pkgrelay_core::{Package, PackageEvent, PackageEventType, RelayError, TransactionStep};
use rusqlite::{params, Connection};

use crate::enums::EnumTables;
use crate::queries::packages;

/// Append one event. Fails when `package_id` does not reference a package.
pub fn append_event(
    conn: &Connection,
    enums: &EnumTables,
    package_id: i64,
    event: PackageEventType,
    description: &str,
) -> Result<i64, RelayError> {
    let code = enums.event_code(event)?;
    let description = (!description.is_empty()).then_some(description);
    conn.execute(
        "INSERT INTO package_events (package_id, package_event_id, description) VALUES (?1, ?2, ?3)",
        params![package_id, code, description],
    )
    .map_err(RelayError::storage)?;
    Ok(conn.last_insert_rowid())
}

/// All events for a package, oldest first.
pub fn list_events(
    conn: &Connection,
    enums: &EnumTables,
    package_id: i64,
) -> Result<Vec<PackageEvent>, RelayError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, package_id, package_event_id, description, created_at
             FROM package_events WHERE package_id = ?1 ORDER BY id ASC",
        )
        .map_err(RelayError::storage)?;
    let rows = stmt
        .query_map(params![package_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .map_err(RelayError::storage)?;

    let mut events = Vec::new();
    for row in rows {
        let (id, package_id, code, description, created_at) = row.map_err(RelayError::storage)?;
        events.push(PackageEvent {
            id,
            package_id,
            event_type: enums.event(code)?,
            description,
            created_at,
        });
    }
    Ok(events)
}

/// Append `event` and persist `package` in one transaction.
///
/// Any failure rolls back both statements; the error names the step.
pub fn record_outcome(
    conn: &mut Connection,
    enums: &EnumTables,
    package: &Package,
    event: PackageEventType,
    description: &str,
) -> Result<(), RelayError> {
    let step_err = |step: TransactionStep| {
        move |e: RelayError| RelayError::Transaction {
            step,
            source: Box::new(e),
        }
    };

    let tx = conn
        .transaction()
        .map_err(|e| RelayError::Transaction {
            step: TransactionStep::Open,
            source: Box::new(e),
        })?;
    append_event(&tx, enums, package.id, event, description)
        .map_err(step_err(TransactionStep::InsertEvent))?;
    packages::update_package(&tx, enums, package).map_err(step_err(TransactionStep::UpdatePackage))?;
    tx.commit().map_err(|e| RelayError::Transaction {
        step: TransactionStep::Commit,
        source: Box::new(e),
    })
}
