// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules.
//!
//! Package, event and destination-URL queries are synchronous over a
//! `&rusqlite::Connection`, so the same function runs on its own or inside a
//! `rusqlite::Transaction` (which derefs to a connection). Queue operations
//! are async over `&Database`.

pub mod destination_urls;
pub mod events;
pub mod packages;
pub mod queue;

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
pub(crate) fn test_connection() -> (rusqlite::Connection, crate::enums::EnumTables) {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", true).unwrap();
    crate::migrations::run_migrations(&mut conn).unwrap();
    let enums = crate::enums::EnumTables::load(&conn).unwrap();
    (conn, enums)
}
