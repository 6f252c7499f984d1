// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle: PRAGMA setup, migrations, lookup-table validation.
//!
//! Every statement runs on tokio-rusqlite's single background thread, which
//! serializes writers. Query modules take `&Database` (or a plain
//! `&rusqlite::Connection` inside a `call` closure).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pkgrelay_core::RelayError;
use tracing::debug;

use crate::enums::EnumTables;
use crate::migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the relay database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    enums: Arc<EnumTables>,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, RelayError> {
        Self::open_with(path, true).await
    }

    /// Open the database, apply PRAGMAs and migrations, and load the enum tables.
    ///
    /// Fails when the lookup tables disagree with the in-code enumerations.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RelayError> {
        if path != ":memory:"
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(RelayError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| RelayError::storage(e.to_string()))?;

        let enums = conn
            .call(move |conn| -> Result<EnumTables, RelayError> {
                apply_pragmas(conn, wal_mode)?;
                run_migrations(conn)?;
                EnumTables::load(conn)
            })
            .await
            .map_err(map_call_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            enums: Arc::new(enums),
        })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Lookup-table codes, cheap to clone into `call` closures.
    pub fn enums(&self) -> Arc<EnumTables> {
        Arc::clone(&self.enums)
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), RelayError> {
        self.conn
            .call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Close the connection. Other clones of this handle stop working.
    pub async fn close(self) -> Result<(), RelayError> {
        self.conn
            .close()
            .await
            .map_err(|e| RelayError::storage(e.to_string()))
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), RelayError> {
    if wal_mode {
        // journal_mode answers with the resulting mode, so it has to be read.
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(RelayError::storage)?;
        debug!(mode, "journal mode set");
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(RelayError::storage)?;
    }
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(RelayError::storage)?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(RelayError::storage)?;
    Ok(())
}

/// Map a tokio-rusqlite error around a plain rusqlite error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RelayError {
    match e {
        tokio_rusqlite::Error::Error(inner) => RelayError::storage(inner),
        other => RelayError::storage(other.to_string()),
    }
}

/// Unwrap a tokio-rusqlite error whose closure already produced a `RelayError`.
pub fn map_call_err(e: tokio_rusqlite::Error<RelayError>) -> RelayError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => RelayError::storage(other.to_string()),
    }
}
