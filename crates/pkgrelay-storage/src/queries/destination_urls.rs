// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplicated destination URL lookup.

use pkgrelay_core::RelayError;
use rusqlite::{params, Connection};

/// Return the id for `url`, inserting it first if it has never been seen.
///
/// `ON CONFLICT DO NOTHING` makes concurrent callers converge on the same row.
pub fn get_or_insert(conn: &Connection, url: &str) -> Result<i64, RelayError> {
    conn.execute(
        "INSERT INTO destination_urls (url) VALUES (?1) ON CONFLICT (url) DO NOTHING",
        params![url],
    )
    .map_err(RelayError::storage)?;

    conn.query_row(
        "SELECT destination_url_id FROM destination_urls WHERE url = ?1",
        params![url],
        |row| row.get(0),
    )
    .map_err(RelayError::storage)
}
