// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integer code maps for the status and event-type lookup tables.
//!
//! Loaded once when the database opens and checked against the in-code
//! enumerations in both directions: a description the code does not know is
//! fatal, and so is a row count that differs from the number of variants.

use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;

use pkgrelay_core::{PackageEventType, PackageStatus, RelayError};
use rusqlite::Connection;
use strum::IntoEnumIterator;

/// Bidirectional code map for one lookup table.
#[derive(Debug, Clone)]
struct CodeMap<E> {
    table: &'static str,
    by_value: HashMap<E, i64>,
    by_code: HashMap<i64, E>,
}

impl<E> CodeMap<E>
where
    E: Copy + Eq + Hash + FromStr + IntoEnumIterator + std::fmt::Display,
{
    fn load(
        conn: &Connection,
        table: &'static str,
        id_col: &str,
        desc_col: &str,
    ) -> Result<Self, RelayError> {
        let mut stmt = conn
            .prepare(&format!("SELECT {id_col}, {desc_col} FROM {table}"))
            .map_err(RelayError::storage)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(RelayError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(RelayError::storage)?;

        let mut by_value = HashMap::with_capacity(rows.len());
        let mut by_code = HashMap::with_capacity(rows.len());
        for (code, desc) in rows {
            let value = E::from_str(&desc).map_err(|_| {
                RelayError::Config(format!("{table} contains unknown value `{desc}` (code {code})"))
            })?;
            by_value.insert(value, code);
            by_code.insert(code, value);
        }

        let expected = E::iter().count();
        if by_value.len() != expected || by_code.len() != expected {
            return Err(RelayError::Config(format!(
                "{table} has {} entries, expected {expected}",
                by_code.len()
            )));
        }

        Ok(Self {
            table,
            by_value,
            by_code,
        })
    }

    fn code(&self, value: E) -> Result<i64, RelayError> {
        self.by_value.get(&value).copied().ok_or_else(|| {
            RelayError::Internal(format!("{} has no code for `{value}`", self.table))
        })
    }

    fn value(&self, code: i64) -> Result<E, RelayError> {
        self.by_code.get(&code).copied().ok_or_else(|| {
            RelayError::Internal(format!("{} has no entry for code {code}", self.table))
        })
    }
}

/// Status and event-type codes as stored in this database.
#[derive(Debug, Clone)]
pub struct EnumTables {
    statuses: CodeMap<PackageStatus>,
    events: CodeMap<PackageEventType>,
}

impl EnumTables {
    /// Read and validate both lookup tables.
    pub fn load(conn: &Connection) -> Result<Self, RelayError> {
        Ok(Self {
            statuses: CodeMap::load(
                conn,
                "package_status_enum",
                "package_status_id",
                "package_status_desc",
            )?,
            events: CodeMap::load(
                conn,
                "package_event_enum",
                "package_event_id",
                "package_event_desc",
            )?,
        })
    }

    pub fn status_code(&self, status: PackageStatus) -> Result<i64, RelayError> {
        self.statuses.code(status)
    }

    pub fn status(&self, code: i64) -> Result<PackageStatus, RelayError> {
        self.statuses.value(code)
    }

    pub fn event_code(&self, event: PackageEventType) -> Result<i64, RelayError> {
        self.events.code(event)
    }

    pub fn event(&self, code: i64) -> Result<PackageEventType, RelayError> {
        self.events.value(code)
    }
}
