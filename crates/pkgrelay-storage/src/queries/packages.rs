// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package rows and their error shadow.

use pkgrelay_core::{NewPackage, Package, PackageError, PackageStatus, RelayError};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::enums::EnumTables;
use crate::queries::{destination_urls, is_unique_violation};

const SELECT_PACKAGE: &str = "
    SELECT p.package_id, p.package_name, p.package_type, d.url, p.receiver_is_hub,
           p.receiver_operator_id, p.sender_operator_id, p.package_status_id,
           p.created_at, e.error_code, e.error_text
    FROM packages p
    JOIN destination_urls d ON d.destination_url_id = p.destination_url_id
    LEFT JOIN package_error e ON e.package_id = p.package_id";

/// A package row before its status code is resolved.
struct PackageRow {
    id: i64,
    name: String,
    package_type: String,
    destination_url: String,
    receiver_is_hub: bool,
    receiver_operator_id: String,
    sender_operator_id: String,
    status_code: i64,
    created_at: String,
    error_code: Option<String>,
    error_text: Option<String>,
}

impl PackageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            package_type: row.get(2)?,
            destination_url: row.get(3)?,
            receiver_is_hub: row.get(4)?,
            receiver_operator_id: row.get(5)?,
            sender_operator_id: row.get(6)?,
            status_code: row.get(7)?,
            created_at: row.get(8)?,
            error_code: row.get(9)?,
            error_text: row.get(10)?,
        })
    }

    fn into_package(self, enums: &EnumTables) -> Result<Package, RelayError> {
        let error = match (self.error_code, self.error_text) {
            (Some(code), text) => Some(PackageError {
                code,
                text: text.unwrap_or_default(),
            }),
            (None, _) => None,
        };
        Ok(Package {
            id: self.id,
            name: self.name,
            package_type: self.package_type,
            destination_url: self.destination_url,
            receiver_is_hub: self.receiver_is_hub,
            receiver_operator_id: self.receiver_operator_id,
            sender_operator_id: self.sender_operator_id,
            status: enums.status(self.status_code)?,
            created_at: self.created_at,
            error,
        })
    }
}

fn find_where(
    conn: &Connection,
    enums: &EnumTables,
    clause: &str,
    param: &dyn rusqlite::ToSql,
) -> Result<Option<Package>, RelayError> {
    conn.query_row(&format!("{SELECT_PACKAGE} WHERE {clause}"), [param], PackageRow::from_row)
        .optional()
        .map_err(RelayError::storage)?
        .map(|row| row.into_package(enums))
        .transpose()
}

pub fn find_by_name(
    conn: &Connection,
    enums: &EnumTables,
    name: &str,
) -> Result<Option<Package>, RelayError> {
    find_where(conn, enums, "p.package_name = ?1", &name)
}

pub fn find_by_id(
    conn: &Connection,
    enums: &EnumTables,
    id: i64,
) -> Result<Option<Package>, RelayError> {
    find_where(conn, enums, "p.package_id = ?1", &id)
}

/// Insert a package in `Created` status.
///
/// A second insert for the same name fails with [`RelayError::Conflict`].
pub fn insert_package(
    conn: &Connection,
    enums: &EnumTables,
    new: &NewPackage,
) -> Result<Package, RelayError> {
    let url_id = destination_urls::get_or_insert(conn, &new.destination_url)?;
    let status = enums.status_code(PackageStatus::Created)?;

    conn.execute(
        "INSERT INTO packages (package_name, package_type, destination_url_id, receiver_is_hub,
                               receiver_operator_id, sender_operator_id, package_status_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.name,
            new.package_type,
            url_id,
            new.receiver_is_hub,
            new.receiver_operator_id,
            new.sender_operator_id,
            status,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            RelayError::Conflict {
                what: format!("package `{}`", new.name),
            }
        } else {
            RelayError::storage(e)
        }
    })?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, enums, id)?
        .ok_or_else(|| RelayError::Internal(format!("package {id} vanished after insert")))
}

/// Persist status, routing fields and the error shadow of `package`.
///
/// The error row is upserted when `package.error` is set and deleted otherwise.
pub fn update_package(
    conn: &Connection,
    enums: &EnumTables,
    package: &Package,
) -> Result<(), RelayError> {
    let url_id = destination_urls::get_or_insert(conn, &package.destination_url)?;
    let status = enums.status_code(package.status)?;

    let changed = conn
        .execute(
            "UPDATE packages SET package_type = ?1, destination_url_id = ?2,
                 receiver_is_hub = ?3, receiver_operator_id = ?4, sender_operator_id = ?5,
                 package_status_id = ?6,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE package_id = ?7",
            params![
                package.package_type,
                url_id,
                package.receiver_is_hub,
                package.receiver_operator_id,
                package.sender_operator_id,
                status,
                package.id,
            ],
        )
        .map_err(RelayError::storage)?;
    if changed == 0 {
        return Err(RelayError::NotFound {
            what: format!("package id {}", package.id),
        });
    }

    let written = match &package.error {
        Some(err) => conn.execute(
            "INSERT INTO package_error (package_id, error_code, error_text) VALUES (?1, ?2, ?3)
             ON CONFLICT (package_id) DO UPDATE SET
                 error_code = excluded.error_code,
                 error_text = excluded.error_text,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![package.id, err.code, err.text],
        ),
        None => conn.execute(
            "DELETE FROM package_error WHERE package_id = ?1",
            params![package.id],
        ),
    };
    written.map_err(RelayError::storage)?;

    Ok(())
}
