// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for pkgrelay.
//!
//! WAL-mode SQLite with embedded migrations and a single writer thread via
//! `tokio-rusqlite`: the package store, its audit log and lookup tables, and
//! a durable delivery queue. Also hosts the filesystem blob store.

pub mod adapter;
pub mod blob;
pub mod database;
pub mod enums;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqlitePackageStore;
pub use blob::FsBlobStore;
pub use database::Database;
pub use enums::EnumTables;
pub use models::{QueueDepth, QueueEntry, QueueStatus};
