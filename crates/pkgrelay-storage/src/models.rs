// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types owned by the storage crate.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lifecycle of a `delivery_queue` entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
    Dead,
}

/// One queued delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: QueueStatus,
    /// How many times this entry has been handed to a consumer, including the current one.
    pub deliveries: u32,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Entry counts per status for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub rejected: i64,
    pub dead: i64,
}
