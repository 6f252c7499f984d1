// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for pkgrelay integration tests.
//!
//! Provides mock capabilities and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MemoryBlobStore`] - In-memory blob store with put counting and failure injection
//! - [`MockPacker`] - Packer recording every call
//! - [`MockPublisher`] - Publisher capturing published packages
//! - [`FaultyStore`] - Package store wrapper with switchable faults
//! - [`TestHarness`] - The full orchestrator on a temp SQLite database

pub mod faulty_store;
pub mod harness;
pub mod mock_blob;
pub mod mock_packer;
pub mod mock_publisher;

pub use faulty_store::FaultyStore;
pub use harness::{invitation_request, messages_request, package_request, TestHarness};
pub use mock_blob::MemoryBlobStore;
pub use mock_packer::{MockPacker, PackCall};
pub use mock_publisher::{MockPublisher, Published};
