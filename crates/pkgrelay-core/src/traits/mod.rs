// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability trait definitions.
//!
//! All capabilities extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod blob;
pub mod packer;
pub mod publisher;
pub mod store;

pub use adapter::PluginAdapter;
pub use blob::BlobStore;
pub use packer::Packer;
pub use publisher::Publisher;
pub use store::PackageStore;
