// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Packing for pkgrelay.
//!
//! [`PackingDispatcher`] turns a declared type and a raw description payload
//! into packer input, and [`ArchivePacker`] is the packing capability that
//! produces signed tar.gz containers.

pub mod archive;
pub mod dispatcher;
pub mod payload;

pub use archive::{unpack, ArchivePacker, Container, ContainerKind, Manifest};
pub use dispatcher::PackingDispatcher;
pub use payload::Payload;
