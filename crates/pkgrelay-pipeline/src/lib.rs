// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The package pipeline: lifecycle orchestration, outcome recording and
//! forwarding. Entry points hand a [`PackageRequest`](pkgrelay_core::PackageRequest)
//! to [`Orchestrator::process_package`] and act on the returned
//! [`Outcome`](pkgrelay_core::Outcome).

pub mod forwarder;
pub mod orchestrator;
pub mod recorder;

pub use forwarder::Forwarder;
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use recorder::ResultRecorder;
