// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue-facing edges of pkgrelay.
//!
//! The inbound side is a [`QueueConsumer`] worker pool over the durable
//! delivery queue. The outbound side is a pair of [`Publisher`] adapters
//! that hand finished packages to the downstream sender, either as a queue
//! entry or as an HTTP POST.
//!
//! [`Publisher`]: pkgrelay_core::Publisher

pub mod consumer;
pub mod delivery;
pub mod http;
pub mod publisher;

pub use consumer::{ConsumerSettings, QueueConsumer, Settlement};
pub use delivery::{Delivery, DeliveryEnvelope, EnvelopeError};
pub use http::HttpPublisher;
pub use publisher::{ForwardEnvelope, QueuePublisher};
