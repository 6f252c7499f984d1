// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream forwarding of completed packages.

use std::sync::Arc;
use std::time::Duration;

use pkgrelay_core::{
    Failure, FailureCode, Package, PackageEventType, PackageStore, Publisher, RelayError, Severity,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Publishes a package reference and appends the `Sent` event.
#[derive(Clone)]
pub struct Forwarder {
    store: Arc<dyn PackageStore>,
    publisher: Arc<dyn Publisher>,
    routing_hint: String,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn PackageStore>,
        publisher: Arc<dyn Publisher>,
        routing_hint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            routing_hint: routing_hint.into(),
            timeout,
        }
    }

    /// Publish `package` downstream.
    ///
    /// Any publish failure is transient. Once the publish went through, a
    /// failed `Sent` append is logged and counted but not returned, since the
    /// downstream side effect already happened.
    pub async fn forward(&self, package: &Package, cancel: &CancellationToken) -> Result<(), Failure> {
        debug!(package = %package.name, "forwarding package");

        let published = tokio::select! {
            _ = cancel.cancelled() => Err(RelayError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.publisher.publish(package, &self.routing_hint)) => {
                res.unwrap_or(Err(RelayError::Timeout { duration: self.timeout }))
            }
        };
        if let Err(e) = published {
            let code = if matches!(e, RelayError::Cancelled) {
                FailureCode::Cancelled
            } else {
                FailureCode::Publish
            };
            return Err(Failure::with_severity(
                code,
                Severity::Transient,
                format!("publish package {}", package.name),
                e,
            ));
        }

        if let Err(e) = self
            .store
            .append_event(package.id, PackageEventType::Sent, &package.name)
            .await
        {
            pkgrelay_prometheus::record_error(false, FailureCode::InsertEvent.into());
            error!(
                package = %package.name,
                error = %e,
                "package was forwarded but the sent event could not be recorded"
            );
        }
        Ok(())
    }
}
