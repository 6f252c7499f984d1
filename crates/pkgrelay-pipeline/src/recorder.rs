// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic persistence of a packing/storage outcome.
//!
//! One transaction appends the terminal event and updates the package row.
//! The event log and the status column therefore never diverge.

use std::sync::Arc;

use pkgrelay_core::{
    Failure, FailureCode, Package, PackageError, PackageEventType, PackageStatus, PackageStore,
    RelayError, Severity, TransactionStep,
};
use tracing::{debug, warn};

/// Writes `Success`/`Error` outcomes through [`PackageStore::record_outcome`].
#[derive(Clone)]
pub struct ResultRecorder {
    store: Arc<dyn PackageStore>,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    /// Record `outcome` for `package`.
    ///
    /// On commit, `package` is replaced by the state that was written. When
    /// the transaction fails, `package` keeps its previous state and the
    /// returned failure is always transient: the package was not moved out
    /// of its current status, so a redelivery resolves it again.
    pub async fn record(
        &self,
        package: &mut Package,
        outcome: Result<(), &Failure>,
    ) -> Result<(), Failure> {
        let mut next = package.clone();
        let (event, description) = match outcome {
            Ok(()) => {
                next.status = PackageStatus::Success;
                next.error = None;
                (PackageEventType::Success, package.name.clone())
            }
            Err(failure) => {
                let text = failure.developer_message();
                next.status = PackageStatus::Failed;
                next.error = Some(PackageError {
                    code: failure.code().to_string(),
                    text: text.clone(),
                });
                (PackageEventType::Error, text)
            }
        };

        match self.store.record_outcome(&next, event, &description).await {
            Ok(()) => {
                debug!(package = %next.name, status = %next.status, "outcome recorded");
                *package = next;
                Ok(())
            }
            Err(e) => {
                warn!(package = %package.name, %event, error = %e, "outcome not recorded");
                Err(transaction_failure(e).context(format!("package {}", package.name)))
            }
        }
    }
}

fn transaction_failure(err: RelayError) -> Failure {
    let code = match &err {
        RelayError::Transaction { step, .. } => match step {
            TransactionStep::Open => FailureCode::OpenTransaction,
            TransactionStep::InsertEvent => FailureCode::InsertEvent,
            TransactionStep::UpdatePackage => FailureCode::UpdatePackage,
            TransactionStep::Commit => FailureCode::CommitTransaction,
        },
        _ => FailureCode::OpenTransaction,
    };
    Failure::with_severity(code, Severity::Transient, "record outcome", err)
}
