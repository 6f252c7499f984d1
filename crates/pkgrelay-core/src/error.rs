// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types and failure classification for pkgrelay.
//!
//! Two layers live here:
//!
//! - [`RelayError`] is what capability implementations (store, blob store,
//!   packer, publisher) return. Every variant knows its own [`Severity`].
//! - [`Failure`] is the tagged value the pipeline carries end to end. It
//!   pairs a machine code ([`FailureCode`]) with a developer-facing message
//!   and the severity chosen by the component that produced it.
//!
//! [`Outcome`] is what the orchestrator hands to the entry points.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Retry classification attached to every failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Retrying will never succeed (malformed input, unknown type, structural defect).
    Critical,
    /// Retrying may succeed (store unavailable, blob hiccup, downstream down).
    Transient,
}

/// Statement of an outcome transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStep {
    Open,
    InsertEvent,
    UpdatePackage,
    Commit,
}

/// Component-level error returned by capability implementations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration or startup consistency errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Relational store errors (connection, query, transaction).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One statement of a multi-statement transaction failed; nothing was committed.
    #[error("transaction failed at {step}: {source}")]
    Transaction {
        step: TransactionStep,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A uniqueness constraint rejected an insert.
    #[error("conflict: {what} already exists")]
    Conflict { what: String },

    /// A referenced row does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Blob store errors. The store decides the severity.
    #[error("blob store error for `{key}`: {message}")]
    Blob {
        key: String,
        message: String,
        severity: Severity,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The packing capability rejected the assembled input.
    #[error("packing error: {message}")]
    Packing {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Downstream publish failed.
    #[error("publish error: {message}")]
    Publish {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Retry classification chosen by the component that produced the error.
    pub fn severity(&self) -> Severity {
        match self {
            RelayError::Config(_) | RelayError::NotFound { .. } | RelayError::Packing { .. } => {
                Severity::Critical
            }
            RelayError::Blob { severity, .. } => *severity,
            RelayError::Storage { .. }
            | RelayError::Transaction { .. }
            | RelayError::Conflict { .. }
            | RelayError::Publish { .. }
            | RelayError::Timeout { .. }
            | RelayError::Cancelled
            | RelayError::Internal(_) => Severity::Transient,
        }
    }

    /// Shorthand for a storage error wrapping any source.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RelayError::Storage {
            source: source.into(),
        }
    }
}

/// Machine code of a pipeline failure. Stored in `package_error.error_code`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    SelectPackage,
    InsertPackage,
    InsertEvent,
    UpdatePackage,
    OpenTransaction,
    CommitTransaction,
    EmptyBody,
    UnknownPackageType,
    Unmarshal,
    GetBlob,
    PackContainer,
    SaveBlob,
    Publish,
    Cancelled,
}

/// A classified pipeline failure.
///
/// The severity is fixed when the failure is created and is never changed
/// by wrapping; [`Failure::context`] only prefixes the message.
#[derive(Debug)]
pub struct Failure {
    code: FailureCode,
    severity: Severity,
    message: String,
    source: Option<RelayError>,
}

impl Failure {
    /// A failure that retrying cannot fix.
    pub fn critical(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Critical,
            message: message.into(),
            source: None,
        }
    }

    /// A failure that a later redelivery may fix.
    pub fn transient(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Transient,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a component error, inheriting its severity.
    pub fn from_error(code: FailureCode, message: impl Into<String>, err: RelayError) -> Self {
        Self {
            code,
            severity: err.severity(),
            message: message.into(),
            source: Some(err),
        }
    }

    /// Wrap a component error with an explicit severity chosen by the producer.
    pub fn with_severity(
        code: FailureCode,
        severity: Severity,
        message: impl Into<String>,
        err: RelayError,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            source: Some(err),
        }
    }

    /// Prefix the message with operation context. Severity is untouched.
    pub fn context(mut self, ctx: impl fmt::Display) -> Self {
        self.message = format!("{ctx}: {}", self.message);
        self
    }

    pub fn code(&self) -> FailureCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Message without the source chain.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Full developer-facing detail, including the underlying error.
    ///
    /// This is what gets persisted as `error_text` and as the `Error` event
    /// description.
    pub fn developer_message(&self) -> String {
        match &self.source {
            Some(source) => format!("{}: {source}", self.message),
            None => self.message.clone(),
        }
    }

    pub fn source_error(&self) -> Option<&RelayError> {
        self.source.as_ref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.developer_message())
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Final result of one `process_package` invocation.
#[derive(Debug)]
pub enum Outcome {
    Success,
    TemporaryFailure(Failure),
    FatalFailure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success => None,
            Outcome::TemporaryFailure(f) | Outcome::FatalFailure(f) => Some(f),
        }
    }
}

impl From<Result<(), Failure>> for Outcome {
    fn from(result: Result<(), Failure>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(f) if f.is_critical() => Outcome::FatalFailure(f),
            Err(f) => Outcome::TemporaryFailure(f),
        }
    }
}
