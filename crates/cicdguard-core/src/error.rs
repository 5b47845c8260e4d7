use crate::config::ConfigError;
use crate::schema::{NodeKind, Relation};
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by the ingestion and annotation engine.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A raw record is missing a schema field or carries an unusable value.
    /// The record is skipped; the scan continues.
    #[error("Malformed {kind} record: field '{field}' {reason}")]
    MalformedRecord {
        kind: NodeKind,
        field: String,
        reason: String,
    },

    /// A node that a relationship or finding points at does not exist.
    #[error("No {kind} node with key '{key}'")]
    LookupMiss { kind: NodeKind, key: String },

    /// A platform API call failed.
    #[error("Upstream request for {what} failed: {message}")]
    UpstreamFailure { what: String, message: String },

    /// The persistence layer rejected a read or write.
    #[error("Store failure: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("Relation {relation} is not allowed from {from_kind} to {to_kind}")]
    SchemaViolation {
        from_kind: NodeKind,
        relation: Relation,
        to_kind: NodeKind,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GuardError {
    pub fn malformed(kind: NodeKind, field: &str, reason: impl Into<String>) -> Self {
        GuardError::MalformedRecord {
            kind,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn upstream(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        GuardError::UpstreamFailure {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Whether the driver may skip the current record and keep scanning.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GuardError::SchemaViolation { .. } | GuardError::Config(_))
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
