//! Domain error model.

use thiserror::Error;

use crate::entity::EntityType;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, illegal transitions, version conflicts). Infrastructure concerns
/// belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The requested target state is not reachable from the current state.
    #[error("illegal {entity_type} transition from '{from}' via '{requested}'")]
    IllegalTransition {
        entity_type: EntityType,
        from: String,
        requested: String,
    },

    /// The version guard rejected a stale expectation.
    #[error("version conflict (expected: {expected}, actual: {actual})")]
    VersionConflict { expected: u64, actual: u64 },

    /// A stock delta would drive a stock cell below zero.
    #[error("stock underflow: {0}")]
    StockUnderflow(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn illegal_transition(
        entity_type: EntityType,
        from: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::IllegalTransition {
            entity_type,
            from: from.into(),
            requested: requested.into(),
        }
    }

    pub fn stock_underflow(msg: impl Into<String>) -> Self {
        Self::StockUnderflow(msg.into())
    }
}
