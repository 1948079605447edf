//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing required application fields).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lifecycle transition was attempted from a state that does not
    /// satisfy its precondition.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The persisted record no longer matches the state the caller observed
    /// (lost an optimistic-concurrency race). Re-fetch and retry.
    #[error("stale state: {0}")]
    StaleState(String),

    /// Email or username already taken.
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// A one-time token (reset / verification) did not match the stored digest.
    #[error("invalid token")]
    InvalidToken,

    /// A one-time token matched but its validity window has passed.
    #[error("expired token")]
    ExpiredToken,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn stale(msg: impl Into<String>) -> Self {
        Self::StaleState(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateIdentity(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
