//! Errors raised by pure domain code.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A deterministic rejection from domain code. Never carries I/O failures;
/// those live in the store layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input is malformed or out of range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A computed value broke a domain rule (negative stock, total overflow).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
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

    /// The message without its variant prefix, for embedding in API errors.
    pub fn detail(&self) -> String {
        match self {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => msg.clone(),
        }
    }
}
