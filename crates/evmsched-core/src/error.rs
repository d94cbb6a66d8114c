//! Shared domain error type.

use thiserror::Error;

/// Errors raised by domain-level validation and lookup.
///
/// The service boundary maps these onto HTTP statuses: `NotFound` → 404,
/// `Validation` → 400, `Authorization` → 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = DomainError::validation("duration must be non-negative");
        assert!(err.to_string().contains("duration must be non-negative"));
    }
}
