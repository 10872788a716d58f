use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{LoanId, PaymentStatus};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: u64,
    },

    #[error("invalid status: {value}")]
    InvalidStatus {
        value: String,
    },

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("payment amount does not match outstanding balance: expected {expected}, provided {provided}")]
    AmountMismatch {
        expected: Money,
        provided: Money,
    },

    #[error("loan {loan_id} has {outstanding} outstanding payments, at most one is allowed")]
    InvariantViolation {
        loan_id: LoanId,
        outstanding: usize,
    },

    #[error("loan {loan_id} is closed")]
    LoanClosed {
        loan_id: LoanId,
    },

    #[error("invalid loan terms: {message}")]
    InvalidLoanTerms {
        message: String,
    },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("repository failure during {operation} ({entity_id}): {source}")]
    Repository {
        operation: &'static str,
        entity_id: String,
        #[source]
        source: RepositoryError,
    },
}

/// failures reported by a repository gateway implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage backend error: {message}")]
    Backend {
        message: String,
    },

    #[error("write conflict: {message}")]
    Conflict {
        message: String,
    },

    #[error("storage unavailable")]
    Unavailable,
}

impl BillingError {
    /// wrap a gateway failure with the operation and entity it concerned
    pub fn repository(
        operation: &'static str,
        entity_id: impl ToString,
    ) -> impl FnOnce(RepositoryError) -> BillingError {
        let entity_id = entity_id.to_string();
        move |source| BillingError::Repository {
            operation,
            entity_id,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_context() {
        let failed: std::result::Result<(), RepositoryError> = Err(RepositoryError::Unavailable);
        let err = failed
            .map_err(BillingError::repository("update_payment_status", 42))
            .unwrap_err();

        match &err {
            BillingError::Repository { operation, entity_id, source } => {
                assert_eq!(*operation, "update_payment_status");
                assert_eq!(entity_id, "42");
                assert_eq!(*source, RepositoryError::Unavailable);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "repository failure during update_payment_status (42): storage unavailable"
        );
    }
}
