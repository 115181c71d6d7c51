//! Domain errors raised by the loan ledger

use thiserror::Error;

/// Errors from ledger operations (payments, origination, schemes, jobs)
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Referenced loan, installment or scheme is missing or not in the
    /// expected active state
    #[error("{0} not found")]
    NotFound(String),

    /// A payment or investment amount violates its constraints
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any database error inside a unit of work; the transaction is rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailure(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        LedgerError::InvalidAmount(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }
}
