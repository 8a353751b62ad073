use thiserror::Error;

use crate::domain::{CustomerId, TransactionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction {transaction_id} does not belong to customer {customer_id}")]
    OwnershipMismatch {
        transaction_id: TransactionId,
        customer_id: CustomerId,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transaction type: '{0}' (expected credit or payment)")]
    InvalidType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mobile number already exists: {0}")]
    DuplicateMobile(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Coarse error classes a presentation layer can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or range
    Validation,
    /// Referenced entity absent
    NotFound,
    /// Uniqueness violation
    Conflict,
    /// Cross-customer reference
    Ownership,
    /// Commit, rollback or connection failure
    Storage,
}

impl ErrorKind {
    /// HTTP status a web front end would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Ownership => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage => 500,
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::CustomerNotFound(_) | AppError::TransactionNotFound(_) => ErrorKind::NotFound,
            AppError::OwnershipMismatch { .. } => ErrorKind::Ownership,
            AppError::InvalidAmount(_) | AppError::InvalidType(_) | AppError::InvalidInput(_) => {
                ErrorKind::Validation
            }
            AppError::DuplicateMobile(_) => ErrorKind::Conflict,
            AppError::Database(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to show to an end user. Storage details stay internal.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "The ledger could not be updated. Please try again.".into(),
            other => other.to_string(),
        }
    }
}

/// True when `err` wraps a SQLite UNIQUE violation on the mobile column.
pub(crate) fn is_duplicate_mobile(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => {
            db_err.is_unique_violation() && db_err.message().contains("mobile")
        }
        _ => false,
    })
}
