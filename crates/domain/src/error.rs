//! Domain error types.

use common::OrderStatus;
use datastore::DatastoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Constraint that keeps a second completed payment out of the datastore.
pub(crate) const ONE_COMPLETED_PAYMENT: &str = "transactions_one_completed_per_order";

/// Broad class of a [`CafeError`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Persistence,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum CafeError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// The converted payment does not match the order total.
    #[error("Payment amount mismatch. Expected: ₱{expected:.2}, Received: ₱{received:.2}")]
    AmountMismatch { expected: Decimal, received: Decimal },

    /// The card balance is below the redemption cost.
    #[error("Insufficient points. You have {balance} points. Need {required} points to redeem.")]
    InsufficientPoints { balance: i64, required: i64 },

    /// The order cannot move between these statuses.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order already has a completed payment.
    #[error("Order already has a completed payment")]
    AlreadyPaid,

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// No identity was presented.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// The identity may not perform this operation.
    #[error("{0}")]
    Forbidden(&'static str),

    /// The datastore failed; the unit of work was rolled back.
    #[error("Datastore error: {0}")]
    Persistence(DatastoreError),
}

impl CafeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CafeError::Validation(_)
            | CafeError::AmountMismatch { .. }
            | CafeError::InsufficientPoints { .. } => ErrorKind::Validation,
            CafeError::InvalidTransition { .. } | CafeError::AlreadyPaid => ErrorKind::Conflict,
            CafeError::NotFound(_) => ErrorKind::NotFound,
            CafeError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            CafeError::Forbidden(_) => ErrorKind::Forbidden,
            CafeError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CafeError::Persistence(e) if e.is_retryable())
    }
}

impl From<DatastoreError> for CafeError {
    fn from(err: DatastoreError) -> Self {
        match err.violated_constraint() {
            Some(ONE_COMPLETED_PAYMENT) => CafeError::AlreadyPaid,
            _ => CafeError::Persistence(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CafeError>;
