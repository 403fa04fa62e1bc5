//! Shared identifiers and status vocabularies.
//!
//! Every crate in the workspace speaks in these types so that an order id can
//! never be passed where a customer id is expected, and so that statuses are
//! parsed once at the edge instead of compared as strings.

pub mod status;
pub mod types;

pub use status::{EmployeeRole, OrderStatus, ParseStatusError, PaymentMethod, TransactionStatus};
pub use types::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, ExtraId, HistoryId, LoyaltyId,
    MenuId, OrderId, OrderItemId, TransactionId,
};
