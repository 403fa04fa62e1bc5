//! Domain layer for the cafe ordering service.
//!
//! This crate keeps order state, payment records and loyalty balances
//! consistent:
//! - [`OrderStore`] places orders from a cart and reads them back
//! - [`OrderLifecycle`] moves orders between statuses and credits points
//! - [`PaymentRecorder`] records at most one completed payment per order
//! - [`LoyaltyLedger`] earns and redeems points under a row lock
//!
//! Every mutating operation runs in one datastore unit of work that commits
//! on success and rolls back on any error.

pub mod caller;
pub mod currency;
pub mod error;
pub mod loyalty;
pub mod order;
pub mod payment;
mod unit;

pub use caller::Caller;
pub use currency::{MONEY_TOLERANCE, display_price, round_money, round_to, to_base};
pub use error::{CafeError, ErrorKind, Result};
pub use loyalty::{
    CardView, Enrollment, LoyaltyLedger, PESOS_PER_POINT, REDEEM_COST, Redemption,
    card_number_for, points_for,
};
pub use order::{
    CartExtra, CartItem, OrderLifecycle, OrderQuote, OrderStore, PlacedOrder, PricingSource,
    QuoteLine, TransitionOutcome, TransitionPolicy,
};
pub use payment::{PaymentReceipt, PaymentRecorder, PaymentRequest, normalize_payment_method};
