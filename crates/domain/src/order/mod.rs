//! Orders: cart pricing, creation, reads and status transitions.

mod cart;
mod lifecycle;
mod state;
mod store;

pub use cart::{
    CartExtra, CartItem, MAX_QUANTITY, PricingSource, order_total, unit_price, validate_cart,
};
pub use lifecycle::{OrderLifecycle, TransitionOutcome};
pub use state::{TransitionPolicy, default_remarks, earns_points, parse_status};
pub use store::{ORDER_CREATED_REMARKS, OrderQuote, OrderStore, PlacedOrder, QuoteLine};
