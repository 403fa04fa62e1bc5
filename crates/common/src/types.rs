use serde::{Deserialize, Serialize};

/// Declares a typed row identifier.
///
/// The datastore hands out `BIGSERIAL` keys; wrapping them prevents mixing up
/// an order id with a customer id at compile time.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a registered customer.
    CustomerId
);
row_id!(
    /// Identifier of a staff member, manager or admin.
    EmployeeId
);
row_id!(
    /// Identifier of a cafe branch.
    BranchId
);
row_id!(
    /// Identifier of an order.
    OrderId
);
row_id!(OrderItemId);
row_id!(
    /// Identifier of a loyalty card.
    LoyaltyId
);
row_id!(
    /// Identifier of a payment record.
    TransactionId
);
row_id!(CurrencyId);
row_id!(MenuId);
row_id!(DrinkOptionId);
row_id!(ExtraId);
row_id!(HistoryId);
