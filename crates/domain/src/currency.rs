//! Currency conversion between the base currency (PHP) and display currencies.
//!
//! Stored amounts are always in the base currency. A currency's `rate` is how
//! many units of it buy one peso, so `display = base × rate` and
//! `base = amount / rate`.

use rust_decimal::prelude::*;

use crate::error::{CafeError, Result};

/// Decimal places shown for money.
const DECIMAL_PLACES: u32 = 2;

/// Largest accepted difference between a payment and the order total.
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds a money amount for presentation (2 places, half away from zero).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to `places` decimals, half away from zero.
pub fn round_to(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a base amount into a display currency.
pub fn display_price(base_amount: Decimal, rate: Decimal) -> Decimal {
    round_money(base_amount * rate)
}

/// Converts an amount in some currency back to the base currency, unrounded.
pub fn to_base(amount: Decimal, rate: Decimal) -> Result<Decimal> {
    if rate <= Decimal::ZERO {
        return Err(CafeError::Validation(format!(
            "Currency rate must be positive, got {rate}"
        )));
    }
    amount
        .checked_div(rate)
        .ok_or_else(|| CafeError::Validation("Payment amount is out of range".to_string()))
}

/// Returns true if two base amounts differ by no more than [`MONEY_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= MONEY_TOLERANCE
}
