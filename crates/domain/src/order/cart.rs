//! Cart validation and pricing.

use std::str::FromStr;

use common::{DrinkOptionId, ExtraId, MenuId, ParseStatusError};
use datastore::{DrinkOption, Extra, MenuItem, NewOrderItem, OrderItemExtra, UnitOfWork};
use rust_decimal::Decimal;

use crate::error::{CafeError, Result};

/// Maximum allowed quantity per line or extra.
pub const MAX_QUANTITY: i32 = 9999;

/// Maximum allowed unit price (₱1,000,000).
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Where a line's unit price comes from when an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PricingSource {
    /// Re-price every line from the menu catalog.
    #[default]
    Catalog,

    /// Trust the price submitted with the cart.
    Client,
}

impl PricingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingSource::Catalog => "catalog",
            PricingSource::Client => "client",
        }
    }
}

impl FromStr for PricingSource {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" => Ok(PricingSource::Catalog),
            "client" => Ok(PricingSource::Client),
            _ => Err(ParseStatusError {
                kind: "pricing source",
                value: s.to_string(),
            }),
        }
    }
}

/// One line of a submitted cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub menu_id: MenuId,
    pub quantity: i32,
    /// Unit price as submitted; only used with [`PricingSource::Client`].
    pub price: Option<Decimal>,
    pub drink_option_id: Option<DrinkOptionId>,
    pub extras: Vec<CartExtra>,
}

impl CartItem {
    pub fn new(menu_id: MenuId, quantity: i32) -> Self {
        Self {
            menu_id,
            quantity,
            price: None,
            drink_option_id: None,
            extras: Vec::new(),
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_drink_option(mut self, option_id: DrinkOptionId) -> Self {
        self.drink_option_id = Some(option_id);
        self
    }

    pub fn with_extra(mut self, extra_id: ExtraId, quantity: i32) -> Self {
        self.extras.push(CartExtra { extra_id, quantity });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartExtra {
    pub extra_id: ExtraId,
    pub quantity: i32,
}

fn invalid_item(reason: impl std::fmt::Display) -> CafeError {
    CafeError::Validation(format!("Invalid item data: {reason}"))
}

fn check_quantity(quantity: i32, field: &str) -> Result<()> {
    if quantity <= 0 {
        return Err(invalid_item(format!(
            "{field} must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(invalid_item(format!(
            "{field} exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}

/// Checks the shape of a cart before any datastore work.
pub fn validate_cart(items: &[CartItem], source: PricingSource) -> Result<()> {
    if items.is_empty() {
        return Err(CafeError::Validation(
            "Order must contain at least one item".to_string(),
        ));
    }

    for item in items {
        check_quantity(item.quantity, "quantity")?;
        for extra in &item.extras {
            check_quantity(extra.quantity, "extra quantity")?;
        }

        if source == PricingSource::Client {
            let price = item
                .price
                .ok_or_else(|| invalid_item("price is required"))?;
            if price < Decimal::ZERO {
                return Err(invalid_item(format!(
                    "price must be non-negative, got {price}"
                )));
            }
            if price > MAX_PRICE {
                return Err(invalid_item(format!(
                    "price exceeds maximum allowed ({MAX_PRICE}), got {price}"
                )));
            }
        }
    }
    Ok(())
}

/// Catalog unit price: base price, drink modifier, then each extra times its quantity.
pub fn unit_price(
    menu: &MenuItem,
    option: Option<&DrinkOption>,
    extras: &[(Extra, i32)],
) -> Decimal {
    let modifier = option.map_or(Decimal::ZERO, |o| o.price_modifier);
    let extras_total: Decimal = extras
        .iter()
        .map(|(extra, quantity)| extra.price * Decimal::from(*quantity))
        .sum();
    menu.price + modifier + extras_total
}

/// `Σ(price × quantity)`, unrounded.
pub fn order_total(items: &[NewOrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

/// A cart line resolved against the catalog, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PricedLine {
    pub item: NewOrderItem,
    pub extras: Vec<OrderItemExtra>,
}

/// Resolves one cart line inside the order's unit of work.
///
/// References are checked under both pricing sources; only the unit price
/// differs.
pub(crate) async fn price_line<U: UnitOfWork>(
    unit: &mut U,
    item: &CartItem,
    source: PricingSource,
) -> Result<PricedLine> {
    let menu = unit
        .menu_item(item.menu_id)
        .await?
        .ok_or_else(|| invalid_item(format!("menu item {} does not exist", item.menu_id)))?;

    let option = match item.drink_option_id {
        Some(option_id) => {
            let option = unit
                .drink_option(option_id)
                .await?
                .filter(|o| o.menu_id == menu.id)
                .ok_or_else(|| {
                    invalid_item(format!(
                        "drink option {option_id} does not belong to menu item {}",
                        menu.id
                    ))
                })?;
            Some(option)
        }
        None => None,
    };

    let mut extras = Vec::with_capacity(item.extras.len());
    for requested in &item.extras {
        let extra = unit
            .extra(requested.extra_id)
            .await?
            .ok_or_else(|| invalid_item(format!("extra {} does not exist", requested.extra_id)))?;
        extras.push((extra, requested.quantity));
    }

    let price = match source {
        PricingSource::Catalog => {
            if !menu.is_available {
                return Err(invalid_item(format!("{} is not available", menu.name)));
            }
            unit_price(&menu, option.as_ref(), &extras)
        }
        PricingSource::Client => item
            .price
            .ok_or_else(|| invalid_item("price is required"))?,
    };

    Ok(PricedLine {
        item: NewOrderItem {
            menu_id: menu.id,
            drink_option_id: option.map(|o| o.id),
            quantity: item.quantity,
            price,
        },
        extras: extras
            .iter()
            .map(|(extra, quantity)| OrderItemExtra {
                extra_id: extra.id,
                quantity: *quantity,
            })
            .collect(),
    })
}
