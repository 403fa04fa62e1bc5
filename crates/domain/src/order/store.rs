//! Order creation and read access.

use std::time::Instant;

use chrono::Utc;
use common::{
    BranchId, CurrencyId, CustomerId, EmployeeRole, LoyaltyId, OrderId, OrderItemId, OrderStatus,
};
use datastore::{
    Currency, Datastore, NewHistoryEntry, NewOrder, OrderDetails, OrderScope, OrderSummary,
    UnitOfWork,
};
use rust_decimal::Decimal;

use super::cart::{CartItem, PricingSource, order_total, price_line, validate_cart};
use crate::caller::Caller;
use crate::currency::display_price;
use crate::error::{CafeError, Result};
use crate::unit::settle;

/// Remarks on the history row written when an order is placed.
pub const ORDER_CREATED_REMARKS: &str = "Order created by customer";

/// A newly placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub loyalty_id: Option<LoyaltyId>,
}

/// An order total and its lines priced in another currency.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuote {
    pub order_id: OrderId,
    pub currency: Currency,
    pub total_amount: Decimal,
    pub converted_total: Decimal,
    pub lines: Vec<QuoteLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLine {
    pub order_item_id: OrderItemId,
    pub menu_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub converted_unit_price: Decimal,
    pub converted_line_total: Decimal,
}

/// Service for placing and reading orders.
#[derive(Clone)]
pub struct OrderStore<S: Datastore> {
    store: S,
    pricing: PricingSource,
}

impl<S: Datastore> OrderStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            pricing: PricingSource::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingSource) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn pricing(&self) -> PricingSource {
        self.pricing
    }

    /// Places an order for the calling customer.
    ///
    /// The order, its items, their extras and the initial history row are
    /// written in one unit of work. Nothing is visible if any insert fails.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create(
        &self,
        caller: &Caller,
        branch_id: BranchId,
        items: &[CartItem],
    ) -> Result<PlacedOrder> {
        let customer_id = caller.require_customer()?;
        validate_cart(items, self.pricing)?;

        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = self
            .create_in(&mut unit, customer_id, branch_id, items)
            .await;
        let placed = settle(unit, "create_order", started, outcome).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %placed.order_id,
            total = %placed.total_amount,
            "order created"
        );
        Ok(placed)
    }

    async fn create_in(
        &self,
        unit: &mut S::Unit,
        customer_id: CustomerId,
        branch_id: BranchId,
        items: &[CartItem],
    ) -> Result<PlacedOrder> {
        if unit.branch(branch_id).await?.is_none() {
            return Err(CafeError::NotFound("Branch"));
        }

        let loyalty_id = unit
            .find_active_loyalty_card(customer_id)
            .await?
            .map(|card| card.id);

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            lines.push(price_line(unit, item, self.pricing).await?);
        }
        let new_items: Vec<_> = lines.iter().map(|line| line.item.clone()).collect();
        let total_amount = order_total(&new_items);

        let order_date = Utc::now();
        let order_id = unit
            .insert_order(NewOrder {
                customer_id,
                loyalty_id,
                branch_id,
                total_amount,
                order_date,
            })
            .await?;

        for line in &lines {
            let item_id = unit.insert_order_item(order_id, &line.item).await?;
            for extra in &line.extras {
                unit.insert_order_item_extra(item_id, extra).await?;
            }
        }

        unit.append_history(NewHistoryEntry {
            order_id,
            employee_id: None,
            status: OrderStatus::Pending,
            timestamp: order_date,
            remarks: ORDER_CREATED_REMARKS.to_string(),
        })
        .await?;

        Ok(PlacedOrder {
            order_id,
            total_amount,
            status: OrderStatus::Pending,
            loyalty_id,
        })
    }

    /// Lists the orders the caller may see, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, caller: &Caller) -> Result<Vec<OrderSummary>> {
        let scope = match *caller {
            Caller::Anonymous => return Err(CafeError::Unauthenticated("Unauthorized")),
            Caller::Customer { id } => OrderScope::Customer(id),
            Caller::Employee {
                role: EmployeeRole::Admin,
                ..
            } => OrderScope::All,
            Caller::Employee {
                branch_id: Some(branch_id),
                ..
            } => OrderScope::Branch(branch_id),
            Caller::Employee { branch_id: None, .. } => {
                return Err(CafeError::Validation("Branch ID not found".to_string()));
            }
        };
        Ok(self.store.list_orders(scope).await?)
    }

    /// Loads an order with its items, history and payment.
    ///
    /// Customers may only read their own orders.
    #[tracing::instrument(skip(self))]
    pub async fn details(&self, caller: &Caller, order_id: OrderId) -> Result<OrderDetails> {
        if *caller == Caller::Anonymous {
            return Err(CafeError::Unauthenticated("Unauthorized"));
        }

        let details = self
            .store
            .order_details(order_id)
            .await?
            .ok_or(CafeError::NotFound("Order"))?;

        if matches!(*caller, Caller::Customer { id } if id != details.order.customer_id) {
            return Err(CafeError::Forbidden("Unauthorized access to this order"));
        }
        Ok(details)
    }

    /// Prices an order in another currency without touching stored amounts.
    #[tracing::instrument(skip(self))]
    pub async fn quote(
        &self,
        caller: &Caller,
        order_id: OrderId,
        currency_id: CurrencyId,
    ) -> Result<OrderQuote> {
        let details = self.details(caller, order_id).await?;
        let currency = self
            .store
            .currency(currency_id)
            .await?
            .ok_or(CafeError::NotFound("Currency"))?;

        let lines = details
            .items
            .iter()
            .map(|line| {
                let line_total = line.item.price * Decimal::from(line.item.quantity);
                QuoteLine {
                    order_item_id: line.item.id,
                    menu_name: line.menu_name.clone(),
                    quantity: line.item.quantity,
                    unit_price: line.item.price,
                    converted_unit_price: display_price(line.item.price, currency.rate),
                    converted_line_total: display_price(line_total, currency.rate),
                }
            })
            .collect();

        Ok(OrderQuote {
            order_id,
            total_amount: details.order.total_amount,
            converted_total: display_price(details.order.total_amount, currency.rate),
            currency,
            lines,
        })
    }
}
