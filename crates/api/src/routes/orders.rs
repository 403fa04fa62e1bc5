//! Order placement, listing, details, status and quote endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, EmployeeRole, ExtraId, HistoryId,
    LoyaltyId, MenuId, OrderId, OrderItemId, OrderStatus,
};
use datastore::{
    Branch, Customer, Datastore, ExtraLine, HistoryLine, Order, OrderDetails, OrderLine,
    OrderSummary,
};
use domain::{CartItem, OrderQuote, PlacedOrder, TransitionOutcome, round_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::loyalty::LoyaltyCardResponse;
use super::transactions::TransactionResponse;
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub branch_id: BranchId,
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub menu_id: MenuId,
    pub quantity: i32,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub drink_option_id: Option<DrinkOptionId>,
    #[serde(default)]
    pub extras: Vec<CartExtraRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CartExtraRequest {
    pub extra_id: ExtraId,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

impl From<CartItemRequest> for CartItem {
    fn from(req: CartItemRequest) -> Self {
        let mut item = CartItem::new(req.menu_id, req.quantity);
        item.price = req.price;
        item.drink_option_id = req.drink_option_id;
        for extra in req.extras {
            item = item.with_extra(extra.extra_id, extra.quantity);
        }
        item
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub currency_id: CurrencyId,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: OrderId,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub loyalty_id: Option<LoyaltyId>,
}

impl From<PlacedOrder> for OrderCreatedResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            order_id: placed.order_id,
            total_amount: round_money(placed.total_amount),
            status: placed.status,
            loyalty_id: placed.loyalty_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub earned_points: i64,
    pub customer_name: Option<String>,
    pub branch_name: Option<String>,
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            order_id: summary.id,
            order_date: summary.order_date,
            total_amount: round_money(summary.total_amount),
            status: summary.status,
            earned_points: summary.earned_points,
            customer_name: summary.customer_name,
            branch_name: summary.branch_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub branch_id: BranchId,
    pub loyalty_id: Option<LoyaltyId>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub earned_points: i64,
    pub order_date: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            customer_id: order.customer_id,
            branch_id: order.branch_id,
            loyalty_id: order.loyalty_id,
            total_amount: round_money(order.total_amount),
            status: order.status,
            earned_points: order.earned_points,
            order_date: order.order_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer_id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone_num: Option<String>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            customer_id: customer.id,
            name: customer.name,
            email: customer.email,
            phone_num: customer.phone_num,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BranchResponse {
    pub branch_id: BranchId,
    pub name: String,
    pub address: Option<String>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            branch_id: branch.id,
            name: branch.name,
            address: branch.address,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtraLineResponse {
    pub extra_id: ExtraId,
    pub name: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub quantity: i32,
}

impl From<ExtraLine> for ExtraLineResponse {
    fn from(extra: ExtraLine) -> Self {
        Self {
            extra_id: extra.extra_id,
            name: extra.name,
            price: extra.price.map(round_money),
            quantity: extra.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub order_item_id: OrderItemId,
    pub menu_id: MenuId,
    pub menu_name: Option<String>,
    pub description: Option<String>,
    pub drink_option_id: Option<DrinkOptionId>,
    pub temperature: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    pub extras: Vec<ExtraLineResponse>,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            order_item_id: line.item.id,
            menu_id: line.item.menu_id,
            menu_name: line.menu_name,
            description: line.description,
            drink_option_id: line.item.drink_option_id,
            temperature: line.temperature,
            quantity: line.item.quantity,
            price: round_money(line.item.price),
            subtotal: round_money(line.item.price * Decimal::from(line.item.quantity)),
            extras: line.extras.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history_id: HistoryId,
    pub status: OrderStatus,
    pub remarks: String,
    pub timestamp: DateTime<Utc>,
    pub employee_id: Option<EmployeeId>,
    pub employee_name: Option<String>,
    pub employee_role: Option<EmployeeRole>,
}

impl From<HistoryLine> for HistoryResponse {
    fn from(line: HistoryLine) -> Self {
        Self {
            history_id: line.entry.id,
            status: line.entry.status,
            remarks: line.entry.remarks,
            timestamp: line.entry.timestamp,
            employee_id: line.entry.employee_id,
            employee_name: line.employee_name,
            employee_role: line.employee_role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetailsResponse {
    pub order: OrderResponse,
    pub customer: Option<CustomerResponse>,
    pub branch: Option<BranchResponse>,
    pub loyalty_card: Option<LoyaltyCardResponse>,
    pub items: Vec<OrderLineResponse>,
    pub history: Vec<HistoryResponse>,
    pub transaction: Option<TransactionResponse>,
}

impl From<OrderDetails> for OrderDetailsResponse {
    fn from(details: OrderDetails) -> Self {
        Self {
            order: details.order.into(),
            customer: details.customer.map(Into::into),
            branch: details.branch.map(Into::into),
            loyalty_card: details.loyalty_card.map(Into::into),
            items: details.items.into_iter().map(Into::into).collect(),
            history: details.history.into_iter().map(Into::into).collect(),
            transaction: details.transaction.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusChangedResponse {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub points_earned: i64,
}

impl From<TransitionOutcome> for StatusChangedResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            order_id: outcome.order_id,
            previous_status: outcome.previous_status,
            status: outcome.status,
            points_earned: outcome.points_earned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteLineResponse {
    pub order_item_id: OrderItemId,
    pub menu_name: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub converted_unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub converted_line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub order_id: OrderId,
    pub currency_id: CurrencyId,
    pub currency_code: String,
    pub currency_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub exchange_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub converted_total: Decimal,
    pub items: Vec<QuoteLineResponse>,
}

impl From<OrderQuote> for QuoteResponse {
    fn from(quote: OrderQuote) -> Self {
        Self {
            order_id: quote.order_id,
            currency_id: quote.currency.id,
            currency_code: quote.currency.code,
            currency_symbol: quote.currency.symbol,
            exchange_rate: quote.currency.rate,
            total_amount: round_money(quote.total_amount),
            converted_total: quote.converted_total,
            items: quote
                .lines
                .into_iter()
                .map(|line| QuoteLineResponse {
                    order_item_id: line.order_item_id,
                    menu_name: line.menu_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    converted_unit_price: line.converted_unit_price,
                    converted_line_total: line.converted_line_total,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order for the calling customer.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Reply<OrderCreatedResponse>, ApiError> {
    let Json(req) = payload?;
    let items: Vec<CartItem> = req.items.into_iter().map(Into::into).collect();

    let placed = state.orders.create(&caller, req.branch_id, &items).await?;
    Ok(Reply::created(placed.into(), "Order created successfully"))
}

/// GET /orders: list the orders visible to the caller, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Reply<Vec<OrderSummaryResponse>>, ApiError> {
    let orders = state.orders.list(&caller).await?;
    Ok(Reply::ok(
        orders.into_iter().map(Into::into).collect(),
        "Orders retrieved successfully",
    ))
}

/// GET /orders/{id}: order with items, history and payment.
#[tracing::instrument(skip(state))]
pub async fn get<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    id: Result<Path<OrderId>, PathRejection>,
) -> Result<Reply<OrderDetailsResponse>, ApiError> {
    let Path(order_id) = id?;
    let details = state.orders.details(&caller, order_id).await?;
    Ok(Reply::ok(details.into(), "Order retrieved successfully"))
}

/// POST /orders/{id}/status: move an order to a new status.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    id: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Reply<StatusChangedResponse>, ApiError> {
    let Path(order_id) = id?;
    let Json(req) = payload?;

    let outcome = state
        .lifecycle
        .transition(&caller, order_id, &req.status, req.remarks.as_deref())
        .await?;
    Ok(Reply::ok(outcome.into(), "Order status updated successfully"))
}

/// GET /orders/{id}/quote?currency_id=: order priced in another currency.
#[tracing::instrument(skip(state))]
pub async fn quote<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    id: Result<Path<OrderId>, PathRejection>,
    params: Result<Query<QuoteParams>, QueryRejection>,
) -> Result<Reply<QuoteResponse>, ApiError> {
    let Path(order_id) = id?;
    let Query(params) = params?;

    let quote = state
        .orders
        .quote(&caller, order_id, params.currency_id)
        .await?;
    Ok(Reply::ok(quote.into(), "Quote calculated successfully"))
}
