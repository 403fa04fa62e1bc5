//! Payment recording endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use common::{CurrencyId, OrderId, OrderStatus, PaymentMethod, TransactionId, TransactionStatus};
use datastore::{Datastore, TransactionLine};
use domain::{PaymentReceipt, PaymentRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub order_id: OrderId,
    pub currency_id: CurrencyId,
    pub payment_method: String,
    pub amount_paid: Decimal,
}

impl From<CreateTransactionRequest> for PaymentRequest {
    fn from(req: CreateTransactionRequest) -> Self {
        Self {
            order_id: req.order_id,
            currency_id: req.currency_id,
            payment_method: req.payment_method,
            amount_paid: req.amount_paid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_php: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub exchange_rate: Decimal,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub order_status: OrderStatus,
}

impl From<PaymentReceipt> for ReceiptResponse {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id,
            order_id: receipt.order_id,
            amount_paid: receipt.amount_paid,
            amount_php: receipt.amount_php,
            exchange_rate: receipt.exchange_rate,
            payment_method: receipt.payment_method,
            status: receipt.status,
            order_status: receipt.order_status,
        }
    }
}

/// A stored payment as shown with order details.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    pub currency_id: CurrencyId,
    pub currency_code: String,
    pub currency_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub exchange_rate: Decimal,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub transaction_date: DateTime<Utc>,
}

impl From<TransactionLine> for TransactionResponse {
    fn from(line: TransactionLine) -> Self {
        Self {
            transaction_id: line.transaction.id,
            currency_id: line.transaction.currency_id,
            currency_code: line.currency_code,
            currency_symbol: line.currency_symbol,
            amount_paid: line.transaction.amount_paid,
            exchange_rate: line.transaction.exchange_rate,
            payment_method: line.transaction.payment_method,
            status: line.transaction.status,
            transaction_date: line.transaction.transaction_date,
        }
    }
}

/// POST /transactions: record the payment for an order.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<Reply<ReceiptResponse>, ApiError> {
    let Json(req) = payload?;
    let receipt = state.payments.record(&caller, req.into()).await?;
    Ok(Reply::created(
        receipt.into(),
        "Transaction recorded successfully",
    ))
}
