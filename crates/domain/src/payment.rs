//! Payment recording.

use std::time::Instant;

use chrono::Utc;
use common::{
    CurrencyId, EmployeeId, OrderId, OrderStatus, PaymentMethod, TransactionId, TransactionStatus,
};
use datastore::{Datastore, NewHistoryEntry, NewPaymentTransaction, UnitOfWork};
use rust_decimal::Decimal;

use crate::caller::Caller;
use crate::currency::{round_money, round_to, to_base, within_tolerance};
use crate::error::{CafeError, Result};
use crate::unit::settle;

/// Remarks on the history row written when a payment confirms an order.
pub const PAYMENT_RECEIVED_REMARKS: &str = "Payment received";

/// Maps a submitted payment method onto the canonical set.
///
/// Matching ignores case and surrounding whitespace; `gcash` is recorded as a
/// bank transfer.
pub fn normalize_payment_method(raw: &str) -> Result<PaymentMethod> {
    let method = raw.trim().to_ascii_lowercase();
    if method == "gcash" {
        return Ok(PaymentMethod::BankTransfer);
    }
    method
        .parse()
        .map_err(|_| CafeError::Validation("Invalid payment method".to_string()))
}

/// A payment as submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub currency_id: CurrencyId,
    pub payment_method: String,
    /// Amount in the payment currency.
    pub amount_paid: Decimal,
}

/// A recorded payment, with amounts rounded for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub amount_paid: Decimal,
    pub amount_php: Decimal,
    pub exchange_rate: Decimal,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    /// Order status after the payment.
    pub order_status: OrderStatus,
}

/// Records at most one completed payment per order.
#[derive(Clone)]
pub struct PaymentRecorder<S: Datastore> {
    store: S,
}

impl<S: Datastore> PaymentRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a payment and confirms a pending order.
    ///
    /// The transaction row and the status change commit together. Anyone may
    /// pay; an employee caller is attributed on the history row.
    #[tracing::instrument(skip(self))]
    pub async fn record(&self, caller: &Caller, request: PaymentRequest) -> Result<PaymentReceipt> {
        let method = normalize_payment_method(&request.payment_method)?;
        if request.amount_paid < Decimal::ZERO {
            return Err(CafeError::Validation(
                "Payment amount must be non-negative".to_string(),
            ));
        }

        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = Self::record_in(&mut unit, caller.employee_id(), &request, method).await;
        match settle(unit, "record_payment", started, outcome).await {
            Ok(receipt) => {
                metrics::counter!("payments_recorded_total", "method" => method.as_str())
                    .increment(1);
                tracing::info!(
                    transaction_id = %receipt.transaction_id,
                    order_id = %receipt.order_id,
                    method = %method,
                    "payment recorded"
                );
                Ok(receipt)
            }
            Err(err) => {
                let reason = match &err {
                    CafeError::AlreadyPaid => Some("already_paid"),
                    CafeError::AmountMismatch { .. } => Some("amount_mismatch"),
                    _ => None,
                };
                if let Some(reason) = reason {
                    metrics::counter!("payments_rejected_total", "reason" => reason).increment(1);
                    tracing::warn!(order_id = %request.order_id, reason, "payment rejected");
                }
                Err(err)
            }
        }
    }

    async fn record_in(
        unit: &mut S::Unit,
        employee_id: Option<EmployeeId>,
        request: &PaymentRequest,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt> {
        let order = unit
            .lock_order(request.order_id)
            .await?
            .ok_or(CafeError::NotFound("Order"))?;

        if unit.find_completed_transaction(order.id).await?.is_some() {
            return Err(CafeError::AlreadyPaid);
        }

        let currency = unit
            .currency(request.currency_id)
            .await?
            .ok_or(CafeError::NotFound("Currency"))?;

        let amount_php = to_base(request.amount_paid, currency.rate)?;
        if !within_tolerance(amount_php, order.total_amount) {
            return Err(CafeError::AmountMismatch {
                expected: round_money(order.total_amount),
                received: round_money(amount_php),
            });
        }

        let now = Utc::now();
        let transaction_id = unit
            .insert_transaction(NewPaymentTransaction {
                order_id: order.id,
                currency_id: currency.id,
                payment_method: method,
                amount_paid: request.amount_paid,
                exchange_rate: currency.rate,
                status: TransactionStatus::Completed,
                branch_id: order.branch_id,
                transaction_date: now,
            })
            .await?;

        let mut order_status = order.status;
        if order.status == OrderStatus::Pending {
            order_status = OrderStatus::Confirmed;
            unit.update_order_status(order.id, order_status).await?;
            unit.append_history(NewHistoryEntry {
                order_id: order.id,
                employee_id,
                status: order_status,
                timestamp: now,
                remarks: PAYMENT_RECEIVED_REMARKS.to_string(),
            })
            .await?;
        }

        Ok(PaymentReceipt {
            transaction_id,
            order_id: order.id,
            amount_paid: round_money(request.amount_paid),
            amount_php: round_money(amount_php),
            exchange_rate: round_to(currency.rate, 4),
            payment_method: method,
            status: TransactionStatus::Completed,
            order_status,
        })
    }
}
