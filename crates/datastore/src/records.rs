//! Rows read from and written to the datastore.
//!
//! `New*` structs are insert payloads; the datastore assigns their keys.

use chrono::{DateTime, Utc};
use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, EmployeeRole, ExtraId, HistoryId,
    LoyaltyId, MenuId, OrderId, OrderItemId, OrderStatus, PaymentMethod, TransactionId,
    TransactionStatus,
};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone_num: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub role: EmployeeRole,
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub address: Option<String>,
    pub manager_id: Option<EmployeeId>,
}

/// A currency and its multiplier relative to the base currency (PHP).
#[derive(Debug, Clone, PartialEq)]
pub struct Currency {
    pub id: CurrencyId,
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub id: MenuId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrinkOption {
    pub id: DrinkOptionId,
    pub menu_id: MenuId,
    pub temperature: String,
    pub price_modifier: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extra {
    pub id: ExtraId,
    pub name: String,
    pub price: Decimal,
}

/// A customer's point-accumulation account.
#[derive(Debug, Clone, PartialEq)]
pub struct LoyaltyCard {
    pub id: LoyaltyId,
    pub customer_id: CustomerId,
    pub card_number: String,
    pub points: i64,
    pub is_active: bool,
    pub last_redeemed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoyaltyCard {
    pub customer_id: CustomerId,
    pub card_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    /// Card in force when the order was placed; never re-resolved.
    pub loyalty_id: Option<LoyaltyId>,
    pub branch_id: BranchId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub earned_points: i64,
    pub order_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub loyalty_id: Option<LoyaltyId>,
    pub branch_id: BranchId,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub menu_id: MenuId,
    pub drink_option_id: Option<DrinkOptionId>,
    pub quantity: i32,
    /// Unit price captured at order time.
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub menu_id: MenuId,
    pub drink_option_id: Option<DrinkOptionId>,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItemExtra {
    pub extra_id: ExtraId,
    pub quantity: i32,
}

/// One append-only audit row for an order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub order_id: OrderId,
    /// `None` for customer or system actions.
    pub employee_id: Option<EmployeeId>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub order_id: OrderId,
    pub employee_id: Option<EmployeeId>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub remarks: String,
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub currency_id: CurrencyId,
    pub payment_method: PaymentMethod,
    /// Amount in the transaction currency.
    pub amount_paid: Decimal,
    /// Rate in force at payment time.
    pub exchange_rate: Decimal,
    pub status: TransactionStatus,
    pub branch_id: BranchId,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentTransaction {
    pub order_id: OrderId,
    pub currency_id: CurrencyId,
    pub payment_method: PaymentMethod,
    pub amount_paid: Decimal,
    pub exchange_rate: Decimal,
    pub status: TransactionStatus,
    pub branch_id: BranchId,
    pub transaction_date: DateTime<Utc>,
}

// -- Read models --

/// An order with everything needed to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub customer: Option<Customer>,
    pub branch: Option<Branch>,
    pub loyalty_card: Option<LoyaltyCard>,
    pub items: Vec<OrderLine>,
    pub history: Vec<HistoryLine>,
    pub transaction: Option<TransactionLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub item: OrderItem,
    pub menu_name: Option<String>,
    pub description: Option<String>,
    pub temperature: Option<String>,
    pub extras: Vec<ExtraLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraLine {
    pub extra_id: ExtraId,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLine {
    pub entry: HistoryEntry,
    pub employee_name: Option<String>,
    pub employee_role: Option<EmployeeRole>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub transaction: PaymentTransaction,
    pub currency_code: String,
    pub currency_symbol: String,
}

/// A row of an order listing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub earned_points: i64,
    pub customer_name: Option<String>,
    pub branch_name: Option<String>,
}
