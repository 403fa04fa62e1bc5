use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, ExtraId, HistoryId, LoyaltyId, MenuId,
    OrderId, OrderItemId, OrderStatus, TransactionId,
};

use crate::{
    Branch, Currency, DrinkOption, Extra, LoyaltyCard, MenuItem, NewHistoryEntry, NewLoyaltyCard,
    NewOrder, NewOrderItem, NewPaymentTransaction, Order, OrderDetails, OrderItemExtra,
    OrderSummary, Result,
};

/// Which orders a listing may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders placed by one customer.
    Customer(CustomerId),
    /// Orders placed at one branch.
    Branch(BranchId),
    /// Every order.
    All,
}

/// Core trait for datastore implementations.
///
/// Mutations only happen through a [`UnitOfWork`] obtained from [`begin`].
/// The remaining methods are committed-state reads for presentation.
///
/// [`begin`]: Datastore::begin
#[async_trait]
pub trait Datastore: Send + Sync {
    /// The unit of work type handed out by [`Datastore::begin`].
    type Unit: UnitOfWork;

    /// Opens a new unit of work.
    ///
    /// Fails with `LockTimeout` if the datastore cannot start one in time.
    async fn begin(&self) -> Result<Self::Unit>;

    /// Loads an order with customer, branch, card, items, history and payment.
    async fn order_details(&self, order_id: OrderId) -> Result<Option<OrderDetails>>;

    /// Lists orders newest first.
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderSummary>>;

    /// Returns the customer's active loyalty card.
    async fn active_loyalty_card(&self, customer_id: CustomerId) -> Result<Option<LoyaltyCard>>;

    async fn currency(&self, currency_id: CurrencyId) -> Result<Option<Currency>>;

    /// Lists currencies ordered by code.
    async fn currencies(&self) -> Result<Vec<Currency>>;
}

/// A scoped, all-or-nothing unit of work.
///
/// `lock_*` reads hold the row until the unit ends, so a read-compute-write
/// on the same row from another unit waits for this one to commit or roll
/// back. Dropping the unit without calling [`commit`] rolls it back.
///
/// [`commit`]: UnitOfWork::commit
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    async fn branch(&mut self, branch_id: BranchId) -> Result<Option<Branch>>;

    async fn menu_item(&mut self, menu_id: MenuId) -> Result<Option<MenuItem>>;

    async fn drink_option(&mut self, option_id: DrinkOptionId) -> Result<Option<DrinkOption>>;

    async fn extra(&mut self, extra_id: ExtraId) -> Result<Option<Extra>>;

    async fn currency(&mut self, currency_id: CurrencyId) -> Result<Option<Currency>>;

    /// Reads the customer's active card without locking it.
    async fn find_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>>;

    /// Reads and locks the customer's active card.
    async fn lock_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>>;

    /// Reads and locks a card by id.
    async fn lock_loyalty_card(&mut self, loyalty_id: LoyaltyId) -> Result<Option<LoyaltyCard>>;

    /// Overwrites a card's balance and redemption stamp.
    async fn update_loyalty_balance(
        &mut self,
        loyalty_id: LoyaltyId,
        points: i64,
        last_redeemed: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn insert_loyalty_card(&mut self, card: NewLoyaltyCard) -> Result<LoyaltyCard>;

    /// Reads and locks an order row.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Inserts an order in `pending` with zero earned points.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId>;

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItemId>;

    async fn insert_order_item_extra(
        &mut self,
        item_id: OrderItemId,
        extra: &OrderItemExtra,
    ) -> Result<()>;

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    async fn update_earned_points(&mut self, order_id: OrderId, points: i64) -> Result<()>;

    /// Appends an audit row. History rows are never updated or deleted.
    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<HistoryId>;

    /// Returns the completed payment for an order, if one exists.
    async fn find_completed_transaction(&mut self, order_id: OrderId)
    -> Result<Option<TransactionId>>;

    async fn insert_transaction(&mut self, transaction: NewPaymentTransaction)
    -> Result<TransactionId>;

    /// Makes every write of this unit visible and releases its locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this unit and releases its locks.
    async fn rollback(self) -> Result<()>;
}
