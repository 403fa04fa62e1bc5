use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, EmployeeRole, ExtraId, HistoryId,
    LoyaltyId, MenuId, OrderId, OrderItemId, OrderStatus, TransactionId, TransactionStatus,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Branch, Currency, Customer, DatastoreError, DrinkOption, Employee, Extra, ExtraLine,
    HistoryEntry, HistoryLine, LoyaltyCard, MenuItem, NewHistoryEntry, NewLoyaltyCard, NewOrder,
    NewOrderItem, NewPaymentTransaction, Order, OrderDetails, OrderItem, OrderItemExtra, OrderLine,
    OrderSummary, PaymentTransaction, Result, TransactionLine,
    store::{Datastore, OrderScope, UnitOfWork},
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A write step that can be made to fail on purpose in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertOrder,
    InsertOrderItem,
    InsertOrderItemExtra,
    AppendHistory,
    UpdateOrderStatus,
    UpdateEarnedPoints,
    UpdateLoyaltyBalance,
    InsertTransaction,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    employees: BTreeMap<EmployeeId, Employee>,
    branches: BTreeMap<BranchId, Branch>,
    currencies: BTreeMap<CurrencyId, Currency>,
    menu_items: BTreeMap<MenuId, MenuItem>,
    drink_options: BTreeMap<DrinkOptionId, DrinkOption>,
    extras: BTreeMap<ExtraId, Extra>,
    loyalty_cards: BTreeMap<LoyaltyId, LoyaltyCard>,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    order_item_extras: Vec<(OrderItemId, OrderItemExtra)>,
    history: Vec<HistoryEntry>,
    transactions: Vec<PaymentTransaction>,
    last_key: i64,
}

impl Tables {
    fn next_key(&mut self) -> i64 {
        self.last_key += 1;
        self.last_key
    }

    fn active_card(&self, customer_id: CustomerId) -> Option<&LoyaltyCard> {
        self.loyalty_cards
            .values()
            .find(|card| card.customer_id == customer_id && card.is_active)
    }

    fn order_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.orders
            .get_mut(&order_id)
            .ok_or_else(|| DatastoreError::Unavailable(format!("order {order_id} does not exist")))
    }

    fn details(&self, order_id: OrderId) -> Option<OrderDetails> {
        let order = self.orders.get(&order_id)?.clone();

        let items = self
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .map(|item| {
                let menu = self.menu_items.get(&item.menu_id);
                let extras = self
                    .order_item_extras
                    .iter()
                    .filter(|(item_id, _)| *item_id == item.id)
                    .map(|(_, extra)| {
                        let catalog = self.extras.get(&extra.extra_id);
                        ExtraLine {
                            extra_id: extra.extra_id,
                            name: catalog.map(|e| e.name.clone()),
                            price: catalog.map(|e| e.price),
                            quantity: extra.quantity,
                        }
                    })
                    .collect();
                OrderLine {
                    item: item.clone(),
                    menu_name: menu.map(|m| m.name.clone()),
                    description: menu.and_then(|m| m.description.clone()),
                    temperature: item
                        .drink_option_id
                        .and_then(|id| self.drink_options.get(&id))
                        .map(|o| o.temperature.clone()),
                    extras,
                }
            })
            .collect();

        let mut history: Vec<HistoryLine> = self
            .history
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| {
                let employee = entry.employee_id.and_then(|id| self.employees.get(&id));
                HistoryLine {
                    entry: entry.clone(),
                    employee_name: employee.map(|e| e.name.clone()),
                    employee_role: employee.map(|e| e.role),
                }
            })
            .collect();
        history.sort_by(|a, b| {
            a.entry
                .timestamp
                .cmp(&b.entry.timestamp)
                .then(a.entry.id.cmp(&b.entry.id))
        });

        let payments: Vec<&PaymentTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .collect();
        let transaction = payments
            .iter()
            .find(|t| t.status == TransactionStatus::Completed)
            .or(payments.last())
            .map(|t| {
                let currency = self.currencies.get(&t.currency_id);
                TransactionLine {
                    transaction: (*t).clone(),
                    currency_code: currency.map(|c| c.code.clone()).unwrap_or_default(),
                    currency_symbol: currency.map(|c| c.symbol.clone()).unwrap_or_default(),
                }
            });

        Some(OrderDetails {
            customer: self.customers.get(&order.customer_id).cloned(),
            branch: self.branches.get(&order.branch_id).cloned(),
            loyalty_card: order
                .loyalty_id
                .and_then(|id| self.loyalty_cards.get(&id))
                .cloned(),
            order,
            items,
            history,
            transaction,
        })
    }
}

/// In-memory datastore for tests and local development.
///
/// A unit of work holds the whole store exclusively and writes to a staged
/// copy; commit swaps the copy in, anything else discards it. This is
/// stricter than row locking but gives the same guarantees to callers.
#[derive(Clone)]
pub struct MemoryDatastore {
    tables: Arc<Mutex<Tables>>,
    fail_points: Arc<std::sync::Mutex<HashSet<FailPoint>>>,
    lock_timeout: Duration,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self {
            tables: Arc::default(),
            fail_points: Arc::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl MemoryDatastore {
    /// Creates a new empty in-memory datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long `begin` waits for a running unit of work.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Makes the given write step fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        self.fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Clears every configured failure.
    pub fn clear_fail_points(&self) {
        self.fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.tables
            .lock()
            .await
            .customers
            .insert(customer.id, customer);
    }

    pub async fn insert_employee(&self, employee: Employee) {
        self.tables
            .lock()
            .await
            .employees
            .insert(employee.id, employee);
    }

    pub async fn insert_branch(&self, branch: Branch) {
        self.tables.lock().await.branches.insert(branch.id, branch);
    }

    pub async fn insert_currency(&self, currency: Currency) {
        self.tables
            .lock()
            .await
            .currencies
            .insert(currency.id, currency);
    }

    pub async fn insert_menu_item(&self, item: MenuItem) {
        self.tables.lock().await.menu_items.insert(item.id, item);
    }

    pub async fn insert_drink_option(&self, option: DrinkOption) {
        self.tables
            .lock()
            .await
            .drink_options
            .insert(option.id, option);
    }

    pub async fn insert_extra(&self, extra: Extra) {
        self.tables.lock().await.extras.insert(extra.id, extra);
    }

    /// Returns a committed loyalty card by id.
    pub async fn loyalty_card(&self, loyalty_id: LoyaltyId) -> Option<LoyaltyCard> {
        self.tables
            .lock()
            .await
            .loyalty_cards
            .get(&loyalty_id)
            .cloned()
    }

    /// Returns a committed order by id.
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.tables.lock().await.orders.get(&order_id).cloned()
    }

    /// Returns the committed order items of an order.
    pub async fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.tables
            .lock()
            .await
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Returns the committed history of an order in append order.
    pub async fn history(&self, order_id: OrderId) -> Vec<HistoryEntry> {
        self.tables
            .lock()
            .await
            .history
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Returns every committed payment of an order.
    pub async fn transactions(&self, order_id: OrderId) -> Vec<PaymentTransaction> {
        self.tables
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Seeds a small catalog for running the server without PostgreSQL.
    pub async fn seed_demo(&self) {
        let mut tables = self.tables.lock().await;

        tables.branches.insert(
            BranchId::new(1),
            Branch {
                id: BranchId::new(1),
                name: "Main Branch".to_string(),
                address: Some("Taft Avenue, Manila".to_string()),
                manager_id: Some(EmployeeId::new(2)),
            },
        );
        for (id, name, role) in [
            (1, "Admin User", EmployeeRole::Admin),
            (2, "Branch Manager", EmployeeRole::Manager),
            (3, "Barista", EmployeeRole::Staff),
        ] {
            tables.employees.insert(
                EmployeeId::new(id),
                Employee {
                    id: EmployeeId::new(id),
                    name: name.to_string(),
                    role,
                    branch_id: Some(BranchId::new(1)),
                },
            );
        }
        tables.customers.insert(
            CustomerId::new(1),
            Customer {
                id: CustomerId::new(1),
                name: "Demo Customer".to_string(),
                email: "customer@example.com".to_string(),
                phone_num: None,
            },
        );
        for (id, code, name, symbol, rate) in [
            (1, "PHP", "Philippine Peso", "₱", Decimal::ONE),
            (2, "USD", "US Dollar", "$", Decimal::new(18, 3)),
            (3, "KRW", "Korean Won", "₩", Decimal::new(2350, 2)),
        ] {
            tables.currencies.insert(
                CurrencyId::new(id),
                Currency {
                    id: CurrencyId::new(id),
                    code: code.to_string(),
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    rate,
                },
            );
        }
        for (id, name, price) in [
            (1, "Americano", 120),
            (2, "Cafe Latte", 150),
            (3, "Butter Croissant", 95),
        ] {
            tables.menu_items.insert(
                MenuId::new(id),
                MenuItem {
                    id: MenuId::new(id),
                    name: name.to_string(),
                    description: None,
                    price: Decimal::from(price),
                    is_available: true,
                },
            );
        }
        for (id, menu_id, temperature, modifier) in
            [(1, 1, "hot", 0), (2, 1, "iced", 15), (3, 2, "hot", 0), (4, 2, "iced", 20)]
        {
            tables.drink_options.insert(
                DrinkOptionId::new(id),
                DrinkOption {
                    id: DrinkOptionId::new(id),
                    menu_id: MenuId::new(menu_id),
                    temperature: temperature.to_string(),
                    price_modifier: Decimal::from(modifier),
                },
            );
        }
        for (id, name, price) in [(1, "Extra Shot", 30), (2, "Oat Milk", 25)] {
            tables.extras.insert(
                ExtraId::new(id),
                Extra {
                    id: ExtraId::new(id),
                    name: name.to_string(),
                    price: Decimal::from(price),
                },
            );
        }
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit> {
        let guard = tokio::time::timeout(self.lock_timeout, self.tables.clone().lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    lock_timeout_ms = self.lock_timeout.as_millis() as u64,
                    "timed out waiting for the in-memory store lock"
                );
                DatastoreError::LockTimeout
            })?;
        let staged = guard.clone();
        Ok(MemoryUnit {
            guard,
            staged,
            fail_points: self.fail_points.clone(),
        })
    }

    async fn order_details(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        Ok(self.tables.lock().await.details(order_id))
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderSummary>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<OrderSummary> = tables
            .orders
            .values()
            .filter(|order| match scope {
                OrderScope::Customer(id) => order.customer_id == id,
                OrderScope::Branch(id) => order.branch_id == id,
                OrderScope::All => true,
            })
            .map(|order| OrderSummary {
                id: order.id,
                order_date: order.order_date,
                total_amount: order.total_amount,
                status: order.status,
                earned_points: order.earned_points,
                customer_name: tables
                    .customers
                    .get(&order.customer_id)
                    .map(|c| c.name.clone()),
                branch_name: tables.branches.get(&order.branch_id).map(|b| b.name.clone()),
            })
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn active_loyalty_card(&self, customer_id: CustomerId) -> Result<Option<LoyaltyCard>> {
        Ok(self.tables.lock().await.active_card(customer_id).cloned())
    }

    async fn currency(&self, currency_id: CurrencyId) -> Result<Option<Currency>> {
        Ok(self.tables.lock().await.currencies.get(&currency_id).cloned())
    }

    async fn currencies(&self) -> Result<Vec<Currency>> {
        let mut currencies: Vec<Currency> =
            self.tables.lock().await.currencies.values().cloned().collect();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }
}

/// Unit of work over [`MemoryDatastore`].
pub struct MemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail_points: Arc<std::sync::Mutex<HashSet<FailPoint>>>,
}

impl MemoryUnit {
    fn check(&self, point: FailPoint) -> Result<()> {
        let armed = self
            .fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&point);
        if armed {
            return Err(DatastoreError::Unavailable(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn branch(&mut self, branch_id: BranchId) -> Result<Option<Branch>> {
        Ok(self.staged.branches.get(&branch_id).cloned())
    }

    async fn menu_item(&mut self, menu_id: MenuId) -> Result<Option<MenuItem>> {
        Ok(self.staged.menu_items.get(&menu_id).cloned())
    }

    async fn drink_option(&mut self, option_id: DrinkOptionId) -> Result<Option<DrinkOption>> {
        Ok(self.staged.drink_options.get(&option_id).cloned())
    }

    async fn extra(&mut self, extra_id: ExtraId) -> Result<Option<Extra>> {
        Ok(self.staged.extras.get(&extra_id).cloned())
    }

    async fn currency(&mut self, currency_id: CurrencyId) -> Result<Option<Currency>> {
        Ok(self.staged.currencies.get(&currency_id).cloned())
    }

    async fn find_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>> {
        Ok(self.staged.active_card(customer_id).cloned())
    }

    async fn lock_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>> {
        // The unit already holds the whole store.
        Ok(self.staged.active_card(customer_id).cloned())
    }

    async fn lock_loyalty_card(&mut self, loyalty_id: LoyaltyId) -> Result<Option<LoyaltyCard>> {
        Ok(self.staged.loyalty_cards.get(&loyalty_id).cloned())
    }

    async fn update_loyalty_balance(
        &mut self,
        loyalty_id: LoyaltyId,
        points: i64,
        last_redeemed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.check(FailPoint::UpdateLoyaltyBalance)?;
        if points < 0 {
            return Err(DatastoreError::Unavailable(format!(
                "points for card {loyalty_id} would become negative"
            )));
        }
        let card = self
            .staged
            .loyalty_cards
            .get_mut(&loyalty_id)
            .ok_or_else(|| {
                DatastoreError::Unavailable(format!("loyalty card {loyalty_id} does not exist"))
            })?;
        card.points = points;
        card.last_redeemed = last_redeemed;
        Ok(())
    }

    async fn insert_loyalty_card(&mut self, card: NewLoyaltyCard) -> Result<LoyaltyCard> {
        if self.staged.active_card(card.customer_id).is_some() {
            return Err(DatastoreError::UniqueViolation {
                constraint: "loyalty_cards_one_active_per_customer".to_string(),
            });
        }
        let id = LoyaltyId::new(self.staged.next_key());
        let card = LoyaltyCard {
            id,
            customer_id: card.customer_id,
            card_number: card.card_number,
            points: 0,
            is_active: true,
            last_redeemed: None,
            created_at: card.created_at,
        };
        self.staged.loyalty_cards.insert(id, card.clone());
        Ok(card)
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&order_id).cloned())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        self.check(FailPoint::InsertOrder)?;
        let id = OrderId::new(self.staged.next_key());
        self.staged.orders.insert(
            id,
            Order {
                id,
                customer_id: order.customer_id,
                loyalty_id: order.loyalty_id,
                branch_id: order.branch_id,
                total_amount: order.total_amount,
                status: OrderStatus::Pending,
                earned_points: 0,
                order_date: order.order_date,
            },
        );
        Ok(id)
    }

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItemId> {
        self.check(FailPoint::InsertOrderItem)?;
        let id = OrderItemId::new(self.staged.next_key());
        self.staged.order_items.push(OrderItem {
            id,
            order_id,
            menu_id: item.menu_id,
            drink_option_id: item.drink_option_id,
            quantity: item.quantity,
            price: item.price,
        });
        Ok(id)
    }

    async fn insert_order_item_extra(
        &mut self,
        item_id: OrderItemId,
        extra: &OrderItemExtra,
    ) -> Result<()> {
        self.check(FailPoint::InsertOrderItemExtra)?;
        self.staged.order_item_extras.push((item_id, *extra));
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        self.check(FailPoint::UpdateOrderStatus)?;
        self.staged.order_mut(order_id)?.status = status;
        Ok(())
    }

    async fn update_earned_points(&mut self, order_id: OrderId, points: i64) -> Result<()> {
        self.check(FailPoint::UpdateEarnedPoints)?;
        self.staged.order_mut(order_id)?.earned_points = points;
        Ok(())
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<HistoryId> {
        self.check(FailPoint::AppendHistory)?;
        let id = HistoryId::new(self.staged.next_key());
        self.staged.history.push(HistoryEntry {
            id,
            order_id: entry.order_id,
            employee_id: entry.employee_id,
            status: entry.status,
            timestamp: entry.timestamp,
            remarks: entry.remarks,
        });
        Ok(id)
    }

    async fn find_completed_transaction(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<TransactionId>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .find(|t| t.order_id == order_id && t.status == TransactionStatus::Completed)
            .map(|t| t.id))
    }

    async fn insert_transaction(
        &mut self,
        transaction: NewPaymentTransaction,
    ) -> Result<TransactionId> {
        self.check(FailPoint::InsertTransaction)?;
        if transaction.status == TransactionStatus::Completed
            && self
                .find_completed_transaction(transaction.order_id)
                .await?
                .is_some()
        {
            return Err(DatastoreError::UniqueViolation {
                constraint: "transactions_one_completed_per_order".to_string(),
            });
        }
        let id = TransactionId::new(self.staged.next_key());
        self.staged.transactions.push(PaymentTransaction {
            id,
            order_id: transaction.order_id,
            currency_id: transaction.currency_id,
            payment_method: transaction.payment_method,
            amount_paid: transaction.amount_paid,
            exchange_rate: transaction.exchange_rate,
            status: transaction.status,
            branch_id: transaction.branch_id,
            transaction_date: transaction.transaction_date,
        });
        Ok(id)
    }

    async fn commit(self) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let MemoryUnit {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(customer: i64) -> NewOrder {
        NewOrder {
            customer_id: CustomerId::new(customer),
            loyalty_id: None,
            branch_id: BranchId::new(1),
            total_amount: Decimal::from(300),
            order_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryDatastore::new();
        let mut unit = store.begin().await.unwrap();
        let order_id = unit.insert_order(new_order(1)).await.unwrap();
        unit.commit().await.unwrap();

        let order = store.order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.earned_points, 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryDatastore::new();
        let mut unit = store.begin().await.unwrap();
        unit.insert_order(new_order(1)).await.unwrap();
        unit.rollback().await.unwrap();

        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_writes() {
        let store = MemoryDatastore::new();
        {
            let mut unit = store.begin().await.unwrap();
            unit.insert_order(new_order(1)).await.unwrap();
        }
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_begin_times_out_while_another_unit_is_open() {
        let store = MemoryDatastore::new().with_lock_timeout(Duration::from_millis(20));
        let _held = store.begin().await.unwrap();

        let err = store.begin().await.err().unwrap();
        assert!(matches!(err, DatastoreError::LockTimeout));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fail_point_rejects_write() {
        let store = MemoryDatastore::new();
        store.fail_on(FailPoint::InsertOrder);

        let mut unit = store.begin().await.unwrap();
        let err = unit.insert_order(new_order(1)).await.unwrap_err();
        assert!(matches!(err, DatastoreError::Unavailable(_)));

        store.clear_fail_points();
        assert!(unit.insert_order(new_order(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_completed_transaction_is_rejected() {
        let store = MemoryDatastore::new();
        let mut unit = store.begin().await.unwrap();
        let order_id = unit.insert_order(new_order(1)).await.unwrap();
        let payment = NewPaymentTransaction {
            order_id,
            currency_id: CurrencyId::new(1),
            payment_method: common::PaymentMethod::Cash,
            amount_paid: Decimal::from(300),
            exchange_rate: Decimal::ONE,
            status: TransactionStatus::Completed,
            branch_id: BranchId::new(1),
            transaction_date: Utc::now(),
        };
        unit.insert_transaction(payment.clone()).await.unwrap();

        let err = unit.insert_transaction(payment).await.unwrap_err();
        assert_eq!(
            err.violated_constraint(),
            Some("transactions_one_completed_per_order")
        );
    }

    #[tokio::test]
    async fn test_only_one_active_card_per_customer() {
        let store = MemoryDatastore::new();
        let mut unit = store.begin().await.unwrap();
        let card = NewLoyaltyCard {
            customer_id: CustomerId::new(5),
            card_number: "LC-000005".to_string(),
            created_at: Utc::now(),
        };
        let created = unit.insert_loyalty_card(card.clone()).await.unwrap();
        assert_eq!(created.points, 0);
        assert!(created.is_active);

        let err = unit.insert_loyalty_card(card).await.unwrap_err();
        assert!(err.violated_constraint().is_some());
    }

    #[tokio::test]
    async fn test_list_orders_respects_scope_and_newest_first() {
        let store = MemoryDatastore::new();
        let mut unit = store.begin().await.unwrap();
        let first = unit.insert_order(new_order(1)).await.unwrap();
        let second = unit.insert_order(new_order(1)).await.unwrap();
        unit.insert_order(new_order(2)).await.unwrap();
        unit.commit().await.unwrap();

        let mine = store
            .list_orders(OrderScope::Customer(CustomerId::new(1)))
            .await
            .unwrap();
        let ids: Vec<OrderId> = mine.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second, first]);

        let all = store.list_orders(OrderScope::All).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
