use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BranchId, CurrencyId, CustomerId, DrinkOptionId, EmployeeId, EmployeeRole, ExtraId, HistoryId,
    LoyaltyId, MenuId, OrderId, OrderItemId, OrderStatus, ParseStatusError, TransactionId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use crate::{
    Branch, Currency, Customer, DatastoreError, DrinkOption, Extra, ExtraLine, HistoryEntry,
    HistoryLine, LoyaltyCard, MenuItem, NewHistoryEntry, NewLoyaltyCard, NewOrder, NewOrderItem,
    NewPaymentTransaction, Order, OrderDetails, OrderItem, OrderItemExtra, OrderLine,
    OrderSummary, PaymentTransaction, Result, TransactionLine,
    store::{Datastore, OrderScope, UnitOfWork},
};

const LOYALTY_COLUMNS: &str =
    "loyalty_id, customer_id, card_number, points, is_active, last_redeemed, created_at";
const ORDER_COLUMNS: &str =
    "order_id, customer_id, loyalty_id, branch_id, total_amount, status, earned_points, order_date";
const CURRENCY_COLUMNS: &str = "currency_id, code, name, symbol, rate";
const SUMMARY_SELECT: &str = r#"
    SELECT o.order_id, o.order_date, o.total_amount, o.status, o.earned_points,
           c.name AS customer_name, b.name AS branch_name
    FROM orders o
    LEFT JOIN customers c ON o.customer_id = c.customer_id
    LEFT JOIN branches b ON o.branch_id = b.branch_id
"#;

fn parse<T>(value: String) -> Result<T>
where
    T: FromStr<Err = ParseStatusError>,
{
    value
        .parse()
        .map_err(|e: ParseStatusError| DatastoreError::Decode(e.to_string()))
}

fn row_to_loyalty_card(row: &PgRow) -> Result<LoyaltyCard> {
    Ok(LoyaltyCard {
        id: LoyaltyId::new(row.try_get("loyalty_id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        card_number: row.try_get("card_number")?,
        points: row.try_get("points")?,
        is_active: row.try_get("is_active")?,
        last_redeemed: row.try_get("last_redeemed")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("order_id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        loyalty_id: row
            .try_get::<Option<i64>, _>("loyalty_id")?
            .map(LoyaltyId::new),
        branch_id: BranchId::new(row.try_get("branch_id")?),
        total_amount: row.try_get("total_amount")?,
        status: parse(row.try_get("status")?)?,
        earned_points: row.try_get("earned_points")?,
        order_date: row.try_get("order_date")?,
    })
}

fn row_to_currency(row: &PgRow) -> Result<Currency> {
    Ok(Currency {
        id: CurrencyId::new(row.try_get("currency_id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        symbol: row.try_get("symbol")?,
        rate: row.try_get("rate")?,
    })
}

fn row_to_summary(row: &PgRow) -> Result<OrderSummary> {
    Ok(OrderSummary {
        id: OrderId::new(row.try_get("order_id")?),
        order_date: row.try_get("order_date")?,
        total_amount: row.try_get("total_amount")?,
        status: parse(row.try_get("status")?)?,
        earned_points: row.try_get("earned_points")?,
        customer_name: row.try_get("customer_name")?,
        branch_name: row.try_get("branch_name")?,
    })
}

/// PostgreSQL-backed datastore implementation.
#[derive(Clone)]
pub struct PostgresDatastore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresDatastore {
    /// Creates a new PostgreSQL datastore over an existing pool.
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Connects a pool to `url` and wraps it.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!(
            max_connections,
            lock_timeout_ms = lock_timeout.as_millis() as u64,
            "connected to PostgreSQL"
        );
        Ok(Self::new(pool, lock_timeout))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    async fn order_lines(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let extra_rows = sqlx::query(
            r#"
            SELECT oie.order_item_id, oie.extra_id, oie.quantity, e.name, e.price
            FROM order_item_extras oie
            INNER JOIN order_items oi ON oie.order_item_id = oi.order_item_id
            LEFT JOIN extras e ON oie.extra_id = e.extra_id
            WHERE oi.order_id = $1
            ORDER BY oie.order_item_extra_id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut *conn)
        .await?;

        let mut extras: HashMap<OrderItemId, Vec<ExtraLine>> = HashMap::new();
        for row in &extra_rows {
            extras
                .entry(OrderItemId::new(row.try_get("order_item_id")?))
                .or_default()
                .push(ExtraLine {
                    extra_id: ExtraId::new(row.try_get("extra_id")?),
                    name: row.try_get("name")?,
                    price: row.try_get("price")?,
                    quantity: row.try_get("quantity")?,
                });
        }

        let item_rows = sqlx::query(
            r#"
            SELECT oi.order_item_id, oi.order_id, oi.menu_id, oi.drink_option_id, oi.quantity,
                   oi.price, m.name AS menu_name, m.description, d.temperature
            FROM order_items oi
            LEFT JOIN menu_items m ON oi.menu_id = m.menu_id
            LEFT JOIN drink_options d ON oi.drink_option_id = d.drink_option_id
            WHERE oi.order_id = $1
            ORDER BY oi.order_item_id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut *conn)
        .await?;

        item_rows
            .iter()
            .map(|row| -> Result<OrderLine> {
                let item = OrderItem {
                    id: OrderItemId::new(row.try_get("order_item_id")?),
                    order_id: OrderId::new(row.try_get("order_id")?),
                    menu_id: MenuId::new(row.try_get("menu_id")?),
                    drink_option_id: row
                        .try_get::<Option<i64>, _>("drink_option_id")?
                        .map(DrinkOptionId::new),
                    quantity: row.try_get("quantity")?,
                    price: row.try_get("price")?,
                };
                Ok(OrderLine {
                    extras: extras.remove(&item.id).unwrap_or_default(),
                    item,
                    menu_name: row.try_get("menu_name")?,
                    description: row.try_get("description")?,
                    temperature: row.try_get("temperature")?,
                })
            })
            .collect()
    }

    async fn history_lines(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Vec<HistoryLine>> {
        let rows = sqlx::query(
            r#"
            SELECT h.history_id, h.order_id, h.employee_id, h.status, h."timestamp", h.remarks,
                   e.name AS employee_name, e.role AS employee_role
            FROM order_history h
            LEFT JOIN employees e ON h.employee_id = e.employee_id
            WHERE h.order_id = $1
            ORDER BY h."timestamp" ASC, h.history_id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<HistoryLine> {
                let employee_role = row
                    .try_get::<Option<String>, _>("employee_role")?
                    .map(parse::<EmployeeRole>)
                    .transpose()?;
                Ok(HistoryLine {
                    entry: HistoryEntry {
                        id: HistoryId::new(row.try_get("history_id")?),
                        order_id: OrderId::new(row.try_get("order_id")?),
                        employee_id: row
                            .try_get::<Option<i64>, _>("employee_id")?
                            .map(EmployeeId::new),
                        status: parse(row.try_get("status")?)?,
                        timestamp: row.try_get("timestamp")?,
                        remarks: row.try_get("remarks")?,
                    },
                    employee_name: row.try_get("employee_name")?,
                    employee_role,
                })
            })
            .collect()
    }

    async fn transaction_line(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Option<TransactionLine>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT t.transaction_id, t.order_id, t.currency_id, t.payment_method, t.amount_paid,
                   t.exchange_rate, t.status, t.branch_id, t.transaction_date,
                   cur.code AS currency_code, cur.symbol AS currency_symbol
            FROM transactions t
            INNER JOIN currencies cur ON t.currency_id = cur.currency_id
            WHERE t.order_id = $1
            ORDER BY (t.status = 'completed') DESC, t.transaction_id DESC
            LIMIT 1
            "#,
        )
        .bind(order_id.get())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|row| -> Result<TransactionLine> {
            Ok(TransactionLine {
                transaction: PaymentTransaction {
                    id: TransactionId::new(row.try_get("transaction_id")?),
                    order_id: OrderId::new(row.try_get("order_id")?),
                    currency_id: CurrencyId::new(row.try_get("currency_id")?),
                    payment_method: parse(row.try_get("payment_method")?)?,
                    amount_paid: row.try_get("amount_paid")?,
                    exchange_rate: row.try_get("exchange_rate")?,
                    status: parse(row.try_get("status")?)?,
                    branch_id: BranchId::new(row.try_get("branch_id")?),
                    transaction_date: row.try_get("transaction_date")?,
                },
                currency_code: row.try_get("currency_code")?,
                currency_symbol: row.try_get("currency_symbol")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl Datastore for PostgresDatastore {
    type Unit = PostgresUnit;

    async fn begin(&self) -> Result<PostgresUnit> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is a plain integer.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(PostgresUnit { tx })
    }

    async fn order_details(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        // One snapshot for the order row and everything hanging off it.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT o.order_id, o.customer_id, o.loyalty_id, o.branch_id, o.total_amount,
                   o.status, o.earned_points, o.order_date,
                   c.name AS customer_name, c.email, c.phone_num,
                   b.name AS branch_name, b.address, b.manager_id,
                   l.card_number, l.points, l.is_active, l.last_redeemed,
                   l.created_at AS card_created_at
            FROM orders o
            LEFT JOIN customers c ON o.customer_id = c.customer_id
            LEFT JOIN branches b ON o.branch_id = b.branch_id
            LEFT JOIN loyalty_cards l ON o.loyalty_id = l.loyalty_id
            WHERE o.order_id = $1
            "#,
        )
        .bind(order_id.get())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = row_to_order(&row)?;

        let customer = row
            .try_get::<Option<String>, _>("customer_name")?
            .map(|name| -> Result<Customer> {
                Ok(Customer {
                    id: order.customer_id,
                    name,
                    email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
                    phone_num: row.try_get("phone_num")?,
                })
            })
            .transpose()?;
        let branch = row
            .try_get::<Option<String>, _>("branch_name")?
            .map(|name| -> Result<Branch> {
                Ok(Branch {
                    id: order.branch_id,
                    name,
                    address: row.try_get("address")?,
                    manager_id: row
                        .try_get::<Option<i64>, _>("manager_id")?
                        .map(EmployeeId::new),
                })
            })
            .transpose()?;
        let loyalty_card = match (
            order.loyalty_id,
            row.try_get::<Option<String>, _>("card_number")?,
        ) {
            (Some(id), Some(card_number)) => Some(LoyaltyCard {
                id,
                customer_id: order.customer_id,
                card_number,
                points: row.try_get("points")?,
                is_active: row.try_get("is_active")?,
                last_redeemed: row.try_get("last_redeemed")?,
                created_at: row.try_get("card_created_at")?,
            }),
            _ => None,
        };

        let items = Self::order_lines(&mut tx, order_id).await?;
        let history = Self::history_lines(&mut tx, order_id).await?;
        let transaction = Self::transaction_line(&mut tx, order_id).await?;
        tx.commit().await?;

        Ok(Some(OrderDetails {
            items,
            history,
            transaction,
            order,
            customer,
            branch,
            loyalty_card,
        }))
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderSummary>> {
        const ORDERING: &str = "ORDER BY o.order_date DESC, o.order_id DESC";
        let rows = match scope {
            OrderScope::Customer(id) => {
                let sql = format!("{SUMMARY_SELECT} WHERE o.customer_id = $1 {ORDERING}");
                sqlx::query(&sql)
                    .bind(id.get())
                    .fetch_all(&self.pool)
                    .await?
            }
            OrderScope::Branch(id) => {
                let sql = format!("{SUMMARY_SELECT} WHERE o.branch_id = $1 {ORDERING}");
                sqlx::query(&sql)
                    .bind(id.get())
                    .fetch_all(&self.pool)
                    .await?
            }
            OrderScope::All => {
                let sql = format!("{SUMMARY_SELECT} {ORDERING}");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(row_to_summary).collect()
    }

    async fn active_loyalty_card(&self, customer_id: CustomerId) -> Result<Option<LoyaltyCard>> {
        let sql = format!(
            "SELECT {LOYALTY_COLUMNS} FROM loyalty_cards WHERE customer_id = $1 AND is_active"
        );
        let row = sqlx::query(&sql)
            .bind(customer_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_loyalty_card).transpose()
    }

    async fn currency(&self, currency_id: CurrencyId) -> Result<Option<Currency>> {
        let sql = format!("SELECT {CURRENCY_COLUMNS} FROM currencies WHERE currency_id = $1");
        let row = sqlx::query(&sql)
            .bind(currency_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_currency).transpose()
    }

    async fn currencies(&self) -> Result<Vec<Currency>> {
        let sql = format!("SELECT {CURRENCY_COLUMNS} FROM currencies ORDER BY code ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_currency).collect()
    }
}

/// Unit of work over one PostgreSQL transaction.
///
/// Dropping it without `commit` rolls the transaction back.
pub struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn branch(&mut self, branch_id: BranchId) -> Result<Option<Branch>> {
        let row = sqlx::query(
            "SELECT branch_id, name, address, manager_id FROM branches WHERE branch_id = $1",
        )
        .bind(branch_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<Branch> {
            Ok(Branch {
                id: BranchId::new(row.try_get("branch_id")?),
                name: row.try_get("name")?,
                address: row.try_get("address")?,
                manager_id: row
                    .try_get::<Option<i64>, _>("manager_id")?
                    .map(EmployeeId::new),
            })
        })
        .transpose()
    }

    async fn menu_item(&mut self, menu_id: MenuId) -> Result<Option<MenuItem>> {
        let row = sqlx::query(
            "SELECT menu_id, name, description, price, is_available FROM menu_items WHERE menu_id = $1",
        )
        .bind(menu_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<MenuItem> {
            Ok(MenuItem {
                id: MenuId::new(row.try_get("menu_id")?),
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                price: row.try_get("price")?,
                is_available: row.try_get("is_available")?,
            })
        })
        .transpose()
    }

    async fn drink_option(&mut self, option_id: DrinkOptionId) -> Result<Option<DrinkOption>> {
        let row = sqlx::query(
            r#"
            SELECT drink_option_id, menu_id, temperature, price_modifier
            FROM drink_options
            WHERE drink_option_id = $1
            "#,
        )
        .bind(option_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<DrinkOption> {
            Ok(DrinkOption {
                id: DrinkOptionId::new(row.try_get("drink_option_id")?),
                menu_id: MenuId::new(row.try_get("menu_id")?),
                temperature: row.try_get("temperature")?,
                price_modifier: row.try_get("price_modifier")?,
            })
        })
        .transpose()
    }

    async fn extra(&mut self, extra_id: ExtraId) -> Result<Option<Extra>> {
        let row = sqlx::query("SELECT extra_id, name, price FROM extras WHERE extra_id = $1")
            .bind(extra_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> Result<Extra> {
            Ok(Extra {
                id: ExtraId::new(row.try_get("extra_id")?),
                name: row.try_get("name")?,
                price: row.try_get("price")?,
            })
        })
        .transpose()
    }

    async fn currency(&mut self, currency_id: CurrencyId) -> Result<Option<Currency>> {
        let sql = format!("SELECT {CURRENCY_COLUMNS} FROM currencies WHERE currency_id = $1");
        let row = sqlx::query(&sql)
            .bind(currency_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_currency).transpose()
    }

    async fn find_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>> {
        let sql = format!(
            "SELECT {LOYALTY_COLUMNS} FROM loyalty_cards WHERE customer_id = $1 AND is_active"
        );
        let row = sqlx::query(&sql)
            .bind(customer_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_loyalty_card).transpose()
    }

    async fn lock_active_loyalty_card(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<LoyaltyCard>> {
        let sql = format!(
            "SELECT {LOYALTY_COLUMNS} FROM loyalty_cards WHERE customer_id = $1 AND is_active FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(customer_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_loyalty_card).transpose()
    }

    async fn lock_loyalty_card(&mut self, loyalty_id: LoyaltyId) -> Result<Option<LoyaltyCard>> {
        let sql =
            format!("SELECT {LOYALTY_COLUMNS} FROM loyalty_cards WHERE loyalty_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(loyalty_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_loyalty_card).transpose()
    }

    async fn update_loyalty_balance(
        &mut self,
        loyalty_id: LoyaltyId,
        points: i64,
        last_redeemed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE loyalty_cards SET points = $1, last_redeemed = $2 WHERE loyalty_id = $3",
        )
        .bind(points)
        .bind(last_redeemed)
        .bind(loyalty_id.get())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_loyalty_card(&mut self, card: NewLoyaltyCard) -> Result<LoyaltyCard> {
        let sql = format!(
            r#"
            INSERT INTO loyalty_cards (customer_id, card_number, points, is_active, created_at)
            VALUES ($1, $2, 0, TRUE, $3)
            RETURNING {LOYALTY_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(card.customer_id.get())
            .bind(&card.card_number)
            .bind(card.created_at)
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_loyalty_card(&row)
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (customer_id, loyalty_id, branch_id, total_amount, status, order_date)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING order_id
            "#,
        )
        .bind(order.customer_id.get())
        .bind(order.loyalty_id.map(LoyaltyId::get))
        .bind(order.branch_id.get())
        .bind(order.total_amount)
        .bind(order.order_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(OrderId::new(id))
    }

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItemId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_items (order_id, menu_id, drink_option_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING order_item_id
            "#,
        )
        .bind(order_id.get())
        .bind(item.menu_id.get())
        .bind(item.drink_option_id.map(DrinkOptionId::get))
        .bind(item.quantity)
        .bind(item.price)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(OrderItemId::new(id))
    }

    async fn insert_order_item_extra(
        &mut self,
        item_id: OrderItemId,
        extra: &OrderItemExtra,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_item_extras (order_item_id, extra_id, quantity) VALUES ($1, $2, $3)",
        )
        .bind(item_id.get())
        .bind(extra.extra_id.get())
        .bind(extra.quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $1 WHERE order_id = $2")
            .bind(status.as_str())
            .bind(order_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_earned_points(&mut self, order_id: OrderId, points: i64) -> Result<()> {
        sqlx::query("UPDATE orders SET earned_points = $1 WHERE order_id = $2")
            .bind(points)
            .bind(order_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<HistoryId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_history (order_id, employee_id, status, "timestamp", remarks)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING history_id
            "#,
        )
        .bind(entry.order_id.get())
        .bind(entry.employee_id.map(EmployeeId::get))
        .bind(entry.status.as_str())
        .bind(entry.timestamp)
        .bind(&entry.remarks)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(HistoryId::new(id))
    }

    async fn find_completed_transaction(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<TransactionId>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT transaction_id FROM transactions WHERE order_id = $1 AND status = 'completed'",
        )
        .bind(order_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(id.map(TransactionId::new))
    }

    async fn insert_transaction(
        &mut self,
        transaction: NewPaymentTransaction,
    ) -> Result<TransactionId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions
                (order_id, currency_id, payment_method, amount_paid, exchange_rate, status,
                 branch_id, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING transaction_id
            "#,
        )
        .bind(transaction.order_id.get())
        .bind(transaction.currency_id.get())
        .bind(transaction.payment_method.as_str())
        .bind(transaction.amount_paid)
        .bind(transaction.exchange_rate)
        .bind(transaction.status.as_str())
        .bind(transaction.branch_id.get())
        .bind(transaction.transaction_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(TransactionId::new(id))
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
