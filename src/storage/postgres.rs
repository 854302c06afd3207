//! PostgreSQL storage backend using sqlx.
//!
//! Statements are assembled by [`Statement`] from typed clauses; every value
//! travels as a positional argument.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! order-engine = { version = "0.1", features = ["postgres"] }
//! ```

use crate::accounts::model::{Role, User, UserColumn};
use crate::catalog::model::{Product, ProductColumn};
use crate::config::DatabaseConfig;
use crate::core::error::{StoreError, StoreResult};
use crate::core::field::FieldValue;
use crate::core::predicate::{Assignments, Clause, OrderBy, Statement};
use crate::core::query::{Projection, SortDirection, Window};
use crate::core::service::{OrderStore, ProductStore, UserStore};
use crate::core::transaction::TransactionManager;
use crate::orders::model::{HistoryEntry, InvoiceLine, Order, OrderColumn};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, Row, Transaction};
use std::time::Duration;
use tracing::{debug, info};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Open a connection pool
pub async fn connect(config: &DatabaseConfig) -> StoreResult<PgPool> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to PostgreSQL"
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL DEFAULT 'user',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price DOUBLE PRECISION NOT NULL DEFAULT 0,
        stock BIGINT NOT NULL DEFAULT 0,
        product_url TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'DRAFT',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    // no unique constraint on checksum: duplicates are resolved by lookup only
    r#"CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        reference TEXT NOT NULL,
        paid BOOLEAN NOT NULL DEFAULT FALSE,
        paid_at TIMESTAMPTZ,
        cancelled BOOLEAN NOT NULL DEFAULT FALSE,
        cancelled_at TIMESTAMPTZ,
        failed BOOLEAN NOT NULL DEFAULT FALSE,
        failed_at TIMESTAMPTZ,
        checksum TEXT NOT NULL,
        history JSONB NOT NULL DEFAULT '[]'::jsonb,
        invoice JSONB NOT NULL DEFAULT '[]'::jsonb,
        amount DOUBLE PRECISION NOT NULL DEFAULT 0,
        remark TEXT NOT NULL DEFAULT '',
        product_id TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS orders_checksum_idx ON orders (checksum)",
    "CREATE INDEX IF NOT EXISTS orders_user_updated_idx ON orders (user_id, updated_at DESC)",
];

/// Create the `users`, `products` and `orders` tables if they do not exist
pub async fn ensure_schema(pool: &PgPool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("schema ensured");
    Ok(())
}

/// Bind every argument in placeholder order
fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [FieldValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            FieldValue::String(s) => query.bind(s.as_str()),
            FieldValue::Integer(i) => query.bind(*i),
            FieldValue::Float(f) => query.bind(*f),
            FieldValue::Boolean(b) => query.bind(*b),
            FieldValue::DateTime(dt) => query.bind(*dt),
            FieldValue::Json(v) => query.bind(Json(v)),
            FieldValue::Null => query.bind(None::<String>),
        };
    }
    query
}

fn select_head(table: &str, projection: Projection) -> String {
    match projection {
        Projection::Full => format!("SELECT * FROM {table}"),
        Projection::Identity => format!("SELECT id, user_id FROM {table}"),
    }
}

fn decode_status<T: std::str::FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(column)?;
    text.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}

// =============================================================================
// Row mapping
// =============================================================================

impl<'r> FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let Json(history): Json<Vec<HistoryEntry>> = row.try_get("history")?;
        let Json(invoice): Json<Vec<InvoiceLine>> = row.try_get("invoice")?;
        Ok(Order {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            status: decode_status(row, "status")?,
            reference: row.try_get("reference")?,
            paid: row.try_get("paid")?,
            paid_at: row.try_get("paid_at")?,
            cancelled: row.try_get("cancelled")?,
            cancelled_at: row.try_get("cancelled_at")?,
            failed: row.try_get("failed")?,
            failed_at: row.try_get("failed_at")?,
            checksum: row.try_get("checksum")?,
            history,
            invoice,
            amount: row.try_get("amount")?,
            remark: row.try_get("remark")?,
            product_id: row.try_get("product_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Product {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            product_url: row.try_get("product_url")?,
            status: decode_status(row, "status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role: decode_status::<Role>(row, "role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn decode_order(row: &PgRow, projection: Projection) -> StoreResult<Order> {
    match projection {
        Projection::Full => Ok(Order::from_row(row)?),
        Projection::Identity => Ok(Order {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            ..Default::default()
        }),
    }
}

fn decode_product(row: &PgRow, projection: Projection) -> StoreResult<Product> {
    match projection {
        Projection::Full => Ok(Product::from_row(row)?),
        Projection::Identity => Ok(Product {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            ..Default::default()
        }),
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order storage backed by PostgreSQL
#[derive(Clone, Debug)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn default_order_sort() -> [OrderBy<OrderColumn>; 2] {
    [
        OrderBy::new(OrderColumn::UpdatedAt, SortDirection::Desc),
        OrderBy::new(OrderColumn::Id, SortDirection::Desc),
    ]
}

#[async_trait]
impl TransactionManager for PgOrderStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("failed to begin transaction: {e}")))
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("failed to commit transaction: {e}")))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_one(
        &self,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order> {
        let mut stmt = Statement::new(select_head("orders", projection));
        stmt.filter(clause)
            .order_by(&default_order_sort())
            .window(Window::new(1, 0));
        let (sql, args) = stmt.into_parts();

        let row = bind_all(sqlx::query(&sql), &args)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        decode_order(&row, projection)
    }

    async fn find_one_locked(
        &self,
        tx: &mut Self::Tx,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order> {
        let mut stmt = Statement::new(select_head("orders", projection));
        stmt.filter(clause).window(Window::new(1, 0)).for_update();
        let (sql, args) = stmt.into_parts();

        let row = bind_all(sqlx::query(&sql), &args)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        decode_order(&row, projection)
    }

    async fn find_many(
        &self,
        clause: &Clause<OrderColumn>,
        window: Window,
        sort: &[OrderBy<OrderColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Order>> {
        let default_sort = default_order_sort();
        let sort = if sort.is_empty() { &default_sort[..] } else { sort };

        let mut stmt = Statement::new(select_head("orders", projection));
        stmt.filter(clause).order_by(sort).window(window);
        let (sql, args) = stmt.into_parts();

        let rows = bind_all(sqlx::query(&sql), &args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| decode_order(row, projection))
            .collect()
    }

    async fn count(&self, clause: &Clause<OrderColumn>) -> StoreResult<i64> {
        let mut stmt = Statement::new("SELECT COUNT(*) FROM orders");
        stmt.filter(clause);
        let (sql, args) = stmt.into_parts();

        let row = bind_all(sqlx::query(&sql), &args)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn insert(
        &self,
        tx: &mut Self::Tx,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<()> {
        let mut stmt = Statement::new("INSERT INTO orders");
        stmt.values(assignments);
        let (sql, args) = stmt.into_parts();

        bind_all(sqlx::query(&sql), &args)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn update_locked(
        &self,
        tx: &mut Self::Tx,
        clause: &Clause<OrderColumn>,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<Option<Order>> {
        let mut stmt = Statement::new("UPDATE orders");
        stmt.assign(assignments).filter(clause).returning(assignments);
        let (sql, args) = stmt.into_parts();
        let query = bind_all(sqlx::query(&sql), &args);

        if !assignments.returns() {
            query.execute(&mut **tx).await?;
            return Ok(None);
        }

        let row = query
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        decode_order(&row, Projection::Full).map(Some)
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, product: &Product) -> StoreResult<()> {
        let mut stmt = Statement::new("INSERT INTO products");
        stmt.values(&product.insert_assignments());
        let (sql, args) = stmt.into_parts();
        bind_all(sqlx::query(&sql), &args)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_stock(&self, id: &str, stock: i64) -> StoreResult<()> {
        let changes = Assignments::new()
            .set(ProductColumn::Stock, stock)
            .set(ProductColumn::UpdatedAt, chrono::Utc::now());
        let mut stmt = Statement::new("UPDATE products");
        stmt.assign(&changes).filter(&Clause::eq(ProductColumn::Id, id));
        let (sql, args) = stmt.into_parts();
        let result = bind_all(sqlx::query(&sql), &args)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn find_many(
        &self,
        clause: &Clause<ProductColumn>,
        window: Window,
        sort: &[OrderBy<ProductColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Product>> {
        let mut stmt = Statement::new(select_head("products", projection));
        stmt.filter(clause).order_by(sort).window(window);
        let (sql, args) = stmt.into_parts();

        let rows = bind_all(sqlx::query(&sql), &args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| decode_product(row, projection))
            .collect()
    }

    async fn count(&self, clause: &Clause<ProductColumn>) -> StoreResult<i64> {
        let mut stmt = Statement::new("SELECT COUNT(*) FROM products");
        stmt.filter(clause);
        let (sql, args) = stmt.into_parts();

        let row = bind_all(sqlx::query(&sql), &args)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut stmt = Statement::new("INSERT INTO users");
        stmt.values(&user.insert_assignments());
        let (sql, args) = stmt.into_parts();
        bind_all(sqlx::query(&sql), &args)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<User> {
        let mut stmt = Statement::new("SELECT * FROM users");
        stmt.filter(&Clause::eq(UserColumn::Id, id));
        let (sql, args) = stmt.into_parts();

        let row = bind_all(sqlx::query(&sql), &args)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(User::from_row(&row)?)
    }

    async fn set_role(&self, id: &str, role: Role) -> StoreResult<()> {
        let changes = Assignments::new()
            .set(UserColumn::Role, role.as_str())
            .set(UserColumn::UpdatedAt, chrono::Utc::now());
        let mut stmt = Statement::new("UPDATE users");
        stmt.assign(&changes).filter(&Clause::eq(UserColumn::Id, id));
        let (sql, args) = stmt.into_parts();

        let result = bind_all(sqlx::query(&sql), &args)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
