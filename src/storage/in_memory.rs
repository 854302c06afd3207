//! In-memory stores for testing and development
//!
//! Clauses are evaluated through [`Record`], so the in-memory backend accepts
//! exactly the predicates the PostgreSQL backend compiles, except raw SQL
//! fragments.
//!
//! Transactions stage their writes and apply them at commit; dropping an
//! uncommitted transaction discards them. Locked reads take a per-row async
//! mutex held until the transaction ends, which gives the same serialization
//! as `SELECT ... FOR UPDATE`.

use crate::accounts::model::{Role, User, UserColumn};
use crate::catalog::model::{Product, ProductColumn};
use crate::core::error::{StoreError, StoreResult};
use crate::core::predicate::{Assignments, Clause, Column, OrderBy};
use crate::core::query::{Projection, SortDirection, Window};
use crate::core::service::{OrderStore, ProductStore, UserStore};
use crate::core::store::{self, Record};
use crate::core::transaction::TransactionManager;
use crate::orders::model::{Order, OrderColumn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

/// Per-row locks keyed by order id
type LockTable = Arc<Mutex<HashMap<String, Arc<RowLock<()>>>>>;

/// A thread-safe map of records keyed by id
pub struct InMemoryTable<C, R> {
    rows: Arc<RwLock<HashMap<String, R>>>,
    _column: PhantomData<C>,
}

impl<C, R> Clone for InMemoryTable<C, R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            _column: PhantomData,
        }
    }
}

impl<C: Column, R: Record<C>> Default for InMemoryTable<C, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Column, R: Record<C>> InMemoryTable<C, R> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            _column: PhantomData,
        }
    }

    /// Insert or replace a row
    pub fn upsert(&self, row: R) -> StoreResult<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| StoreError::Backend(format!("failed to acquire write lock: {e}")))?;
        rows.insert(row.id().to_string(), row);
        Ok(())
    }

    pub fn get(&self, id: &str) -> StoreResult<R> {
        let rows = self.read()?;
        rows.get(id).cloned().ok_or(StoreError::NotFound)
    }

    /// Matching rows in the requested order and window
    pub fn select(
        &self,
        clause: &Clause<C>,
        window: Window,
        sort: &[OrderBy<C>],
        projection: Projection,
    ) -> StoreResult<Vec<R>> {
        let rows = self.read()?;
        select(rows.values(), clause, window, sort, projection)
    }

    pub fn count(&self, clause: &Clause<C>) -> StoreResult<i64> {
        let rows = self.read()?;
        let mut total = 0;
        for row in rows.values() {
            if store::matches(clause, row)? {
                total += 1;
            }
        }
        Ok(total)
    }

    pub fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.read()?.contains_key(id))
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, R>>> {
        self.rows
            .read()
            .map_err(|e| StoreError::Backend(format!("failed to acquire read lock: {e}")))
    }
}

fn select<'a, C, R, I>(
    rows: I,
    clause: &Clause<C>,
    window: Window,
    sort: &[OrderBy<C>],
    projection: Projection,
) -> StoreResult<Vec<R>>
where
    C: Column,
    R: Record<C>,
    I: IntoIterator<Item = &'a R>,
{
    let mut matched = Vec::new();
    for row in rows {
        if store::matches(clause, row)? {
            matched.push(row.clone());
        }
    }
    store::sort_records(&mut matched, sort);
    Ok(window
        .slice(matched)
        .into_iter()
        .map(|row| project(row, projection))
        .collect())
}

fn project<C: Column, R: Record<C>>(row: R, projection: Projection) -> R {
    match projection {
        Projection::Full => row,
        Projection::Identity => row.identity(),
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A unit of work against [`InMemoryOrderStore`]
pub struct InMemoryTransaction {
    /// Rows written by this transaction, keyed by id
    staged: HashMap<String, Order>,
    /// Row locks held until commit or drop
    held: HashMap<String, OwnedMutexGuard<()>>,
    locks: LockTable,
}

impl InMemoryTransaction {
    fn holds(&self, id: &str) -> bool {
        self.held.contains_key(id)
    }
}

impl Drop for InMemoryTransaction {
    /// Release held rows and forget locks nobody else is waiting on
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let ids: Vec<String> = self.held.drain().map(|(id, _guard)| id).collect();
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        for id in ids {
            // waiters clone the lock under this mutex, so a count of one means idle
            if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&id);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    table: InMemoryTable<OrderColumn, Order>,
    locks: LockTable,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows, for assertions
    pub fn table(&self) -> &InMemoryTable<OrderColumn, Order> {
        &self.table
    }

    fn row_lock(&self, id: &str) -> StoreResult<Arc<RowLock<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| StoreError::Backend(format!("failed to acquire lock table: {e}")))?;
        Ok(locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone())
    }

    async fn lock_row(&self, tx: &mut InMemoryTransaction, id: &str) -> StoreResult<()> {
        if tx.holds(id) {
            return Ok(());
        }
        let guard = self.row_lock(id)?.lock_owned().await;
        tx.held.insert(id.to_string(), guard);
        Ok(())
    }

    /// Committed rows overlaid with the transaction's own writes
    fn view(&self, tx: &InMemoryTransaction) -> StoreResult<Vec<Order>> {
        let rows = self.table.read()?;
        let mut view: HashMap<String, Order> = rows.clone();
        for (id, row) in &tx.staged {
            view.insert(id.clone(), row.clone());
        }
        Ok(view.into_values().collect())
    }

    fn matching_ids(
        &self,
        tx: &InMemoryTransaction,
        clause: &Clause<OrderColumn>,
    ) -> StoreResult<Vec<String>> {
        let by_id = [OrderBy::new(OrderColumn::Id, SortDirection::Asc)];
        let rows = self.view(tx)?;
        Ok(select(rows.iter(), clause, Window::all(), &by_id, Projection::Identity)?
            .into_iter()
            .map(|row| row.id)
            .collect())
    }

    /// Current version of a row as seen by `tx`, if it still matches
    fn reread(
        &self,
        tx: &InMemoryTransaction,
        id: &str,
        clause: &Clause<OrderColumn>,
    ) -> StoreResult<Option<Order>> {
        let row = match tx.staged.get(id) {
            Some(row) => Some(row.clone()),
            None => match self.table.get(id) {
                Ok(row) => Some(row),
                Err(StoreError::NotFound) => None,
                Err(err) => return Err(err),
            },
        };
        match row {
            Some(row) if store::matches(clause, &row)? => Ok(Some(row)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionManager for InMemoryOrderStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            staged: HashMap::new(),
            held: HashMap::new(),
            locks: self.locks.clone(),
        })
    }

    async fn commit(&self, mut tx: InMemoryTransaction) -> StoreResult<()> {
        let mut rows = self
            .table
            .rows
            .write()
            .map_err(|e| StoreError::Transaction(format!("failed to acquire write lock: {e}")))?;
        for (id, row) in tx.staged.drain() {
            rows.insert(id, row);
        }
        // guards in `tx.held` are released when `tx` drops here
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_one(
        &self,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order> {
        let sort = default_order_sort();
        self.table
            .select(clause, Window::new(1, 0), &sort, projection)?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound)
    }

    async fn find_one_locked(
        &self,
        tx: &mut InMemoryTransaction,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order> {
        for id in self.matching_ids(tx, clause)? {
            self.lock_row(tx, &id).await?;
            // the row may have changed while we waited for the lock
            if let Some(row) = self.reread(tx, &id, clause)? {
                return Ok(project(row, projection));
            }
        }
        Err(StoreError::NotFound)
    }

    async fn find_many(
        &self,
        clause: &Clause<OrderColumn>,
        window: Window,
        sort: &[OrderBy<OrderColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Order>> {
        if sort.is_empty() {
            return self
                .table
                .select(clause, window, &default_order_sort(), projection);
        }
        self.table.select(clause, window, sort, projection)
    }

    async fn count(&self, clause: &Clause<OrderColumn>) -> StoreResult<i64> {
        self.table.count(clause)
    }

    async fn insert(
        &self,
        tx: &mut InMemoryTransaction,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<()> {
        let mut row = Order::default();
        row.apply(assignments)?;
        if row.id.is_empty() {
            return Err(StoreError::Backend("orders.id must not be empty".into()));
        }
        if tx.staged.contains_key(&row.id) || self.table.contains(&row.id)? {
            return Err(StoreError::Backend(format!(
                "duplicate key value violates unique constraint orders_pkey ({})",
                row.id
            )));
        }
        self.lock_row(tx, &row.id).await?;
        tx.staged.insert(row.id.clone(), row);
        Ok(())
    }

    async fn update_locked(
        &self,
        tx: &mut InMemoryTransaction,
        clause: &Clause<OrderColumn>,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<Option<Order>> {
        let mut updated = Vec::new();
        for id in self.matching_ids(tx, clause)? {
            self.lock_row(tx, &id).await?;
            if let Some(mut row) = self.reread(tx, &id, clause)? {
                row.apply(assignments)?;
                tx.staged.insert(id, row.clone());
                updated.push(row);
            }
        }

        if !assignments.returns() {
            return Ok(None);
        }
        updated.into_iter().next().map(Some).ok_or(StoreError::NotFound)
    }
}

fn default_order_sort() -> [OrderBy<OrderColumn>; 2] {
    [
        OrderBy::new(OrderColumn::UpdatedAt, SortDirection::Desc),
        OrderBy::new(OrderColumn::Id, SortDirection::Desc),
    ]
}

// =============================================================================
// Products
// =============================================================================

#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    table: InMemoryTable<ProductColumn, Product>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace catalog entries
    pub fn seed(&self, products: impl IntoIterator<Item = Product>) -> StoreResult<()> {
        for product in products {
            self.table.upsert(product)?;
        }
        Ok(())
    }

    pub fn set_stock(&self, id: &str, stock: i64) -> StoreResult<()> {
        let mut product = self.table.get(id)?;
        product.stock = stock;
        self.table.upsert(product)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_many(
        &self,
        clause: &Clause<ProductColumn>,
        window: Window,
        sort: &[OrderBy<ProductColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Product>> {
        self.table.select(clause, window, sort, projection)
    }

    async fn count(&self, clause: &Clause<ProductColumn>) -> StoreResult<i64> {
        self.table.count(clause)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    table: InMemoryTable<UserColumn, User>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, users: impl IntoIterator<Item = User>) -> StoreResult<()> {
        for user in users {
            self.table.upsert(user)?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<User> {
        self.table.get(id)
    }

    async fn set_role(&self, id: &str, role: Role) -> StoreResult<()> {
        let mut user = self.table.get(id)?;
        user.role = role;
        user.updated_at = chrono::Utc::now();
        self.table.upsert(user)
    }
}
