//! Store traits for orders, products and users
//!
//! Services depend on these traits only; the backends live in
//! [`crate::storage`].

use crate::accounts::model::{Role, User};
use crate::catalog::model::{Product, ProductColumn};
use crate::core::error::StoreResult;
use crate::core::predicate::{Assignments, Clause, OrderBy};
use crate::core::query::{Projection, Window};
use crate::core::transaction::TransactionManager;
use crate::orders::model::{Order, OrderColumn};
use async_trait::async_trait;

/// Persistence for the `orders` table
///
/// Lookups that find no row return [`StoreError::NotFound`](crate::core::error::StoreError::NotFound).
#[async_trait]
pub trait OrderStore: TransactionManager {
    /// Unlocked point lookup
    async fn find_one(
        &self,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order>;

    /// Point lookup inside `tx`, locking the row until the transaction ends
    async fn find_one_locked(
        &self,
        tx: &mut Self::Tx,
        clause: &Clause<OrderColumn>,
        projection: Projection,
    ) -> StoreResult<Order>;

    /// Filtered lookup; an empty `sort` orders by `updated_at DESC, id DESC`
    async fn find_many(
        &self,
        clause: &Clause<OrderColumn>,
        window: Window,
        sort: &[OrderBy<OrderColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Order>>;

    async fn count(&self, clause: &Clause<OrderColumn>) -> StoreResult<i64>;

    async fn insert(
        &self,
        tx: &mut Self::Tx,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<()>;

    /// Update matching rows inside `tx`
    ///
    /// Returns the updated row when the assignments request `RETURNING`,
    /// `NotFound` if nothing matched, and `None` otherwise.
    async fn update_locked(
        &self,
        tx: &mut Self::Tx,
        clause: &Clause<OrderColumn>,
        assignments: &Assignments<OrderColumn>,
    ) -> StoreResult<Option<Order>>;
}

/// Read access to the catalog
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_many(
        &self,
        clause: &Clause<ProductColumn>,
        window: Window,
        sort: &[OrderBy<ProductColumn>],
        projection: Projection,
    ) -> StoreResult<Vec<Product>>;

    async fn count(&self, clause: &Clause<ProductColumn>) -> StoreResult<i64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<User>;

    async fn set_role(&self, id: &str, role: Role) -> StoreResult<()>;
}
