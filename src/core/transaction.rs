//! Transaction scopes with rollback on drop

use crate::core::error::{StoreError, StoreResult};
use async_trait::async_trait;

/// A backend able to open and commit transactions.
///
/// Dropping an uncommitted `Tx` must roll it back. `sqlx::Transaction` does
/// this natively; the in-memory backend discards its staged writes and
/// releases its row locks.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;
}

/// A unit of work that commits only when told to.
///
/// Every early return (including `?`) drops the scope, which rolls the
/// transaction back.
///
/// ```rust,ignore
/// let mut scope = TransactionScope::begin(&store, "cancel_order").await?;
/// let order = store.find_one_locked(scope.tx()?, &clause, Projection::Full).await?;
/// store.update_locked(scope.tx()?, &clause, &changes).await?;
/// scope.commit().await?;
/// ```
pub struct TransactionScope<'m, M: TransactionManager> {
    manager: &'m M,
    tx: Option<M::Tx>,
    label: &'static str,
}

impl<'m, M: TransactionManager> TransactionScope<'m, M> {
    pub async fn begin(manager: &'m M, label: &'static str) -> StoreResult<Self> {
        let tx = manager.begin().await?;
        tracing::trace!(scope = label, "transaction opened");
        Ok(Self {
            manager,
            tx: Some(tx),
            label,
        })
    }

    /// The open transaction
    pub fn tx(&mut self) -> StoreResult<&mut M::Tx> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Transaction(format!("{} scope is closed", self.label)))
    }

    pub async fn commit(mut self) -> StoreResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Transaction(format!("{} scope is closed", self.label)))?;
        self.manager.commit(tx).await?;
        tracing::trace!(scope = self.label, "transaction committed");
        Ok(())
    }
}

impl<M: TransactionManager> Drop for TransactionScope<'_, M> {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            tracing::debug!(scope = self.label, "rolled back uncommitted transaction");
        }
    }
}
