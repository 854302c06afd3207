//! # Order Engine
//!
//! Order fulfillment for a small marketplace: carts become pending orders,
//! owners cancel them, administrators move them through their remaining
//! states, and everyone lists what they are allowed to see.
//!
//! ## Features
//!
//! - **Typed predicates**: clauses over per-entity column enums, rendered to
//!   parameterized SQL or evaluated in memory
//! - **Scoped transactions**: rolled back on every path that does not commit
//! - **Row locking**: cancel and update serialize on the order row
//! - **Idempotent checkout**: resubmitting an unchanged cart returns the open order
//! - **Pluggable storage**: in-memory backend by default, PostgreSQL behind
//!   the `postgres` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use order_engine::prelude::*;
//! use std::sync::Arc;
//!
//! let orders = Arc::new(InMemoryOrderStore::new());
//! let products = Arc::new(InMemoryProductStore::new());
//! let users = Arc::new(InMemoryUserStore::new());
//!
//! let service = OrderService::new(orders, products, users);
//! let order = service
//!     .initiate_order("user-1", InitiateOrder { items: vec![CartItem::new("lamp", 2)] })
//!     .await?;
//! println!("{} {}", order.reference, order.amount);
//! ```

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod core;
pub mod logging;
pub mod orders;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        error::{ErrorKind, ErrorResponse, OrderError, OrderResult, StoreError, StoreResult},
        field::FieldValue,
        identity::{Clock, Hasher, IdGenerator, Sha256Hasher, SystemClock, UuidGenerator},
        predicate::{Assignments, Clause, Column, Comparison, Group, Join, OrderBy, Statement},
        query::{Page, Pagination, Projection, SortDirection, Window},
        service::{OrderStore, ProductStore, UserStore},
        transaction::{TransactionManager, TransactionScope},
    };

    // === Domain ===
    pub use crate::accounts::{AccountService, Role, User};
    pub use crate::catalog::{CatalogService, Product, ProductFilter, ProductStatus};
    pub use crate::orders::{
        CancelOrder, CartItem, HistoryEntry, InitiateOrder, InvoiceLine, Order, OrderFilter,
        OrderService, OrderStatus, UpdateOrder,
    };

    // === Storage ===
    pub use crate::storage::{InMemoryOrderStore, InMemoryProductStore, InMemoryUserStore};
    #[cfg(feature = "postgres")]
    pub use crate::storage::{PgOrderStore, PgProductStore, PgUserStore};

    // === Config ===
    pub use crate::config::{DatabaseConfig, EngineConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
