//! Core module containing the predicate builder, store contracts and shared types

pub mod error;
pub mod field;
pub mod identity;
pub mod predicate;
pub mod query;
pub mod service;
pub mod store;
pub mod transaction;

pub use error::{ErrorKind, ErrorResponse, OrderError, OrderResult, StoreError, StoreResult};
pub use field::FieldValue;
pub use identity::{Clock, Hasher, IdGenerator, Sha256Hasher, SystemClock, UuidGenerator};
pub use predicate::{
    Assignment, Assignments, Clause, Column, Comparison, Condition, Group, Join, Operand,
    OrderBy, Statement,
};
pub use query::{DEFAULT_PAGE_LIMIT, Page, Pagination, Projection, SortDirection, Window};
pub use service::{OrderStore, ProductStore, UserStore};
pub use store::Record;
pub use transaction::{TransactionManager, TransactionScope};
