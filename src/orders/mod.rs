//! Orders: model, request payloads, invoice arithmetic and the lifecycle service

pub mod filter;
pub mod invoice;
pub mod model;
pub mod payload;
pub mod service;

pub use model::{HistoryEntry, InvoiceLine, Order, OrderColumn, OrderStatus};
pub use payload::{CancelOrder, CartItem, InitiateOrder, MAX_ORDER_ITEMS, OrderFilter, UpdateOrder};
pub use service::OrderService;
