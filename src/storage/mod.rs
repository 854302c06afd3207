//! Storage implementations for different backends

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryOrderStore, InMemoryProductStore, InMemoryTable, InMemoryUserStore};
#[cfg(feature = "postgres")]
pub use postgres::{PgOrderStore, PgProductStore, PgUserStore, connect, ensure_schema};
