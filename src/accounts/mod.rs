//! User accounts and roles

pub mod model;
pub mod service;

pub use model::{Role, User, UserColumn};
pub use service::AccountService;
