//! Typed inputs of the order operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of cart lines per order
pub const MAX_ORDER_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateOrder {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: String,
    /// When false the order is returned untouched
    pub cancel: bool,
}

/// Administrative status change
///
/// `status` stays a string so unknown values reach validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrder {
    pub order_id: String,
    pub status: String,
}

/// Listing filter; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,

    pub order_id: Option<String>,
    pub reference: Option<String>,
    pub paid: Option<bool>,
    pub failed: Option<bool>,
    pub cancelled: Option<bool>,
    pub status: Option<String>,
    /// Honoured for administrators only
    pub user_id: Option<String>,

    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Include pagination metadata
    pub paginate: bool,
}
