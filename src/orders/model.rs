//! Order aggregate and its column mapping

use crate::core::error::{StoreError, StoreResult};
use crate::core::field::FieldValue;
use crate::core::predicate::{Assignments, Column};
use crate::core::store::{self, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Cancelled,
    Completed,
    Rejected,
    Approved,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Cancelled,
        OrderStatus::Completed,
        OrderStatus::Rejected,
        OrderStatus::Approved,
    ];

    /// Targets an administrator may move a pending order to
    pub const ADMIN_TARGETS: [OrderStatus; 4] = [
        OrderStatus::Completed,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Approved => "APPROVED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Completed | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "REJECTED" => Ok(OrderStatus::Rejected),
            "APPROVED" => Ok(OrderStatus::Approved),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// One purchased line of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Product id
    pub key: String,
    pub name: String,
    /// Unit price
    pub amount: f64,
    pub quantity: i64,
}

/// An audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(action: impl Into<String>, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            at,
        }
    }
}

/// A durable, auditable order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub reference: String,

    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failed: bool,
    pub failed_at: Option<DateTime<Utc>>,

    /// SHA-256 of the serialized invoice
    pub checksum: String,
    pub history: Vec<HistoryEntry>,
    pub invoice: Vec<InvoiceLine>,
    /// Total payable
    pub amount: f64,
    pub remark: String,
    /// Set when the invoice holds exactly one line
    pub product_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assignments inserting every column; absent nullable columns are left to
    /// their default
    pub fn insert_assignments(&self) -> StoreResult<Assignments<OrderColumn>> {
        let mut set = Assignments::new();
        for column in OrderColumn::ALL {
            let value = match column {
                OrderColumn::History => {
                    FieldValue::Json(serde_json::to_value(&self.history)?)
                }
                OrderColumn::Invoice => {
                    FieldValue::Json(serde_json::to_value(&self.invoice)?)
                }
                other => self.value(other),
            };
            if !value.is_null() {
                set = set.set(column, value);
            }
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderColumn {
    Id,
    UserId,
    Status,
    Reference,
    Paid,
    PaidAt,
    Cancelled,
    CancelledAt,
    Failed,
    FailedAt,
    Checksum,
    History,
    Invoice,
    Amount,
    Remark,
    ProductId,
    CreatedAt,
    UpdatedAt,
}

impl OrderColumn {
    pub const ALL: [OrderColumn; 18] = [
        OrderColumn::Id,
        OrderColumn::UserId,
        OrderColumn::Status,
        OrderColumn::Reference,
        OrderColumn::Paid,
        OrderColumn::PaidAt,
        OrderColumn::Cancelled,
        OrderColumn::CancelledAt,
        OrderColumn::Failed,
        OrderColumn::FailedAt,
        OrderColumn::Checksum,
        OrderColumn::History,
        OrderColumn::Invoice,
        OrderColumn::Amount,
        OrderColumn::Remark,
        OrderColumn::ProductId,
        OrderColumn::CreatedAt,
        OrderColumn::UpdatedAt,
    ];
}

impl Column for OrderColumn {
    fn name(self) -> &'static str {
        match self {
            OrderColumn::Id => "id",
            OrderColumn::UserId => "user_id",
            OrderColumn::Status => "status",
            OrderColumn::Reference => "reference",
            OrderColumn::Paid => "paid",
            OrderColumn::PaidAt => "paid_at",
            OrderColumn::Cancelled => "cancelled",
            OrderColumn::CancelledAt => "cancelled_at",
            OrderColumn::Failed => "failed",
            OrderColumn::FailedAt => "failed_at",
            OrderColumn::Checksum => "checksum",
            OrderColumn::History => "history",
            OrderColumn::Invoice => "invoice",
            OrderColumn::Amount => "amount",
            OrderColumn::Remark => "remark",
            OrderColumn::ProductId => "product_id",
            OrderColumn::CreatedAt => "created_at",
            OrderColumn::UpdatedAt => "updated_at",
        }
    }
}

impl Record<OrderColumn> for Order {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, column: OrderColumn) -> FieldValue {
        match column {
            OrderColumn::Id => FieldValue::from(&self.id),
            OrderColumn::UserId => FieldValue::from(&self.user_id),
            OrderColumn::Status => FieldValue::from(self.status.as_str()),
            OrderColumn::Reference => FieldValue::from(&self.reference),
            OrderColumn::Paid => FieldValue::from(self.paid),
            OrderColumn::PaidAt => FieldValue::from(self.paid_at),
            OrderColumn::Cancelled => FieldValue::from(self.cancelled),
            OrderColumn::CancelledAt => FieldValue::from(self.cancelled_at),
            OrderColumn::Failed => FieldValue::from(self.failed),
            OrderColumn::FailedAt => FieldValue::from(self.failed_at),
            OrderColumn::Checksum => FieldValue::from(&self.checksum),
            OrderColumn::History => serde_json::to_value(&self.history)
                .map_or(FieldValue::Null, FieldValue::Json),
            OrderColumn::Invoice => serde_json::to_value(&self.invoice)
                .map_or(FieldValue::Null, FieldValue::Json),
            OrderColumn::Amount => FieldValue::from(self.amount),
            OrderColumn::Remark => FieldValue::from(&self.remark),
            OrderColumn::ProductId => FieldValue::from(self.product_id.clone()),
            OrderColumn::CreatedAt => FieldValue::from(self.created_at),
            OrderColumn::UpdatedAt => FieldValue::from(self.updated_at),
        }
    }

    fn assign(&mut self, column: OrderColumn, value: &FieldValue) -> StoreResult<()> {
        match column {
            OrderColumn::Id => self.id = store::text(column, value)?,
            OrderColumn::UserId => self.user_id = store::text(column, value)?,
            OrderColumn::Status => {
                self.status = store::text(column, value)?
                    .parse::<OrderStatus>()
                    .map_err(StoreError::Backend)?
            }
            OrderColumn::Reference => self.reference = store::text(column, value)?,
            OrderColumn::Paid => self.paid = store::flag(column, value)?,
            OrderColumn::PaidAt => self.paid_at = store::optional_timestamp(column, value)?,
            OrderColumn::Cancelled => self.cancelled = store::flag(column, value)?,
            OrderColumn::CancelledAt => {
                self.cancelled_at = store::optional_timestamp(column, value)?
            }
            OrderColumn::Failed => self.failed = store::flag(column, value)?,
            OrderColumn::FailedAt => self.failed_at = store::optional_timestamp(column, value)?,
            OrderColumn::Checksum => self.checksum = store::text(column, value)?,
            OrderColumn::History => self.history = store::json(column, value)?,
            OrderColumn::Invoice => self.invoice = store::json(column, value)?,
            OrderColumn::Amount => self.amount = store::number(column, value)?,
            OrderColumn::Remark => self.remark = store::text(column, value)?,
            OrderColumn::ProductId => self.product_id = store::optional_text(column, value)?,
            OrderColumn::CreatedAt => self.created_at = store::timestamp(column, value)?,
            OrderColumn::UpdatedAt => self.updated_at = store::timestamp(column, value)?,
        }
        Ok(())
    }

    fn append(&mut self, column: OrderColumn, items: &FieldValue) -> StoreResult<()> {
        match column {
            OrderColumn::History => {
                let entries: Vec<HistoryEntry> = store::json(column, items)?;
                self.history.extend(entries);
                Ok(())
            }
            OrderColumn::Invoice => {
                let lines: Vec<InvoiceLine> = store::json(column, items)?;
                self.invoice.extend(lines);
                Ok(())
            }
            other => Err(StoreError::Unsupported(format!(
                "column {} does not support append",
                other.name()
            ))),
        }
    }

    fn identity(&self) -> Self {
        Order {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            ..Default::default()
        }
    }
}
