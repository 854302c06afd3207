//! Catalog products and their column mapping

use crate::core::error::{StoreError, StoreResult};
use crate::core::field::FieldValue;
use crate::core::predicate::{Assignments, Column};
use crate::core::store::{self, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductStatus {
    #[default]
    Draft,
    Published,
    Retracted,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Draft => "DRAFT",
            ProductStatus::Published => "PUBLISHED",
            ProductStatus::Retracted => "RETRACTED",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ProductStatus::Draft),
            "PUBLISHED" => Ok(ProductStatus::Published),
            "RETRACTED" => Ok(ProductStatus::Retracted),
            other => Err(format!("unknown product status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Publishing user
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub product_url: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn insert_assignments(&self) -> Assignments<ProductColumn> {
        ProductColumn::ALL
            .into_iter()
            .fold(Assignments::new(), |set, column| set.set(column, self.value(column)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductColumn {
    Id,
    UserId,
    Name,
    Description,
    Price,
    Stock,
    ProductUrl,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl ProductColumn {
    pub const ALL: [ProductColumn; 10] = [
        ProductColumn::Id,
        ProductColumn::UserId,
        ProductColumn::Name,
        ProductColumn::Description,
        ProductColumn::Price,
        ProductColumn::Stock,
        ProductColumn::ProductUrl,
        ProductColumn::Status,
        ProductColumn::CreatedAt,
        ProductColumn::UpdatedAt,
    ];
}

impl Column for ProductColumn {
    fn name(self) -> &'static str {
        match self {
            ProductColumn::Id => "id",
            ProductColumn::UserId => "user_id",
            ProductColumn::Name => "name",
            ProductColumn::Description => "description",
            ProductColumn::Price => "price",
            ProductColumn::Stock => "stock",
            ProductColumn::ProductUrl => "product_url",
            ProductColumn::Status => "status",
            ProductColumn::CreatedAt => "created_at",
            ProductColumn::UpdatedAt => "updated_at",
        }
    }
}

impl Record<ProductColumn> for Product {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, column: ProductColumn) -> FieldValue {
        match column {
            ProductColumn::Id => FieldValue::from(&self.id),
            ProductColumn::UserId => FieldValue::from(&self.user_id),
            ProductColumn::Name => FieldValue::from(&self.name),
            ProductColumn::Description => FieldValue::from(&self.description),
            ProductColumn::Price => FieldValue::from(self.price),
            ProductColumn::Stock => FieldValue::from(self.stock),
            ProductColumn::ProductUrl => FieldValue::from(&self.product_url),
            ProductColumn::Status => FieldValue::from(self.status.as_str()),
            ProductColumn::CreatedAt => FieldValue::from(self.created_at),
            ProductColumn::UpdatedAt => FieldValue::from(self.updated_at),
        }
    }

    fn assign(&mut self, column: ProductColumn, value: &FieldValue) -> StoreResult<()> {
        match column {
            ProductColumn::Id => self.id = store::text(column, value)?,
            ProductColumn::UserId => self.user_id = store::text(column, value)?,
            ProductColumn::Name => self.name = store::text(column, value)?,
            ProductColumn::Description => self.description = store::text(column, value)?,
            ProductColumn::Price => self.price = store::number(column, value)?,
            ProductColumn::Stock => self.stock = store::integer(column, value)?,
            ProductColumn::ProductUrl => self.product_url = store::text(column, value)?,
            ProductColumn::Status => {
                self.status = store::text(column, value)?
                    .parse::<ProductStatus>()
                    .map_err(StoreError::Backend)?
            }
            ProductColumn::CreatedAt => self.created_at = store::timestamp(column, value)?,
            ProductColumn::UpdatedAt => self.updated_at = store::timestamp(column, value)?,
        }
        Ok(())
    }

    fn identity(&self) -> Self {
        Product {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            ..Default::default()
        }
    }
}
