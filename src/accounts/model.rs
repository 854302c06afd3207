//! Users and roles

use crate::core::error::{StoreError, StoreResult};
use crate::core::field::FieldValue;
use crate::core::predicate::{Assignments, Column};
use crate::core::store::{self, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn insert_assignments(&self) -> Assignments<UserColumn> {
        UserColumn::ALL
            .into_iter()
            .fold(Assignments::new(), |set, column| set.set(column, self.value(column)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserColumn {
    Id,
    Email,
    Role,
    CreatedAt,
    UpdatedAt,
}

impl UserColumn {
    pub const ALL: [UserColumn; 5] = [
        UserColumn::Id,
        UserColumn::Email,
        UserColumn::Role,
        UserColumn::CreatedAt,
        UserColumn::UpdatedAt,
    ];
}

impl Column for UserColumn {
    fn name(self) -> &'static str {
        match self {
            UserColumn::Id => "id",
            UserColumn::Email => "email",
            UserColumn::Role => "role",
            UserColumn::CreatedAt => "created_at",
            UserColumn::UpdatedAt => "updated_at",
        }
    }
}

impl Record<UserColumn> for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, column: UserColumn) -> FieldValue {
        match column {
            UserColumn::Id => FieldValue::from(&self.id),
            UserColumn::Email => FieldValue::from(&self.email),
            UserColumn::Role => FieldValue::from(self.role.as_str()),
            UserColumn::CreatedAt => FieldValue::from(self.created_at),
            UserColumn::UpdatedAt => FieldValue::from(self.updated_at),
        }
    }

    fn assign(&mut self, column: UserColumn, value: &FieldValue) -> StoreResult<()> {
        match column {
            UserColumn::Id => self.id = store::text(column, value)?,
            UserColumn::Email => self.email = store::text(column, value)?,
            UserColumn::Role => {
                self.role = store::text(column, value)?
                    .parse::<Role>()
                    .map_err(StoreError::Backend)?
            }
            UserColumn::CreatedAt => self.created_at = store::timestamp(column, value)?,
            UserColumn::UpdatedAt => self.updated_at = store::timestamp(column, value)?,
        }
        Ok(())
    }

    fn identity(&self) -> Self {
        User {
            id: self.id.clone(),
            role: self.role,
            ..Default::default()
        }
    }
}
