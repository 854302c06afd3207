//! Record mapping and in-process evaluation of clauses
//!
//! Each persisted entity declares its column/field mapping once through
//! [`Record`]. The in-memory backend uses it to evaluate the same
//! [`Clause`]s, sorts and assignments the PostgreSQL backend compiles to SQL.

use crate::core::error::{StoreError, StoreResult};
use crate::core::field::FieldValue;
use crate::core::predicate::{
    Assignment, Assignments, Clause, Column, Comparison, Condition, Group, Join, Operand, OrderBy,
};
use crate::core::query::SortDirection;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;

/// Static column ↔ field mapping of an entity
pub trait Record<C: Column>: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Read a column
    fn value(&self, column: C) -> FieldValue;

    /// Write a column
    fn assign(&mut self, column: C, value: &FieldValue) -> StoreResult<()>;

    /// Append the elements of a JSON array to a JSON array column
    fn append(&mut self, column: C, _items: &FieldValue) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!(
            "column {} does not support append",
            column.name()
        )))
    }

    /// A copy carrying only the identifying columns
    fn identity(&self) -> Self;

    fn apply(&mut self, assignments: &Assignments<C>) -> StoreResult<()> {
        for (column, assignment) in assignments.entries() {
            match assignment {
                Assignment::Set(value) => self.assign(*column, value)?,
                Assignment::Append(items) => self.append(*column, items)?,
            }
        }
        Ok(())
    }
}

/// Evaluate a clause against a record
pub fn matches<C: Column, R: Record<C>>(clause: &Clause<C>, record: &R) -> StoreResult<bool> {
    let mut outcomes = Vec::new();
    for group in clause.groups().iter().filter(|g| !g.is_empty()) {
        outcomes.push(group_matches(group, record)?);
    }
    if outcomes.is_empty() {
        return Ok(true);
    }
    Ok(match clause.join() {
        Join::And => outcomes.iter().all(|m| *m),
        Join::Or => outcomes.iter().any(|m| *m),
    })
}

fn group_matches<C: Column, R: Record<C>>(group: &Group<C>, record: &R) -> StoreResult<bool> {
    let mut outcomes = Vec::with_capacity(group.conditions().len());
    for condition in group.conditions() {
        outcomes.push(condition_matches(group.comparison(), condition, record)?);
    }
    Ok(match group.join() {
        Join::And => outcomes.iter().all(|m| *m),
        Join::Or => outcomes.iter().any(|m| *m),
    })
}

fn condition_matches<C: Column, R: Record<C>>(
    comparison: Comparison,
    condition: &Condition<C>,
    record: &R,
) -> StoreResult<bool> {
    let actual = record.value(condition.column);
    match &condition.operand {
        Operand::Raw(fragment) => Err(StoreError::Unsupported(format!(
            "raw fragment cannot be evaluated in memory: {fragment}"
        ))),
        Operand::Set(values) => Ok(values.iter().any(|v| equal(&actual, v))),
        Operand::Value(expected) => match comparison {
            Comparison::Equal if expected.is_null() => Ok(actual.is_null()),
            Comparison::Equal | Comparison::In => Ok(equal(&actual, expected)),
            Comparison::GreaterThanOrEqual => Ok(matches!(
                actual.compare(expected),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Comparison::LessThanOrEqual => Ok(matches!(
                actual.compare(expected),
                Some(Ordering::Less | Ordering::Equal)
            )),
            Comparison::ILike => match (actual.as_string(), expected.as_string()) {
                (Some(text), Some(pattern)) => ilike(text, pattern),
                _ => Ok(false),
            },
        },
    }
}

fn equal(actual: &FieldValue, expected: &FieldValue) -> bool {
    actual.compare(expected) == Some(Ordering::Equal)
}

/// Case-insensitive SQL pattern match: `%` is any run, `_` any single
/// character, `\` escapes the next character.
pub fn ilike(text: &str, pattern: &str) -> StoreResult<bool> {
    let mut expr = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    expr.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    let re = Regex::new(&expr).map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(re.is_match(text))
}

/// Sort records by the given keys; unordered values compare equal
pub fn sort_records<C: Column, R: Record<C>>(rows: &mut [R], keys: &[OrderBy<C>]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let ordering = a
                .value(key.column)
                .compare(&b.value(key.column))
                .unwrap_or(Ordering::Equal);
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Bound a store call by `limit`
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

// =============================================================================
// Field decoding for Record::assign
// =============================================================================

fn mismatch<C: Column>(column: C, expected: &str, value: &FieldValue) -> StoreError {
    StoreError::Backend(format!(
        "column {} expects {expected}, got {value:?}",
        column.name()
    ))
}

pub fn text<C: Column>(column: C, value: &FieldValue) -> StoreResult<String> {
    value
        .as_string()
        .map(str::to_string)
        .ok_or_else(|| mismatch(column, "text", value))
}

pub fn optional_text<C: Column>(column: C, value: &FieldValue) -> StoreResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    text(column, value).map(Some)
}

pub fn flag<C: Column>(column: C, value: &FieldValue) -> StoreResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(column, "boolean", value))
}

pub fn number<C: Column>(column: C, value: &FieldValue) -> StoreResult<f64> {
    value
        .as_float()
        .ok_or_else(|| mismatch(column, "number", value))
}

pub fn integer<C: Column>(column: C, value: &FieldValue) -> StoreResult<i64> {
    value
        .as_integer()
        .ok_or_else(|| mismatch(column, "integer", value))
}

pub fn timestamp<C: Column>(column: C, value: &FieldValue) -> StoreResult<DateTime<Utc>> {
    value
        .as_datetime()
        .ok_or_else(|| mismatch(column, "timestamp", value))
}

pub fn optional_timestamp<C: Column>(
    column: C,
    value: &FieldValue,
) -> StoreResult<Option<DateTime<Utc>>> {
    if value.is_null() {
        return Ok(None);
    }
    timestamp(column, value).map(Some)
}

pub fn json<C: Column, T: DeserializeOwned>(column: C, value: &FieldValue) -> StoreResult<T> {
    match value {
        FieldValue::Json(inner) => Ok(serde_json::from_value(inner.clone())?),
        other => Err(mismatch(column, "json", other)),
    }
}
