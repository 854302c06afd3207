//! Translation of listing filters into clauses

use super::model::{OrderColumn, OrderStatus};
use super::payload::OrderFilter;
use crate::accounts::model::User;
use crate::core::predicate::{Clause, Comparison, Group, OrderBy};
use crate::core::query::SortDirection;

/// Clause for an order listing requested by `requester`
///
/// Non-administrators are always confined to their own orders; an
/// administrator may narrow the listing to one user.
pub fn clause(filter: &OrderFilter, requester: &User) -> Clause<OrderColumn> {
    let mut equal = Group::all(Comparison::Equal);
    let mut from = Group::all(Comparison::GreaterThanOrEqual);
    let mut to = Group::all(Comparison::LessThanOrEqual);

    if requester.is_admin() {
        if let Some(user_id) = non_empty(&filter.user_id) {
            equal.push(OrderColumn::UserId, user_id);
        }
    } else {
        equal.push(OrderColumn::UserId, &requester.id);
    }

    if let Some(paid) = filter.paid {
        equal.push(OrderColumn::Paid, paid);
    }
    if let Some(cancelled) = filter.cancelled {
        equal.push(OrderColumn::Cancelled, cancelled);
    }
    if let Some(failed) = filter.failed {
        equal.push(OrderColumn::Failed, failed);
    }
    if let Some(id) = non_empty(&filter.order_id) {
        equal.push(OrderColumn::Id, id);
    }
    if let Some(reference) = non_empty(&filter.reference) {
        equal.push(OrderColumn::Reference, reference);
    }
    if let Some(status) = non_empty(&filter.status) {
        equal.push(OrderColumn::Status, status);
    }

    if let Some(min) = filter.min_amount {
        from.push(OrderColumn::Amount, min);
    }
    if let Some(max) = filter.max_amount {
        to.push(OrderColumn::Amount, max);
    }
    if let Some(start) = filter.start_date {
        from.push(OrderColumn::CreatedAt, start);
    }
    if let Some(end) = filter.end_date {
        to.push(OrderColumn::CreatedAt, end);
    }

    Clause::all().group(equal).group(from).group(to)
}

/// Checksum lookup for a resubmitted cart
///
/// Only the requester's own orders that are still open for payment count as
/// duplicates.
pub fn duplicate_of(checksum: &str, requester: &User) -> Clause<OrderColumn> {
    Clause::all()
        .group(
            Group::all(Comparison::Equal)
                .with(OrderColumn::Checksum, checksum)
                .with(OrderColumn::Paid, false)
                .with(OrderColumn::Failed, false)
                .with(OrderColumn::Cancelled, false)
                .with(OrderColumn::UserId, &requester.id),
        )
        .group(Group::all(Comparison::In).with_set(
            OrderColumn::Status,
            OrderStatus::ALL
                .into_iter()
                .filter(|s| !s.is_terminal())
                .map(OrderStatus::as_str),
        ))
}

/// Most recently touched first
pub fn newest_first() -> [OrderBy<OrderColumn>; 2] {
    [
        OrderBy::new(OrderColumn::UpdatedAt, SortDirection::Desc),
        OrderBy::new(OrderColumn::Id, SortDirection::Desc),
    ]
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
