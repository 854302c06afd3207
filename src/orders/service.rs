//! Order lifecycle operations
//!
//! Every operation runs inside its own [`TransactionScope`]: the scope is
//! committed only on the success path, and any early return rolls it back.
//! Store failures are classified once, where they happen. A missing row
//! becomes a domain message. Anything else is logged and surfaced as the
//! operation's generic "try again later" message.

use super::filter;
use super::invoice;
use super::model::{HistoryEntry, InvoiceLine, Order, OrderColumn, OrderStatus};
use super::payload::{CancelOrder, InitiateOrder, MAX_ORDER_ITEMS, OrderFilter, UpdateOrder};
use crate::accounts::service::resolve_user;
use crate::catalog::model::{ProductColumn, ProductStatus};
use crate::config::EngineConfig;
use crate::core::error::{OrderError, OrderResult, StoreError, infra};
use crate::core::identity::{Clock, Hasher, IdGenerator, Sha256Hasher, SystemClock, UuidGenerator};
use crate::core::predicate::{Assignments, Clause, Comparison, Group, OrderBy};
use crate::core::query::{Page, Pagination, Projection, SortDirection, Window};
use crate::core::service::{OrderStore, ProductStore, UserStore};
use crate::core::store::bounded;
use crate::core::transaction::TransactionScope;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const NO_ITEMS: &str = "you need to select at least one product to order";
const TOO_MANY_ITEMS: &str = "you can only purchase up to 100 products at a time";
const PRODUCT_ID_REQUIRED: &str = "product id is required";
const DUPLICATE_PRODUCT: &str = "each product can only be selected once";
const PRODUCTS_UNAVAILABLE: &str =
    "some of the selected products are no longer available. please refresh and try again";
const QUANTITY_REQUIRED: &str = "item quantity is required";
const ORDER_ID_REQUIRED: &str = "order id is required";
const ORDER_NOT_FOUND: &str = "order not found";
const ALREADY_CANCELLED: &str = "order has already been cancelled";
const NOT_CANCELLABLE: &str = "order cannot be cancelled";
const ADMIN_ONLY: &str = "you do not have the permission to access this feature";
const INVALID_TARGET: &str = "order can either be completed, approved, rejected or cancelled";
const NOT_UPDATABLE: &str = "order can no longer be updated";

const INITIATE_FAILED: &str = "we're having issues initiating order. please try again later";
const CHECKOUT_FAILED: &str =
    "we're having issues checking out those products. please try again later";
const CANCEL_FAILED: &str = "we're having issues cancelling the order. please try again later";
const UPDATE_FAILED: &str = "we're having issues updating the order. please try again later";
const LIST_FAILED: &str = "we're having issues retrieving orders. please try again later";

const INITIATED_ACTION: &str = "Initiated product(s) purchase";
const INITIATED_REMARK: &str = "Product(s) purchase";
const CANCELLED_ACTION: &str = "Cancelled order";
const CANCELLED_REMARK: &str = "Order cancelled";

/// Order lifecycle: initiate, cancel, administrative update and listing
pub struct OrderService<O: OrderStore> {
    orders: Arc<O>,
    products: Arc<dyn ProductStore>,
    users: Arc<dyn UserStore>,
    ids: Arc<dyn IdGenerator>,
    hasher: Arc<dyn Hasher>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<O: OrderStore> Clone for OrderService<O> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            products: self.products.clone(),
            users: self.users.clone(),
            ids: self.ids.clone(),
            hasher: self.hasher.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<O: OrderStore> OrderService<O> {
    pub fn new(
        orders: Arc<O>,
        products: Arc<dyn ProductStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            orders,
            products,
            users,
            ids: Arc::new(UuidGenerator),
            hasher: Arc::new(Sha256Hasher),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn Hasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.query_timeout()
    }

    /// Turn a cart into a pending order
    ///
    /// Resubmitting an unchanged cart while the earlier order is still open
    /// returns that order instead of creating another.
    pub async fn initiate_order(&self, user_id: &str, payload: InitiateOrder) -> OrderResult<Order> {
        const OP: &str = "initiate_order";

        if payload.items.is_empty() {
            return Err(OrderError::validation(NO_ITEMS));
        }
        if payload.items.len() > MAX_ORDER_ITEMS {
            return Err(OrderError::validation(TOO_MANY_ITEMS));
        }

        let timeout = self.timeout();
        let mut scope = bounded(timeout, TransactionScope::begin(self.orders.as_ref(), OP))
            .await
            .map_err(infra(OP, "begin", INITIATE_FAILED))?;

        let user = resolve_user(self.users.as_ref(), timeout, user_id, OP, INITIATE_FAILED).await?;

        let mut seen = HashSet::with_capacity(payload.items.len());
        let mut requested = Vec::with_capacity(payload.items.len());
        for item in &payload.items {
            if item.product_id.trim().is_empty() {
                return Err(OrderError::validation(PRODUCT_ID_REQUIRED));
            }
            if !seen.insert(item.product_id.as_str()) {
                return Err(OrderError::conflict(DUPLICATE_PRODUCT));
            }
            requested.push(item.product_id.as_str());
        }

        let clause = Clause::all()
            .group(Group::all(Comparison::In).with_set(ProductColumn::Id, requested.iter().copied()))
            .group(
                Group::all(Comparison::Equal)
                    .with(ProductColumn::Status, ProductStatus::Published.as_str()),
            );
        let by_id = [OrderBy::new(ProductColumn::Id, SortDirection::Asc)];
        let products = bounded(
            timeout,
            self.products
                .find_many(&clause, Window::all(), &by_id, Projection::Full),
        )
        .await
        .map_err(infra(OP, "find_products", CHECKOUT_FAILED))?;

        if products.len() != requested.len() {
            debug!(
                user_id,
                requested = requested.len(),
                available = products.len(),
                "cart references unavailable products"
            );
            return Err(OrderError::conflict(PRODUCTS_UNAVAILABLE));
        }

        let mut lines = Vec::with_capacity(products.len());
        for product in &products {
            for item in payload.items.iter().filter(|i| i.product_id == product.id) {
                if item.quantity <= 0 {
                    return Err(OrderError::validation(QUANTITY_REQUIRED));
                }
                if item.quantity > product.stock {
                    return Err(OrderError::validation(format!(
                        "requested quantity for product '{}' exceeds available stock",
                        product.name
                    )));
                }
                lines.push(InvoiceLine {
                    key: product.id.clone(),
                    name: product.name.clone(),
                    amount: product.price,
                    quantity: item.quantity,
                });
            }
        }

        let checksum = invoice::checksum(&lines, self.hasher.as_ref())
            .map_err(|e| infra(OP, "checksum", INITIATE_FAILED)(e.into()))?;

        match bounded(
            timeout,
            self.orders
                .find_one(&filter::duplicate_of(&checksum, &user), Projection::Full),
        )
        .await
        {
            Ok(existing) => {
                info!(order_id = %existing.id, user_id, "returning existing order for unchanged cart");
                scope
                    .commit()
                    .await
                    .map_err(infra(OP, "commit", INITIATE_FAILED))?;
                return Ok(existing);
            }
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(infra(OP, "find_duplicate", INITIATE_FAILED)(err)),
        }

        let now = self.clock.now();
        let order = Order {
            id: self.ids.new_id(),
            user_id: user.id.clone(),
            status: OrderStatus::Pending,
            reference: self.ids.new_reference(&self.config.app_name),
            checksum,
            history: vec![HistoryEntry::new(INITIATED_ACTION, &user.id, now)],
            amount: invoice::total(&lines),
            product_id: (lines.len() == 1).then(|| lines[0].key.clone()),
            invoice: lines,
            remark: INITIATED_REMARK.to_string(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        let values = order
            .insert_assignments()
            .map_err(infra(OP, "encode", INITIATE_FAILED))?;
        let tx = scope.tx().map_err(infra(OP, "insert", INITIATE_FAILED))?;
        bounded(timeout, self.orders.insert(tx, &values))
            .await
            .map_err(infra(OP, "insert", INITIATE_FAILED))?;

        scope
            .commit()
            .await
            .map_err(infra(OP, "commit", INITIATE_FAILED))?;

        info!(order_id = %order.id, user_id, amount = order.amount, "order initiated");
        Ok(order)
    }

    /// Cancel one of the requester's pending orders
    ///
    /// With `cancel == false` the order is returned unchanged.
    pub async fn cancel_order(&self, user_id: &str, payload: CancelOrder) -> OrderResult<Order> {
        const OP: &str = "cancel_order";

        let timeout = self.timeout();
        let mut scope = bounded(timeout, TransactionScope::begin(self.orders.as_ref(), OP))
            .await
            .map_err(infra(OP, "begin", CANCEL_FAILED))?;

        let user = resolve_user(self.users.as_ref(), timeout, user_id, OP, CANCEL_FAILED).await?;

        let order_id = payload.order_id.trim();
        if order_id.is_empty() {
            return Err(OrderError::validation(ORDER_ID_REQUIRED));
        }

        let target = Clause::all().group(
            Group::all(Comparison::Equal)
                .with(OrderColumn::Id, order_id)
                .with(OrderColumn::UserId, &user.id),
        );
        let tx = scope.tx().map_err(infra(OP, "lock", CANCEL_FAILED))?;
        let order = lookup(
            bounded(
                timeout,
                self.orders.find_one_locked(tx, &target, Projection::Full),
            )
            .await,
            OP,
            CANCEL_FAILED,
        )?;

        if !payload.cancel {
            scope
                .commit()
                .await
                .map_err(infra(OP, "commit", CANCEL_FAILED))?;
            return Ok(order);
        }

        if order.cancelled {
            return Err(OrderError::conflict(ALREADY_CANCELLED));
        }
        if order.status != OrderStatus::Pending {
            return Err(OrderError::conflict(NOT_CANCELLABLE));
        }

        let now = self.clock.now();
        let history = serde_json::to_value(vec![HistoryEntry::new(CANCELLED_ACTION, &user.id, now)])
            .map_err(|e| infra(OP, "encode", CANCEL_FAILED)(e.into()))?;
        let changes = Assignments::new()
            .set(OrderColumn::Cancelled, true)
            .set(OrderColumn::CancelledAt, now)
            .set(OrderColumn::Status, OrderStatus::Cancelled.as_str())
            .set(OrderColumn::Remark, CANCELLED_REMARK)
            .append(OrderColumn::History, history)
            .set(OrderColumn::UpdatedAt, now)
            .returning_all();

        let tx = scope.tx().map_err(infra(OP, "update", CANCEL_FAILED))?;
        let updated = lookup(
            bounded(timeout, self.orders.update_locked(tx, &target, &changes))
                .await
                .and_then(|row| row.ok_or(StoreError::NotFound)),
            OP,
            CANCEL_FAILED,
        )?;

        scope
            .commit()
            .await
            .map_err(infra(OP, "commit", CANCEL_FAILED))?;

        info!(order_id = %updated.id, user_id, "order cancelled");
        Ok(updated)
    }

    /// Move a pending order to a new status; administrators only
    pub async fn update_order(&self, user_id: &str, payload: UpdateOrder) -> OrderResult<Order> {
        const OP: &str = "update_order";

        let timeout = self.timeout();
        let mut scope = bounded(timeout, TransactionScope::begin(self.orders.as_ref(), OP))
            .await
            .map_err(infra(OP, "begin", UPDATE_FAILED))?;

        let user = resolve_user(self.users.as_ref(), timeout, user_id, OP, UPDATE_FAILED).await?;
        if !user.is_admin() {
            warn!(user_id, "non-admin attempted an order update");
            return Err(OrderError::permission(ADMIN_ONLY));
        }

        let order_id = payload.order_id.trim();
        if order_id.is_empty() {
            return Err(OrderError::validation(ORDER_ID_REQUIRED));
        }

        let target = Clause::eq(OrderColumn::Id, order_id);
        let tx = scope.tx().map_err(infra(OP, "lock", UPDATE_FAILED))?;
        let order = lookup(
            bounded(
                timeout,
                self.orders.find_one_locked(tx, &target, Projection::Full),
            )
            .await,
            OP,
            UPDATE_FAILED,
        )?;

        if order.cancelled {
            return Err(OrderError::conflict(ALREADY_CANCELLED));
        }

        let status = payload
            .status
            .trim()
            .parse::<OrderStatus>()
            .ok()
            .filter(|s| OrderStatus::ADMIN_TARGETS.contains(s))
            .ok_or_else(|| OrderError::validation(INVALID_TARGET))?;

        if order.status != OrderStatus::Pending {
            return Err(OrderError::conflict(NOT_UPDATABLE));
        }

        let now = self.clock.now();
        let history = serde_json::to_value(vec![HistoryEntry::new(
            format!("Updated order status to {status}"),
            &user.id,
            now,
        )])
        .map_err(|e| infra(OP, "encode", UPDATE_FAILED)(e.into()))?;

        let mut changes = Assignments::new()
            .set(OrderColumn::Status, status.as_str())
            .set(
                OrderColumn::Remark,
                format!("Order {}", status.as_str().to_lowercase()),
            );
        if status == OrderStatus::Cancelled {
            changes = changes
                .set(OrderColumn::Cancelled, true)
                .set(OrderColumn::CancelledAt, now);
        }
        let changes = changes
            .append(OrderColumn::History, history)
            .set(OrderColumn::UpdatedAt, now)
            .returning_all();

        let tx = scope.tx().map_err(infra(OP, "update", UPDATE_FAILED))?;
        let updated = lookup(
            bounded(timeout, self.orders.update_locked(tx, &target, &changes))
                .await
                .and_then(|row| row.ok_or(StoreError::NotFound)),
            OP,
            UPDATE_FAILED,
        )?;

        scope
            .commit()
            .await
            .map_err(infra(OP, "commit", UPDATE_FAILED))?;

        info!(order_id = %updated.id, admin_id = user_id, %status, "order status updated");
        Ok(updated)
    }

    /// List orders visible to the requester, newest first
    pub async fn orders(&self, user_id: &str, filter: OrderFilter) -> OrderResult<Page<Order>> {
        const OP: &str = "orders";

        let timeout = self.timeout();
        let user = resolve_user(self.users.as_ref(), timeout, user_id, OP, LIST_FAILED).await?;

        let clause = filter::clause(&filter, &user);
        let page = filter.page.filter(|p| *p > 0).unwrap_or(1);
        let window = Window::page(
            page,
            filter.limit.unwrap_or(0),
            self.config.page_limit,
        );

        let sort = filter::newest_first();
        let list = async {
            bounded(
                timeout,
                self.orders
                    .find_many(&clause, window, &sort, Projection::Full),
            )
            .await
            .map_err(infra(OP, "find_many", LIST_FAILED))
        };
        let total = async {
            if !filter.paginate {
                return Ok(None);
            }
            bounded(timeout, self.orders.count(&clause))
                .await
                .map(Some)
                .map_err(infra(OP, "count", LIST_FAILED))
        };
        let (data, total) = futures::try_join!(list, total)?;
        let pagination = total.map(|total| Pagination::new(page, window.limit, total));

        debug!(user_id, returned = data.len(), "orders listed");
        Ok(Page { data, pagination })
    }
}

/// Classify the result of a row lookup
fn lookup(
    result: Result<Order, StoreError>,
    operation: &'static str,
    message: &'static str,
) -> OrderResult<Order> {
    match result {
        Ok(order) => Ok(order),
        Err(StoreError::NotFound) => Err(OrderError::not_found(ORDER_NOT_FOUND)),
        Err(err) => Err(infra(operation, "lookup", message)(err)),
    }
}
