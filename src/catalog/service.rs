//! Catalog listing

use super::model::{Product, ProductColumn, ProductStatus};
use crate::accounts::service::resolve_user;
use crate::config::EngineConfig;
use crate::core::error::{OrderResult, infra};
use crate::core::predicate::{Clause, Comparison, Group, OrderBy};
use crate::core::query::{Page, Pagination, Projection, SortDirection, Window};
use crate::core::service::{ProductStore, UserStore};
use crate::core::store::bounded;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LIST_FAILED: &str = "we're having issues retrieving products. please try again later";

/// Catalog listing filter; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub product_id: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Honoured for administrators only
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Matched against name or description
    pub search: Option<String>,

    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub paginate: bool,
}

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
    users: Arc<dyn UserStore>,
    config: EngineConfig,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            products,
            users,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// List products; non-administrators only ever see published ones
    pub async fn products(&self, user_id: &str, filter: ProductFilter) -> OrderResult<Page<Product>> {
        const OP: &str = "products";
        let timeout = self.config.query_timeout();

        let user = resolve_user(self.users.as_ref(), timeout, user_id, OP, LIST_FAILED).await?;
        let clause = clause(&filter, user.is_admin());

        let page = filter.page.filter(|p| *p > 0).unwrap_or(1);
        let window = Window::page(page, filter.limit.unwrap_or(0), self.config.page_limit);
        let sort = [
            OrderBy::new(ProductColumn::UpdatedAt, SortDirection::Desc),
            OrderBy::new(ProductColumn::Id, SortDirection::Desc),
        ];

        let list = async {
            bounded(
                timeout,
                self.products
                    .find_many(&clause, window, &sort, Projection::Full),
            )
            .await
            .map_err(infra(OP, "find_many", LIST_FAILED))
        };
        let total = async {
            if !filter.paginate {
                return Ok(None);
            }
            bounded(timeout, self.products.count(&clause))
                .await
                .map(Some)
                .map_err(infra(OP, "count", LIST_FAILED))
        };
        let (data, total) = futures::try_join!(list, total)?;
        let pagination = total.map(|total| Pagination::new(page, window.limit, total));

        Ok(Page { data, pagination })
    }
}

fn clause(filter: &ProductFilter, admin: bool) -> Clause<ProductColumn> {
    let mut equal = Group::all(Comparison::Equal);
    let mut from = Group::all(Comparison::GreaterThanOrEqual);
    let mut to = Group::all(Comparison::LessThanOrEqual);
    let mut search = Group::any(Comparison::ILike);

    if admin {
        if let Some(status) = non_empty(&filter.status) {
            equal.push(ProductColumn::Status, status);
        }
    } else {
        equal.push(ProductColumn::Status, ProductStatus::Published.as_str());
    }
    if let Some(id) = non_empty(&filter.product_id) {
        equal.push(ProductColumn::Id, id);
    }

    if let Some(min) = filter.min_amount {
        from.push(ProductColumn::Price, min);
    }
    if let Some(max) = filter.max_amount {
        to.push(ProductColumn::Price, max);
    }
    if let Some(start) = filter.start_date {
        from.push(ProductColumn::CreatedAt, start);
    }
    if let Some(end) = filter.end_date {
        to.push(ProductColumn::CreatedAt, end);
    }

    if let Some(term) = non_empty(&filter.search) {
        let pattern = format!("%{}%", escape_like(term));
        search.push(ProductColumn::Name, pattern.clone());
        search.push(ProductColumn::Description, pattern);
    }

    Clause::all().group(equal).group(from).group(to).group(search)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Escape pattern metacharacters so a search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
