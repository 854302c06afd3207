//! Listing windows, sorting and pagination utilities

use serde::{Deserialize, Serialize};

/// Page size used when a listing does not ask for one
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// A LIMIT/OFFSET window. Zero means unbounded for either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

impl Window {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// An unbounded window
    pub fn all() -> Self {
        Self::default()
    }

    /// Window for a 1-based page number
    ///
    /// Non-positive `page` or `limit` fall back to the first page and
    /// `default_limit`. An offset past `i64::MAX` saturates, so far-away pages
    /// come back empty.
    pub fn page(page: i64, limit: i64, default_limit: i64) -> Self {
        let limit = if limit > 0 { limit } else { default_limit };
        let page = page.max(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// Apply the window to an already sorted collection
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = if self.offset > 0 {
            usize::try_from(self.offset).unwrap_or(usize::MAX)
        } else {
            0
        };
        let rows = rows.into_iter().skip(offset);
        match usize::try_from(self.limit) {
            Ok(limit) if limit > 0 => rows.take(limit).collect(),
            _ => rows.collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Which columns a lookup loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Only the identifying columns (`id`, `user_id`)
    Identity,
    /// Every column
    #[default]
    Full,
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page number (starts at 1)
    pub page: i64,

    /// Number of items per page
    pub limit: i64,

    /// Total number of items matching the filter
    pub total: i64,

    /// Total number of pages
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        // Guard the division; a zero limit never reaches here from a listing
        let divisor = limit.max(1);
        let pages = if total <= 0 {
            0
        } else {
            (total + divisor - 1) / divisor
        };

        Self {
            page: page.max(1),
            limit,
            total,
            pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// A listing result with optional pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}
