//! Pagination planning.
//!
//! Turns a base query into a count query and a windowed data query. Both are
//! meant to be executed with the same parameters; the planner never starts a
//! transaction of its own. A base query carrying its own ORDER BY is not
//! supported.

use crate::config::{DEFAULT_ORDER_BY, DEFAULT_PAGE_SIZE};
use crate::error::{DbError, DbResult};

/// Statements and window for one requested page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    pub count_sql: String,
    pub data_sql: String,
    /// Rows skipped before the window starts
    pub offset: u64,
    /// Effective 1-based page number
    pub page_number: u64,
    /// Effective page size
    pub page_size: u64,
}

#[derive(Debug, Clone)]
pub struct PaginationPlanner {
    default_page_size: u64,
    default_order_by: String,
}

impl PaginationPlanner {
    /// Create a planner with explicit fallbacks for page size and ordering.
    /// A fallback size of 0 uses [`DEFAULT_PAGE_SIZE`].
    pub fn new(default_page_size: u64, default_order_by: impl Into<String>) -> Self {
        let default_page_size = match default_page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size,
        };
        Self {
            default_page_size,
            default_order_by: default_order_by.into(),
        }
    }

    /// Plan a page. Page numbers below 1 become 1 and page sizes below 1 fall
    /// back to the default size.
    pub fn plan(
        &self,
        base_query: &str,
        page_number: i64,
        page_size: i64,
        order_by: Option<&str>,
    ) -> DbResult<PagePlan> {
        let base = base_query.trim().trim_end_matches(';').trim_end();
        if base.is_empty() {
            return Err(DbError::invalid_input("Base query cannot be empty"));
        }

        let page_number = if page_number < 1 { 1 } else { page_number as u64 };
        let page_size = if page_size < 1 {
            self.default_page_size
        } else {
            page_size as u64
        };
        let order_by = order_by
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(self.default_order_by.as_str());
        let offset = (page_number - 1).saturating_mul(page_size);

        Ok(PagePlan {
            count_sql: format!("SELECT COUNT(*) FROM ({}) AS page_source", base),
            data_sql: format!(
                "{} ORDER BY {} LIMIT {} OFFSET {}",
                base, order_by, page_size, offset
            ),
            offset,
            page_number,
            page_size,
        })
    }
}

impl Default for PaginationPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_ORDER_BY)
    }
}
