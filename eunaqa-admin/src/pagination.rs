//! Pagination utilities for the control-panel listings

use serde::Serialize;

/// Default page size when the request does not name one
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on the requested page size
pub const MAX_LIMIT: i64 = 200;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Page size after clamping
    pub limit: i64,
    /// Total number of rows in the result set
    pub total: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    #[serde(skip)]
    pub offset: i64,
}

/// Calculate pagination metadata from total results and the requested
/// page/limit, clamping both into valid bounds.
pub fn calculate_pagination(total: i64, requested_page: i64, requested_limit: Option<i64>) -> Pagination {
    let limit = requested_limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let total_pages = (total + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total,
        total_pages,
        offset,
    }
}
