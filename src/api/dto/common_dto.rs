//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::Page;

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

impl PaginationMeta {
    /// Builds the response metadata for `page` out of `total` items.
    #[must_use]
    pub fn new(page: Page, total: u64) -> Self {
        let per_page = u64::from(page.per_page.max(1));
        Self {
            page: page.page,
            per_page: page.per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}
