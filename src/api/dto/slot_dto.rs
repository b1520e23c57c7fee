//! Slot DTOs for provider calendar endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use crate::domain::Slot;
use crate::persistence::Page;

/// Request body for `POST /providers/{id}/slots` and `PATCH /slots/{id}`.
///
/// Both instants are truncated to the start of their hour.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SlotTimeRequest {
    /// Requested start (RFC 3339).
    pub start: DateTime<Utc>,
    /// Requested end (RFC 3339).
    pub end: DateTime<Utc>,
}

/// Query parameters for `GET /providers/{id}/slots`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotListParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Only future `available` slots.
    #[serde(default)]
    pub open_only: bool,
}

impl SlotListParams {
    /// Page selector with clamped bounds.
    #[must_use]
    pub fn page(&self) -> Page {
        Page {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Response body for `GET /providers/{id}/slots`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotListResponse {
    /// Slots on this page, by start time.
    pub data: Vec<Slot>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_are_clamped() {
        let params = SlotListParams {
            page: 0,
            per_page: 1_000,
            open_only: false,
        };
        assert_eq!(params.page(), Page { page: 1, per_page: 100 });
    }
}
