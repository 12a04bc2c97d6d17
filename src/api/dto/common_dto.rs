//! Shared DTO types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

/// Pagination query parameters for list endpoints.
///
/// Out-of-range values are clamped by the service rather than rejected.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 10.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    crate::service::item_service::DEFAULT_PAGE_LIMIT
}
