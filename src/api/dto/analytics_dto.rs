//! DTOs for analytics endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Response body for `GET /api/v1/analytics/stock-value`.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct StockValueResponse {
    /// Sum of `quantity * price` over all items.
    pub total_value: f64,
}

/// Query parameters for `GET /api/v1/analytics/low-stock`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockParams {
    /// Threshold for items without their own (default 5).
    pub global_threshold: Option<i32>,
}

/// Query parameters for `GET /api/v1/analytics/most-valuable`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MostValuableParams {
    /// Number of items to return (default 5, max 50).
    pub limit: Option<i64>,
}
