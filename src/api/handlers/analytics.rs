//! Analytics handlers: stock value, low stock, most valuable.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{LowStockParams, MostValuableParams, StockValueResponse};
use crate::app_state::AppState;
use crate::domain::Item;
use crate::error::{ErrorResponse, InventoryError};

/// `GET /analytics/stock-value`: total value of all stock.
///
/// # Errors
///
/// Returns [`InventoryError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/stock-value",
    tag = "Analytics",
    summary = "Total stock value",
    description = "Sum of quantity times price over all items.",
    responses(
        (status = 200, description = "Total stock value", body = StockValueResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn stock_value(
    State(state): State<AppState>,
) -> Result<Json<StockValueResponse>, InventoryError> {
    let total_value = state.analytics_service.total_stock_value().await?;
    Ok(Json(StockValueResponse { total_value }))
}

/// `GET /analytics/low-stock`: items at or below their threshold.
///
/// # Errors
///
/// Returns [`InventoryError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/low-stock",
    tag = "Analytics",
    summary = "Low stock items",
    description = "Items whose quantity is at or below their own threshold, or the global one when they have none. Lowest quantity first.",
    params(LowStockParams),
    responses(
        (status = 200, description = "Low stock items", body = Vec<Item>),
    )
)]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Vec<Item>>, InventoryError> {
    let items = state
        .analytics_service
        .low_stock(params.global_threshold)
        .await?;
    Ok(Json(items))
}

/// `GET /analytics/most-valuable`: items ranked by stock value.
///
/// # Errors
///
/// Returns [`InventoryError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/most-valuable",
    tag = "Analytics",
    summary = "Most valuable items",
    params(MostValuableParams),
    responses(
        (status = 200, description = "Items by descending stock value", body = Vec<Item>),
    )
)]
pub async fn most_valuable(
    State(state): State<AppState>,
    Query(params): Query<MostValuableParams>,
) -> Result<Json<Vec<Item>>, InventoryError> {
    Ok(Json(
        state.analytics_service.most_valuable(params.limit).await?,
    ))
}

/// Analytics routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/stock-value", get(stock_value))
        .route("/analytics/low-stock", get(low_stock))
        .route("/analytics/most-valuable", get(most_valuable))
}
