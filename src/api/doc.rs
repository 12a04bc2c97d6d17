//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    CreateItemRequest, ItemListResponse, StockAdjustmentRequest, StockValueResponse,
    UpdateItemRequest,
};
use super::handlers::{analytics, items, system};
use crate::domain::{Item, ItemId};
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws::HubStats;

/// Generated OpenAPI specification, served at `/api-docs/openapi.json`
/// when the `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "stockroom",
        description = "Inventory tracking API. Quantity changes are pushed to WebSocket subscribers on `/ws/stock-updates` as `STOCK_UPDATE` frames."
    ),
    paths(
        items::create_item,
        items::list_items,
        items::get_item,
        items::update_item,
        items::adjust_stock,
        items::delete_item,
        analytics::stock_value,
        analytics::low_stock,
        analytics::most_valuable,
        system::health_handler,
        system::realtime_stats_handler,
    ),
    components(schemas(
        Item,
        ItemId,
        CreateItemRequest,
        UpdateItemRequest,
        StockAdjustmentRequest,
        ItemListResponse,
        StockValueResponse,
        HubStats,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Items", description = "Item CRUD and stock adjustments"),
        (name = "Analytics", description = "Aggregate stock queries"),
        (name = "System", description = "Health and realtime statistics"),
    )
)]
pub struct ApiDoc;
