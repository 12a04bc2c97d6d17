//! Item CRUD handlers: create, list, get, update, adjust stock, delete.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateItemRequest, ItemListResponse, PaginationParams, StockAdjustmentRequest,
    UpdateItemRequest,
};
use crate::app_state::AppState;
use crate::domain::Item;
use crate::error::{ErrorResponse, InventoryError};

/// `POST /items`: create an item.
///
/// # Errors
///
/// Returns [`InventoryError`] on malformed or invalid input, or a duplicate
/// SKU.
#[utoipa::path(
    post,
    path = "/api/v1/items",
    tag = "Items",
    summary = "Create an item",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 409, description = "SKU already exists", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InventoryError> {
    let Json(request) = body?;
    let item = state.item_service.create(request.validate()?).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `GET /items`: list items, newest first.
///
/// # Errors
///
/// Returns [`InventoryError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/items",
    tag = "Items",
    summary = "List items",
    description = "Returns a page of items ordered by creation time, newest first.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated item list", body = ItemListResponse),
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ItemListResponse>, InventoryError> {
    let page = state.item_service.list(params.page, params.limit).await?;
    Ok(Json(page.into()))
}

/// `GET /items/{id}`: fetch one item.
///
/// # Errors
///
/// Returns [`InventoryError`] for a malformed or unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    tag = "Items",
    summary = "Get an item",
    params(("id" = String, Path, description = "Item UUID")),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 400, description = "Invalid item id", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, InventoryError> {
    Ok(Json(state.item_service.get(&id).await?))
}

/// `PUT /items/{id}`: partially update an item.
///
/// # Errors
///
/// Returns [`InventoryError`] on invalid input, unknown id or SKU conflict.
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    tag = "Items",
    summary = "Update an item",
    description = "Only the fields present in the body change. A quantity change is pushed to stock update subscribers.",
    params(("id" = String, Path, description = "Item UUID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated item", body = Item),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 409, description = "SKU already exists", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, InventoryError> {
    let Json(request) = body?;
    let item = state.item_service.update(&id, request.validate()?).await?;
    Ok(Json(item))
}

/// `POST /items/{id}/stock`: add or remove stock.
///
/// # Errors
///
/// Returns [`InventoryError`] on a zero delta, unknown id or insufficient
/// stock.
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/stock",
    tag = "Items",
    summary = "Adjust stock",
    description = "Applies a relative quantity change atomically and pushes the new quantity to stock update subscribers.",
    params(("id" = String, Path, description = "Item UUID")),
    request_body = StockAdjustmentRequest,
    responses(
        (status = 200, description = "Item after adjustment", body = Item),
        (status = 400, description = "Malformed request or zero delta", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 422, description = "Insufficient stock", body = ErrorResponse),
    )
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StockAdjustmentRequest>, JsonRejection>,
) -> Result<Json<Item>, InventoryError> {
    let Json(request) = body?;
    Ok(Json(state.item_service.adjust_stock(&id, request.delta).await?))
}

/// `DELETE /items/{id}`: delete an item.
///
/// # Errors
///
/// Returns [`InventoryError`] for a malformed or unknown id.
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    tag = "Items",
    summary = "Delete an item",
    params(("id" = String, Path, description = "Item UUID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 400, description = "Invalid item id", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, InventoryError> {
    state.item_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Item routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/{id}/stock", post(adjust_stock))
}
