//! Inventory error types with HTTP status code mapping.
//!
//! [`InventoryError`] is the central error type for the REST API. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response. Realtime failures never reach this type: they are terminal to
//! the single WebSocket connection involved (see [`crate::ws::RealtimeError`]).

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{FieldErrors, ItemId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1003,
///     "message": "input validation failed",
///     "details": { "sku": "is required" }
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`InventoryError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details, e.g. per-field validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 422        |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Stock-Specific  | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Malformed request (bad JSON, wrong types).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Path parameter is not a valid item UUID.
    #[error("invalid item ID format: {0}")]
    InvalidItemId(String),

    /// One or more fields failed validation.
    #[error("input validation failed: {0}")]
    Validation(FieldErrors),

    /// Item with the given ID was not found.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// Another item already uses this SKU.
    #[error("item with SKU {0} already exists")]
    SkuAlreadyExists(String),

    /// A stock adjustment would drive the quantity below zero.
    #[error("insufficient stock for item {item_id}: {available} available, adjustment {delta}")]
    InsufficientStock {
        /// Item being adjusted.
        item_id: ItemId,
        /// Quantity currently in stock.
        available: i32,
        /// Requested relative change.
        delta: i32,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl InventoryError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidItemId(_) => 1002,
            Self::Validation(_) => 1003,
            Self::ItemNotFound(_) => 2001,
            Self::SkuAlreadyExists(_) => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::InsufficientStock { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidItemId(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) | Self::InsufficientStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::ItemNotFound(_) => StatusCode::NOT_FOUND,
            Self::SkuAlreadyExists(_) => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(fields) => serde_json::to_value(fields).ok(),
            Self::InsufficientStock {
                available, delta, ..
            } => Some(serde_json::json!({ "available": available, "delta": delta })),
            _ => None,
        }
    }
}

impl From<JsonRejection> for InventoryError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<FieldErrors> for InventoryError {
    fn from(fields: FieldErrors) -> Self {
        Self::Validation(fields)
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // Storage details stay in the log, not in the response.
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let message = match &self {
            Self::PersistenceError(_) | Self::Internal(_) => {
                "an unexpected internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_line_up() {
        let not_found = InventoryError::ItemNotFound(ItemId::new());
        assert_eq!(not_found.error_code(), 2001);
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict = InventoryError::SkuAlreadyExists("SKU-1".to_string());
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let bad_id = InventoryError::InvalidItemId("nope".to_string());
        assert_eq!(bad_id.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_carries_field_details() {
        let mut fields = FieldErrors::new();
        fields.add("sku", "is required");
        let err = InventoryError::from(fields);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let Some(details) = err.details() else {
            panic!("validation errors must carry details");
        };
        assert_eq!(
            details.get("sku").and_then(|v| v.as_str()),
            Some("is required")
        );
    }

    #[test]
    fn server_errors_hide_internals() {
        let response =
            InventoryError::PersistenceError("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
