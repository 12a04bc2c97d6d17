//! HTTP layer: REST handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! REST endpoints are mounted under `/api/v1`; health, hub statistics and
//! the stock update WebSocket live at the root.

pub mod doc;
pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete router: REST endpoints, system endpoints, the
/// WebSocket endpoint and, with the `swagger-ui` feature, the API docs.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .route("/ws/stock-updates", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", doc::ApiDoc::openapi()),
        )
    };

    router
}
