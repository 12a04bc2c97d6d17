//! Service layer: business logic orchestration.
//!
//! [`ItemService`] runs item CRUD against the [`crate::persistence::ItemStore`]
//! and announces committed quantity changes through the
//! [`crate::ws::HubHandle`]. [`AnalyticsService`] answers aggregate queries.

pub mod analytics_service;
pub mod item_service;

pub use analytics_service::AnalyticsService;
pub use item_service::{ItemPage, ItemService};
