//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::ItemStore;
use crate::service::{AnalyticsService, ItemService};
use crate::ws::{ConnectionConfig, HubHandle};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Item CRUD and stock adjustments.
    pub item_service: Arc<ItemService>,
    /// Aggregate queries.
    pub analytics_service: Arc<AnalyticsService>,
    /// Stock update hub, for WebSocket upgrades and statistics.
    pub hub: HubHandle,
    /// Timings applied to every new WebSocket connection.
    pub connection_config: ConnectionConfig,
}

impl AppState {
    /// Wires the services over `store` and `hub`.
    #[must_use]
    pub fn new(store: ItemStore, hub: HubHandle, connection_config: ConnectionConfig) -> Self {
        Self {
            item_service: Arc::new(ItemService::new(store.clone(), hub.clone())),
            analytics_service: Arc::new(AnalyticsService::new(store)),
            hub,
            connection_config,
        }
    }
}
