//! Analytics service: aggregate queries over the item table.

use crate::domain::Item;
use crate::error::InventoryError;
use crate::persistence::ItemStore;

/// Threshold applied to items without their own low stock threshold.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Default size of the most valuable items ranking.
pub const DEFAULT_MOST_VALUABLE_LIMIT: i64 = 5;

/// Largest allowed most valuable items ranking.
pub const MAX_MOST_VALUABLE_LIMIT: i64 = 50;

/// Read-only aggregate queries for dashboards.
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    store: ItemStore,
}

impl AnalyticsService {
    /// Creates a new `AnalyticsService`.
    #[must_use]
    pub fn new(store: ItemStore) -> Self {
        Self { store }
    }

    /// Total value of all stock (`sum(quantity * price)`).
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on storage failure.
    pub async fn total_stock_value(&self) -> Result<f64, InventoryError> {
        self.store.total_stock_value().await
    }

    /// Items at or below their low stock threshold. A missing or negative
    /// `global_threshold` falls back to [`DEFAULT_LOW_STOCK_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on storage failure.
    pub async fn low_stock(&self, global_threshold: Option<i32>) -> Result<Vec<Item>, InventoryError> {
        let threshold = global_threshold
            .filter(|t| *t >= 0)
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        self.store.low_stock(threshold).await
    }

    /// The most valuable items by stock value. Non-positive limits fall
    /// back to the default; large ones are capped.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on storage failure.
    pub async fn most_valuable(&self, limit: Option<i64>) -> Result<Vec<Item>, InventoryError> {
        self.store.most_valuable(ranking_limit(limit)).await
    }
}

fn ranking_limit(requested: Option<i64>) -> u32 {
    let limit = requested
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_MOST_VALUABLE_LIMIT)
        .min(MAX_MOST_VALUABLE_LIMIT);
    u32::try_from(limit).unwrap_or(5)
}
