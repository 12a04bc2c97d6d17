//! Database row models.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Item, ItemId};

/// A row of the `items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    /// Primary key.
    pub id: Uuid,
    /// Unique SKU.
    pub sku: String,
    /// Item name.
    pub name: String,
    /// Nullable description.
    pub description: Option<String>,
    /// Units in stock.
    pub quantity: i32,
    /// Unit price (`DOUBLE PRECISION`).
    pub price: f64,
    /// Nullable per-item threshold.
    pub low_stock_threshold: Option<i32>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemId::from_uuid(row.id),
            sku: row.sku,
            name: row.name,
            description: row.description,
            quantity: row.quantity,
            price: row.price,
            low_stock_threshold: row.low_stock_threshold,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
