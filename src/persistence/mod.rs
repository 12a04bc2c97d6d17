//! Persistence layer: the `items` table.
//!
//! [`ItemStore`] dispatches to PostgreSQL (`sqlx::PgPool`) or to an
//! in-memory map when persistence is disabled. Both back ends enforce SKU
//! uniqueness and never let a stock adjustment drive a quantity below zero.

pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

pub use memory::MemoryItemStore;
pub use postgres::PostgresItemStore;

use crate::domain::{Item, ItemChanges, ItemId};
use crate::error::InventoryError;

/// Explains why `delta` could not be applied to `item`.
pub(crate) fn adjustment_error(item: &Item, delta: i32) -> InventoryError {
    if i64::from(item.quantity) + i64::from(delta) < 0 {
        InventoryError::InsufficientStock {
            item_id: item.id,
            available: item.quantity,
            delta,
        }
    } else {
        InventoryError::InvalidRequest(format!(
            "adjustment of {delta} would overflow the quantity of item {}",
            item.id
        ))
    }
}

/// Item storage back end.
#[derive(Debug, Clone)]
pub enum ItemStore {
    /// PostgreSQL via `sqlx`.
    Postgres(PostgresItemStore),
    /// Process-local map.
    Memory(Arc<MemoryItemStore>),
}

impl ItemStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryItemStore::new()))
    }

    /// Short name of the back end, for logs.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::SkuAlreadyExists`] on a duplicate SKU.
    pub async fn create(&self, item: &Item) -> Result<Item, InventoryError> {
        match self {
            Self::Postgres(store) => store.create(item).await,
            Self::Memory(store) => store.create(item).await,
        }
    }

    /// Loads an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if absent.
    pub async fn get(&self, id: ItemId) -> Result<Item, InventoryError> {
        match self {
            Self::Postgres(store) => store.get(id).await,
            Self::Memory(store) => store.get(id).await,
        }
    }

    /// One page of items, newest first, plus the total item count.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Item>, u64), InventoryError> {
        match self {
            Self::Postgres(store) => store.list(page, limit).await,
            Self::Memory(store) => Ok(store.list(page, limit).await),
        }
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::SkuAlreadyExists`].
    pub async fn update(&self, id: ItemId, changes: &ItemChanges) -> Result<Item, InventoryError> {
        match self {
            Self::Postgres(store) => store.update(id, changes).await,
            Self::Memory(store) => store.update(id, changes).await,
        }
    }

    /// Atomically adds `delta` to an item's quantity.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::InsufficientStock`].
    pub async fn adjust_quantity(&self, id: ItemId, delta: i32) -> Result<Item, InventoryError> {
        match self {
            Self::Postgres(store) => store.adjust_quantity(id, delta).await,
            Self::Memory(store) => store.adjust_quantity(id, delta).await,
        }
    }

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if absent.
    pub async fn delete(&self, id: ItemId) -> Result<(), InventoryError> {
        match self {
            Self::Postgres(store) => store.delete(id).await,
            Self::Memory(store) => store.delete(id).await,
        }
    }

    /// Sum of `quantity * price` over all items.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn total_stock_value(&self) -> Result<f64, InventoryError> {
        match self {
            Self::Postgres(store) => store.total_stock_value().await,
            Self::Memory(store) => Ok(store.total_stock_value().await),
        }
    }

    /// Items at or below their effective low stock threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn low_stock(&self, global_threshold: i32) -> Result<Vec<Item>, InventoryError> {
        match self {
            Self::Postgres(store) => store.low_stock(global_threshold).await,
            Self::Memory(store) => Ok(store.low_stock(global_threshold).await),
        }
    }

    /// The `limit` items with the highest stock value.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn most_valuable(&self, limit: u32) -> Result<Vec<Item>, InventoryError> {
        match self {
            Self::Postgres(store) => store.most_valuable(limit).await,
            Self::Memory(store) => Ok(store.most_valuable(limit).await),
        }
    }
}
