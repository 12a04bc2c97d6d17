//! In-memory item store, used when persistence is disabled and in tests.
//!
//! Orderings and constraints match the PostgreSQL store.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::adjustment_error;
use crate::domain::{Item, ItemChanges, ItemId};
use crate::error::InventoryError;

/// Item table held in a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<ItemId, Item>>,
}

fn by_quantity_then_name(a: &Item, b: &Item) -> Ordering {
    a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name))
}

fn by_value_desc_then_name(a: &Item, b: &Item) -> Ordering {
    b.stock_value()
        .total_cmp(&a.stock_value())
        .then_with(|| a.name.cmp(&b.name))
}

impl MemoryItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::SkuAlreadyExists`] on a duplicate SKU.
    pub async fn create(&self, item: &Item) -> Result<Item, InventoryError> {
        let mut items = self.items.write().await;
        if items.values().any(|existing| existing.sku == item.sku) {
            return Err(InventoryError::SkuAlreadyExists(item.sku.clone()));
        }
        items.insert(item.id, item.clone());
        Ok(item.clone())
    }

    /// Loads an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if absent.
    pub async fn get(&self, id: ItemId) -> Result<Item, InventoryError> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(InventoryError::ItemNotFound(id))
    }

    /// One page of items, newest first, plus the total count.
    pub async fn list(&self, page: u32, limit: u32) -> (Vec<Item>, u64) {
        let items = self.items.read().await;
        let mut all: Vec<&Item> = items.values().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.sku.cmp(&b.sku))
        });

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let skip = usize::try_from(page.saturating_sub(1))
            .unwrap_or(usize::MAX)
            .saturating_mul(limit);
        let page_items = all.into_iter().skip(skip).take(limit).cloned().collect();
        (page_items, u64::try_from(items.len()).unwrap_or(u64::MAX))
    }

    /// Applies `changes` to a stored item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::SkuAlreadyExists`].
    pub async fn update(&self, id: ItemId, changes: &ItemChanges) -> Result<Item, InventoryError> {
        let mut items = self.items.write().await;
        if let Some(sku) = &changes.sku
            && items
                .values()
                .any(|other| other.id != id && other.sku == *sku)
        {
            return Err(InventoryError::SkuAlreadyExists(sku.clone()));
        }

        let item = items
            .get_mut(&id)
            .ok_or(InventoryError::ItemNotFound(id))?;
        if !changes.is_empty() {
            changes.apply_to(item, Utc::now());
        }
        Ok(item.clone())
    }

    /// Adds `delta` to the quantity under the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::InsufficientStock`].
    pub async fn adjust_quantity(&self, id: ItemId, delta: i32) -> Result<Item, InventoryError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&id)
            .ok_or(InventoryError::ItemNotFound(id))?;

        match item.quantity.checked_add(delta) {
            Some(quantity) if quantity >= 0 => {
                item.quantity = quantity;
                item.updated_at = Utc::now();
                Ok(item.clone())
            }
            _ => Err(adjustment_error(item, delta)),
        }
    }

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if absent.
    pub async fn delete(&self, id: ItemId) -> Result<(), InventoryError> {
        self.items
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(InventoryError::ItemNotFound(id))
    }

    /// Sum of `quantity * price` over all items.
    pub async fn total_stock_value(&self) -> f64 {
        self.items.read().await.values().map(Item::stock_value).sum()
    }

    /// Low stock items, lowest quantity first.
    pub async fn low_stock(&self, global_threshold: i32) -> Vec<Item> {
        let mut low: Vec<Item> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.is_low_stock(global_threshold))
            .cloned()
            .collect();
        low.sort_by(by_quantity_then_name);
        low
    }

    /// The `limit` most valuable items.
    pub async fn most_valuable(&self, limit: u32) -> Vec<Item> {
        let mut all: Vec<Item> = self.items.read().await.values().cloned().collect();
        all.sort_by(by_value_desc_then_name);
        all.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        all
    }
}
