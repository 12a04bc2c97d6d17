//! Inventory item aggregate and its write-side inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ItemId;

/// A stocked inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    /// Item identifier.
    pub id: ItemId,
    /// Stock keeping unit, unique across all items.
    pub sku: String,
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Units currently in stock.
    pub quantity: i32,
    /// Unit price.
    pub price: f64,
    /// Item-specific low stock threshold. When absent, the global threshold
    /// supplied by the analytics query applies.
    pub low_stock_threshold: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Builds a freshly created item from validated input.
    #[must_use]
    pub fn new(id: ItemId, input: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            sku: input.sku,
            name: input.name,
            description: input.description,
            quantity: input.quantity,
            price: input.price,
            low_stock_threshold: input.low_stock_threshold,
            created_at: now,
            updated_at: now,
        }
    }

    /// Value of the units in stock (`quantity * price`).
    #[must_use]
    pub fn stock_value(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }

    /// Returns `true` when the quantity is at or below the item's own
    /// threshold, or `global_threshold` if the item has none.
    #[must_use]
    pub fn is_low_stock(&self, global_threshold: i32) -> bool {
        self.quantity <= self.low_stock_threshold.unwrap_or(global_threshold)
    }
}

/// Validated input for item creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    /// Stock keeping unit.
    pub sku: String,
    /// Item name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial quantity.
    pub quantity: i32,
    /// Unit price.
    pub price: f64,
    /// Optional per-item low stock threshold.
    pub low_stock_threshold: Option<i32>,
}

/// A partial update. `None` leaves the field untouched.
///
/// A description can be replaced (including with an empty string) but not
/// removed, and likewise for the low stock threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    /// New SKU.
    pub sku: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New absolute quantity.
    pub quantity: Option<i32>,
    /// New unit price.
    pub price: Option<f64>,
    /// New per-item low stock threshold.
    pub low_stock_threshold: Option<i32>,
}

impl ItemChanges {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.quantity.is_none()
            && self.price.is_none()
            && self.low_stock_threshold.is_none()
    }

    /// Drops every field whose requested value equals the current one, so
    /// only real modifications reach the store.
    #[must_use]
    pub fn relative_to(self, current: &Item) -> Self {
        Self {
            sku: self.sku.filter(|sku| *sku != current.sku),
            name: self.name.filter(|name| *name != current.name),
            description: self
                .description
                .filter(|d| current.description.as_deref() != Some(d.as_str())),
            quantity: self.quantity.filter(|q| *q != current.quantity),
            price: self.price.filter(|p| *p != current.price),
            low_stock_threshold: self
                .low_stock_threshold
                .filter(|t| current.low_stock_threshold != Some(*t)),
        }
    }

    /// Applies the set fields onto `item` and stamps `updated_at`.
    pub fn apply_to(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(sku) = &self.sku {
            item.sku.clone_from(sku);
        }
        if let Some(name) = &self.name {
            item.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(threshold) = self.low_stock_threshold {
            item.low_stock_threshold = Some(threshold);
        }
        item.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Item {
        Item::new(
            ItemId::new(),
            NewItem {
                sku: "SKU-1".to_string(),
                name: "Widget".to_string(),
                description: None,
                quantity: 10,
                price: 2.5,
                low_stock_threshold: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn stock_value_multiplies_quantity_and_price() {
        assert!((sample().stock_value() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn low_stock_prefers_item_threshold() {
        let mut item = sample();
        assert!(!item.is_low_stock(5));
        assert!(item.is_low_stock(10));

        item.low_stock_threshold = Some(12);
        assert!(item.is_low_stock(5));
    }

    #[test]
    fn relative_to_drops_unchanged_fields() {
        let item = sample();
        let changes = ItemChanges {
            sku: Some("SKU-1".to_string()),
            name: Some("Gadget".to_string()),
            quantity: Some(10),
            price: Some(2.5),
            ..ItemChanges::default()
        }
        .relative_to(&item);

        assert_eq!(changes.name.as_deref(), Some("Gadget"));
        assert!(changes.sku.is_none());
        assert!(changes.quantity.is_none());
        assert!(changes.price.is_none());
    }

    #[test]
    fn identical_request_is_empty() {
        let item = sample();
        let changes = ItemChanges {
            quantity: Some(item.quantity),
            ..ItemChanges::default()
        }
        .relative_to(&item);
        assert!(changes.is_empty());
    }

    #[test]
    fn apply_sets_fields_and_timestamp() {
        let mut item = sample();
        let before = item.updated_at;
        let changes = ItemChanges {
            quantity: Some(3),
            description: Some(String::new()),
            ..ItemChanges::default()
        };
        changes.apply_to(&mut item, before + chrono::Duration::seconds(1));

        assert_eq!(item.quantity, 3);
        assert_eq!(item.description.as_deref(), Some(""));
        assert!(item.updated_at > before);
    }
}
