//! DTOs for item endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::validation::{
    check_low_stock_threshold, check_name, check_price, check_quantity, check_sku,
};
use crate::domain::{FieldErrors, Item, ItemChanges, NewItem};
use crate::service::ItemPage;

/// Request body for `POST /api/v1/items`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    /// Unique SKU: letters, digits and dashes, at most 64 characters.
    pub sku: String,
    /// Item name, at most 255 characters.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial quantity (>= 0).
    pub quantity: i32,
    /// Unit price (>= 0).
    pub price: f64,
    /// Optional per-item low stock threshold (>= 0).
    #[serde(default)]
    pub low_stock_threshold: Option<i32>,
}

impl CreateItemRequest {
    /// Checks every field and converts into domain input.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<NewItem, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_sku(&mut errors, &self.sku);
        check_name(&mut errors, &self.name);
        check_quantity(&mut errors, self.quantity);
        check_price(&mut errors, self.price);
        if let Some(threshold) = self.low_stock_threshold {
            check_low_stock_threshold(&mut errors, threshold);
        }
        errors.into_result()?;

        Ok(NewItem {
            sku: self.sku,
            name: self.name,
            description: self.description,
            quantity: self.quantity,
            price: self.price,
            low_stock_threshold: self.low_stock_threshold,
        })
    }
}

/// Request body for `PUT /api/v1/items/{id}`. Omitted fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    /// New SKU.
    #[serde(default)]
    pub sku: Option<String>,
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New absolute quantity. Changing it notifies stock subscribers.
    #[serde(default)]
    pub quantity: Option<i32>,
    /// New unit price.
    #[serde(default)]
    pub price: Option<f64>,
    /// New per-item low stock threshold.
    #[serde(default)]
    pub low_stock_threshold: Option<i32>,
}

impl UpdateItemRequest {
    /// Checks the present fields and converts into a change set.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<ItemChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(sku) = &self.sku {
            check_sku(&mut errors, sku);
        }
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(quantity) = self.quantity {
            check_quantity(&mut errors, quantity);
        }
        if let Some(price) = self.price {
            check_price(&mut errors, price);
        }
        if let Some(threshold) = self.low_stock_threshold {
            check_low_stock_threshold(&mut errors, threshold);
        }
        errors.into_result()?;

        Ok(ItemChanges {
            sku: self.sku,
            name: self.name,
            description: self.description,
            quantity: self.quantity,
            price: self.price,
            low_stock_threshold: self.low_stock_threshold,
        })
    }
}

/// Request body for `POST /api/v1/items/{id}/stock`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct StockAdjustmentRequest {
    /// Relative quantity change; negative to take stock out.
    pub delta: i32,
}

/// Response body for `GET /api/v1/items`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemListResponse {
    /// Items on this page, newest first.
    pub items: Vec<Item>,
    /// Total number of items.
    pub total: u64,
    /// Page served.
    pub page: u32,
    /// Page size served.
    pub limit: u32,
    /// Number of pages at this page size.
    pub total_pages: u64,
}

impl From<ItemPage> for ItemListResponse {
    fn from(page: ItemPage) -> Self {
        let total_pages = page.total.div_ceil(u64::from(page.limit.max(1)));
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn valid_create() -> CreateItemRequest {
        CreateItemRequest {
            sku: "BOLT-10".to_string(),
            name: "Bolt".to_string(),
            description: Some("M10".to_string()),
            quantity: 4,
            price: 0.25,
            low_stock_threshold: Some(2),
        }
    }

    #[test]
    fn valid_create_converts() {
        let Ok(input) = valid_create().validate() else {
            panic!("request is valid");
        };
        assert_eq!(input.sku, "BOLT-10");
        assert_eq!(input.low_stock_threshold, Some(2));
    }

    #[test]
    fn create_reports_every_bad_field() {
        let request = CreateItemRequest {
            sku: "bad sku!".to_string(),
            name: "  ".to_string(),
            quantity: -1,
            price: f64::NAN,
            ..valid_create()
        };
        let Err(errors) = request.validate() else {
            panic!("request is invalid");
        };
        assert_eq!(errors.len(), 4);
        assert!(errors.get("sku").is_some());
        assert!(errors.get("price").is_some());
    }

    #[test]
    fn update_checks_only_present_fields() {
        let Ok(changes) = UpdateItemRequest {
            quantity: Some(0),
            ..UpdateItemRequest::default()
        }
        .validate() else {
            panic!("request is valid");
        };
        assert_eq!(changes.quantity, Some(0));
        assert!(changes.sku.is_none());

        let Err(errors) = UpdateItemRequest {
            low_stock_threshold: Some(-2),
            ..UpdateItemRequest::default()
        }
        .validate() else {
            panic!("request is invalid");
        };
        assert!(errors.get("low_stock_threshold").is_some());
    }

    #[test]
    fn total_pages_rounds_up() {
        let response = ItemListResponse::from(ItemPage {
            items: Vec::new(),
            total: 21,
            page: 1,
            limit: 10,
        });
        assert_eq!(response.total_pages, 3);
    }
}
