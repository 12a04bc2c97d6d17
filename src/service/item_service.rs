//! Item service: CRUD orchestration and stock update announcements.

use chrono::Utc;

use crate::domain::{Item, ItemChanges, ItemId, NewItem};
use crate::error::InventoryError;
use crate::persistence::ItemStore;
use crate::ws::HubHandle;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size served.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// One page of items.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPage {
    /// Items on this page, newest first.
    pub items: Vec<Item>,
    /// Total number of items across all pages.
    pub total: u64,
    /// 1-based page number actually served.
    pub page: u32,
    /// Page size actually served.
    pub limit: u32,
}

/// Orchestration layer for item operations.
///
/// Every write goes to the [`ItemStore`] first. Once a quantity change is
/// committed it is announced through the hub; announcing never fails the
/// request and never waits on subscribers.
#[derive(Debug, Clone)]
pub struct ItemService {
    store: ItemStore,
    hub: HubHandle,
}

/// Parses a path segment into an [`ItemId`].
fn parse_id(raw: &str) -> Result<ItemId, InventoryError> {
    raw.parse()
        .map_err(|_| InventoryError::InvalidItemId(raw.to_string()))
}

impl ItemService {
    /// Creates a new `ItemService`.
    #[must_use]
    pub fn new(store: ItemStore, hub: HubHandle) -> Self {
        Self { store, hub }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Creates an item with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::SkuAlreadyExists`] on a duplicate SKU.
    pub async fn create(&self, input: NewItem) -> Result<Item, InventoryError> {
        let item = Item::new(ItemId::new(), input, Utc::now());
        let created = self.store.create(&item).await?;
        tracing::info!(item_id = %created.id, sku = %created.sku, "item created");
        Ok(created)
    }

    /// Loads an item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidItemId`] or
    /// [`InventoryError::ItemNotFound`].
    pub async fn get(&self, raw_id: &str) -> Result<Item, InventoryError> {
        self.store.get(parse_id(raw_id)?).await
    }

    /// Lists a page of items. Page numbers start at 1; a zero limit means
    /// [`DEFAULT_PAGE_LIMIT`] and limits above [`MAX_PAGE_LIMIT`] are capped.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on storage failure.
    pub async fn list(&self, page: u32, limit: u32) -> Result<ItemPage, InventoryError> {
        let page = page.max(1);
        let limit = match limit {
            0 => DEFAULT_PAGE_LIMIT,
            l => l.min(MAX_PAGE_LIMIT),
        };
        let (items, total) = self.store.list(page, limit).await?;
        Ok(ItemPage {
            items,
            total,
            page,
            limit,
        })
    }

    /// Applies a partial update.
    ///
    /// Fields equal to the stored values are ignored; if nothing is left the
    /// stored item is returned untouched. A changed quantity is announced
    /// to stock update subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidItemId`],
    /// [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::SkuAlreadyExists`].
    pub async fn update(&self, raw_id: &str, changes: ItemChanges) -> Result<Item, InventoryError> {
        let id = parse_id(raw_id)?;
        let existing = self.store.get(id).await?;

        let changes = changes.relative_to(&existing);
        if changes.is_empty() {
            tracing::debug!(item_id = %id, "update without changes");
            return Ok(existing);
        }

        let updated = self.store.update(id, &changes).await?;
        tracing::info!(item_id = %id, "item updated");

        if updated.quantity != existing.quantity {
            self.announce(&updated, existing.quantity);
        }
        Ok(updated)
    }

    /// Adds `delta` to an item's quantity and announces the result.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidRequest`] for a zero delta,
    /// [`InventoryError::InsufficientStock`] if the quantity would go below
    /// zero, or the lookup errors of [`ItemService::get`].
    pub async fn adjust_stock(&self, raw_id: &str, delta: i32) -> Result<Item, InventoryError> {
        let id = parse_id(raw_id)?;
        if delta == 0 {
            return Err(InventoryError::InvalidRequest(
                "delta must not be zero".to_string(),
            ));
        }

        let updated = self.store.adjust_quantity(id, delta).await?;
        self.announce(&updated, updated.quantity - delta);
        Ok(updated)
    }

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidItemId`] or
    /// [`InventoryError::ItemNotFound`].
    pub async fn delete(&self, raw_id: &str) -> Result<(), InventoryError> {
        let id = parse_id(raw_id)?;
        self.store.delete(id).await?;
        tracing::info!(item_id = %id, "item deleted");
        Ok(())
    }

    fn announce(&self, item: &Item, previous: i32) {
        let outcome = self.hub.emit_stock_update(item.id, &item.sku, item.quantity);
        tracing::debug!(
            item_id = %item.id,
            sku = %item.sku,
            from = previous,
            to = item.quantity,
            ?outcome,
            "stock change announced"
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::extract::ws::Utf8Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::ws::{ConnectionId, Hub, HubConfig, Subscriber};

    async fn service_with_listener() -> (ItemService, mpsc::Receiver<Utf8Bytes>) {
        let (hub, handle) = Hub::new(HubConfig::default());
        tokio::spawn(hub.run(std::future::pending()));

        let (tx, rx) = mpsc::channel(16);
        let peer = SocketAddr::from(([127, 0, 0, 1], 9));
        let registered = handle
            .register(Subscriber::new(ConnectionId::next(), peer, tx))
            .await;
        assert!(registered.is_ok());

        (ItemService::new(ItemStore::memory(), handle), rx)
    }

    fn widget(quantity: i32) -> NewItem {
        NewItem {
            sku: "WID-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            quantity,
            price: 2.0,
            low_stock_threshold: None,
        }
    }

    async fn no_event(rx: &mut mpsc::Receiver<Utf8Bytes>) {
        let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(got.is_err(), "unexpected broadcast");
    }

    async fn event(rx: &mut mpsc::Receiver<Utf8Bytes>) -> String {
        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(frame)) => frame.as_str().to_string(),
            _ => panic!("expected a broadcast"),
        }
    }

    #[tokio::test]
    async fn quantity_update_is_broadcast() {
        let (service, mut rx) = service_with_listener().await;
        let Ok(item) = service.create(widget(3)).await else {
            panic!("create must succeed");
        };
        no_event(&mut rx).await;

        let changes = ItemChanges {
            quantity: Some(8),
            ..ItemChanges::default()
        };
        let Ok(updated) = service.update(&item.id.to_string(), changes).await else {
            panic!("update must succeed");
        };
        assert_eq!(updated.quantity, 8);

        let frame = event(&mut rx).await;
        assert!(frame.contains(&item.id.to_string()));
        assert!(frame.contains("\"new_quantity\":8"));
    }

    #[tokio::test]
    async fn non_quantity_update_is_silent() {
        let (service, mut rx) = service_with_listener().await;
        let Ok(item) = service.create(widget(3)).await else {
            panic!("create must succeed");
        };

        let rename = ItemChanges {
            name: Some("Gizmo".to_string()),
            quantity: Some(3),
            ..ItemChanges::default()
        };
        let Ok(updated) = service.update(&item.id.to_string(), rename).await else {
            panic!("update must succeed");
        };
        assert_eq!(updated.name, "Gizmo");
        no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn adjust_stock_broadcasts_and_guards_zero() {
        let (service, mut rx) = service_with_listener().await;
        let Ok(item) = service.create(widget(3)).await else {
            panic!("create must succeed");
        };
        let id = item.id.to_string();

        let Ok(after) = service.adjust_stock(&id, -2).await else {
            panic!("adjust must succeed");
        };
        assert_eq!(after.quantity, 1);
        assert!(event(&mut rx).await.contains("\"new_quantity\":1"));

        assert!(matches!(
            service.adjust_stock(&id, -5).await,
            Err(InventoryError::InsufficientStock { .. })
        ));
        assert!(matches!(
            service.adjust_stock(&id, 0).await,
            Err(InventoryError::InvalidRequest(_))
        ));
        no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let (service, _rx) = service_with_listener().await;
        assert!(matches!(
            service.get("not-a-uuid").await,
            Err(InventoryError::InvalidItemId(raw)) if raw == "not-a-uuid"
        ));
        assert!(matches!(
            service.delete(&ItemId::new().to_string()).await,
            Err(InventoryError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_clamps_paging() {
        let (service, _rx) = service_with_listener().await;
        let Ok(page) = service.list(0, 1000).await else {
            panic!("list must succeed");
        };
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_LIMIT);

        let Ok(page) = service.list(2, 0).await else {
            panic!("list must succeed");
        };
        assert_eq!(page.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(page.total, 0);
    }
}
