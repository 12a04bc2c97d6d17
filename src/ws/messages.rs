//! Broadcast event wire format.
//!
//! Every frame pushed to subscribers is a JSON object with a `type`
//! discriminator and a kind-specific `payload`:
//!
//! ```json
//! {"type":"STOCK_UPDATE","payload":{"id":"…","sku":"SKU1","new_quantity":42}}
//! ```
//!
//! Events are serialized once per publish into an [`EncodedEvent`] whose
//! buffer is reference counted, so fan-out hands every subscriber the same
//! bytes without copying.

use axum::extract::ws::{Message, Utf8Bytes};
use serde::{Deserialize, Serialize};

use crate::domain::ItemId;

/// Event broadcast to every connected subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastEvent {
    /// The quantity of an item changed.
    StockUpdate(StockUpdatePayload),
}

/// Body of a `STOCK_UPDATE` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdatePayload {
    /// Item identifier.
    pub id: String,
    /// Item SKU.
    pub sku: String,
    /// Quantity after the committed change.
    pub new_quantity: i32,
}

impl BroadcastEvent {
    /// Builds a `STOCK_UPDATE` event for the given item.
    #[must_use]
    pub fn stock_update(item_id: ItemId, sku: &str, new_quantity: i32) -> Self {
        Self::StockUpdate(StockUpdatePayload {
            id: item_id.to_string(),
            sku: sku.to_string(),
            new_quantity,
        })
    }

    /// Returns the wire discriminator of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StockUpdate(_) => "STOCK_UPDATE",
        }
    }

    /// Serializes the event into a shareable text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<EncodedEvent, serde_json::Error> {
        serde_json::to_string(self).map(|json| EncodedEvent(Utf8Bytes::from(json)))
    }
}

/// A serialized [`BroadcastEvent`], immutable once built.
///
/// Cloning is a reference count bump; the JSON text is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent(Utf8Bytes);

impl EncodedEvent {
    /// Returns the JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns a handle to the shared frame body.
    #[must_use]
    pub fn frame(&self) -> Utf8Bytes {
        self.0.clone()
    }

    /// Wraps the frame body in a WebSocket text message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::Text(self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn stock_update_wire_bytes() {
        let event = BroadcastEvent::StockUpdate(StockUpdatePayload {
            id: "abc".to_string(),
            sku: "SKU1".to_string(),
            new_quantity: 42,
        });
        let Ok(encoded) = event.encode() else {
            panic!("stock update must encode");
        };
        assert_eq!(
            encoded.as_str(),
            r#"{"type":"STOCK_UPDATE","payload":{"id":"abc","sku":"SKU1","new_quantity":42}}"#
        );
    }

    #[test]
    fn decodes_back_to_same_structure() {
        let id = ItemId::new();
        let event = BroadcastEvent::stock_update(id, "SKU-9", 0);
        let Ok(encoded) = event.encode() else {
            panic!("stock update must encode");
        };
        let Ok(decoded) = serde_json::from_str::<BroadcastEvent>(encoded.as_str()) else {
            panic!("encoded event must decode");
        };
        assert_eq!(decoded, event);
        assert_eq!(decoded.kind(), "STOCK_UPDATE");
    }

    #[test]
    fn frames_share_one_buffer() {
        let Ok(encoded) = BroadcastEvent::stock_update(ItemId::new(), "S", 1).encode() else {
            panic!("stock update must encode");
        };
        let a = encoded.frame();
        let b = encoded.frame();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn into_message_is_text() {
        let Ok(encoded) = BroadcastEvent::stock_update(ItemId::new(), "S", 1).encode() else {
            panic!("stock update must encode");
        };
        assert!(matches!(encoded.into_message(), Message::Text(_)));
    }
}
