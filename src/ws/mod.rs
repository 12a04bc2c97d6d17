//! Realtime layer: stock update hub, subscriber connections and the
//! WebSocket endpoint.
//!
//! Clients connect to `/ws/stock-updates` and receive a `STOCK_UPDATE`
//! frame whenever an item's quantity changes. The channel is push only.
//! Delivery is best-effort: a subscriber that falls behind misses events
//! and publishers never wait on subscribers.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;

pub use connection::{Connection, ConnectionConfig, ConnectionId, ConnectionState};
pub use hub::{
    Hub, HubConfig, HubHandle, HubStats, PublishOutcome, RealtimeError, Subscriber,
    MAX_CAPACITY,
};
pub use messages::{BroadcastEvent, EncodedEvent, StockUpdatePayload};
