//! # stockroom
//!
//! Inventory tracking REST API with a real-time stock update channel.
//!
//! Items are created, paged, updated and deleted over HTTP. Whenever an
//! item's quantity changes, the new quantity is pushed to every client
//! connected to `/ws/stock-updates`. Delivery is best-effort: the
//! authoritative state is always the REST API.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Upgrade Handler (ws/handler)
//!     │
//!     ├── ItemService / AnalyticsService (service/)
//!     │       │
//!     │       └── HubHandle::emit_stock_update ──► Hub (ws/hub)
//!     │                                              │ fan-out
//!     │                                              ▼
//!     │                                   Connection writer/reader (ws/connection)
//!     │
//!     └── ItemStore (persistence/): PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
