//! Domain layer: inventory items, identifiers and input validation.
//!
//! This module contains the server-side domain model. It has no knowledge
//! of HTTP, SQL or WebSockets; the service layer ties it to persistence and
//! the stock update hub.

pub mod item;
pub mod item_id;
pub mod validation;

pub use item::{Item, ItemChanges, NewItem};
pub use item_id::ItemId;
pub use validation::FieldErrors;
