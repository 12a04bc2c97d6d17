//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies validate into domain inputs; responses serialize domain
//! items directly.

pub mod analytics_dto;
pub mod common_dto;
pub mod item_dto;

pub use analytics_dto::*;
pub use common_dto::*;
pub use item_dto::*;
