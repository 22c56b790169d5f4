//! Router assembly: common routes, entity CRUD under /api/v1.

pub mod common;
pub mod entity;

pub use common::common_routes;
pub use entity::entity_routes;
