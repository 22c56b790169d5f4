//! Entity CRUD routes built from resolved model.
//! Unmatched API paths get a JSON 404 instead of falling through to the UI.
//! Uses parameterized paths so Path extractors receive the segment and id; handlers resolve the entity by path.

use crate::handlers::entity::{create, delete as delete_handler, list, not_found};
use crate::state::AppState;
use axum::{routing::delete, routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/:id", delete(delete_handler))
        .fallback(not_found)
        .with_state(state)
}
