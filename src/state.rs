//! Shared application state for all routes. Read-only after startup.

use crate::config::ResolvedModel;
use crate::service::CrudService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ResolvedModel>,
    pub crud: CrudService,
}

impl AppState {
    pub fn new(model: ResolvedModel, crud: CrudService) -> Self {
        AppState {
            model: Arc::new(model),
            crud,
        }
    }
}
