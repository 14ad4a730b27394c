use std::sync::Arc;

use crate::config::Config;
use crate::intake::storage::StorageService;
use crate::intake::validation::FormDataValidator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: StorageService,
    pub validator: Arc<FormDataValidator>,
}
