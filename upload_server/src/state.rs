use std::sync::Arc;

use upload_core::StorageBackend;

use crate::config::AppConfig;

/// Shared application state: the loaded configuration and the storage
/// backend every request's coordinator uploads into.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<dyn StorageBackend>,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self { config, storage }
    }
}
