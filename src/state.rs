//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::storage::StorageService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    storage: StorageService,
}

impl AppState {
    pub fn new(config: Config, storage: StorageService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, storage }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the storage service
    pub fn storage(&self) -> &StorageService {
        &self.inner.storage
    }
}
