use std::sync::Arc;

use crate::{
    db::{Cache, CatalogStore},
    services::auth::AuthSettings,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    /// Read-through cache, absent when Redis is not configured
    pub cache: Option<Cache>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Option<Cache>, auth: AuthSettings) -> Self {
        Self {
            store,
            cache,
            auth: Arc::new(auth),
        }
    }

    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }
}
