use std::sync::Arc;

use tracing::warn;

use pantry_catalog::CatalogService;
use pantry_store::BlobStore;

use crate::config::ServerConfig;
use crate::presign::Presigner;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub store: Arc<dyn BlobStore>,
    pub presigner: Option<Presigner>,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, config: &ServerConfig) -> Self {
        let presigner = Presigner::from_config(&config.presign, config.upload_endpoint());
        if presigner.is_none() {
            warn!("no presign secret configured; /upload-url and /upload are disabled");
        }
        Self {
            catalog: CatalogService::new(store.clone(), &config.catalog_config()),
            store,
            presigner,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("catalog", &self.catalog)
            .field("presigner", &self.presigner)
            .finish_non_exhaustive()
    }
}
