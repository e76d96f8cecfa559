use std::sync::Arc;

use tracing::info;

use pantry_store::keys::{validate_key, RECIPE_DATA_PREFIX, RECIPE_IMAGES_PREFIX};
use pantry_store::BlobStore;

use crate::error::{CatalogError, CatalogResult};

/// Bounds which keys an externally supplied request may touch.
///
/// This is not a permission system. It only limits the blast radius of a
/// single key coming from a client: anything outside the allowed prefixes is
/// refused before the store is called.
#[derive(Clone)]
pub struct ObjectGuard {
    store: Arc<dyn BlobStore>,
    allowed_prefixes: Vec<String>,
}

impl ObjectGuard {
    /// Guard for ad-hoc deletes: recipe images and recipe data.
    pub fn for_deletes(store: Arc<dyn BlobStore>) -> Self {
        Self::with_prefixes(store, [RECIPE_IMAGES_PREFIX, RECIPE_DATA_PREFIX])
    }

    /// Guard for client uploads: recipe images only.
    pub fn for_uploads(store: Arc<dyn BlobStore>) -> Self {
        Self::with_prefixes(store, [RECIPE_IMAGES_PREFIX])
    }

    pub fn with_prefixes<I, P>(store: Arc<dyn BlobStore>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            store,
            allowed_prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_prefixes(&self) -> &[String] {
        &self.allowed_prefixes
    }

    /// Accept `key` only if it is well formed and under an allowed prefix.
    pub fn check(&self, key: &str) -> CatalogResult<()> {
        if !self.allowed_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(CatalogError::KeyNotAllowed(key.to_string()));
        }
        validate_key(key).map_err(|e| CatalogError::Validation(e.to_string()))
    }

    /// Delete a single object after checking its key.
    pub async fn delete_object(&self, key: &str) -> CatalogResult<()> {
        self.check(key)?;
        self.store.delete(key).await?;
        info!(key, "object deleted");
        Ok(())
    }
}

impl std::fmt::Debug for ObjectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGuard")
            .field("allowed_prefixes", &self.allowed_prefixes)
            .finish_non_exhaustive()
    }
}
