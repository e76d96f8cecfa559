use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use pantry_store::keys::recipe_key;
use pantry_store::{read_json_or, write_json, BlobStore};

use crate::error::CatalogResult;
use crate::id::RecipeId;

/// One JSON document per recipe under `data/recipes/<id>.json`.
///
/// Records are opaque apart from their `id`. A save always replaces the
/// whole document; there is no merging.
#[derive(Clone)]
pub struct RecipeStore {
    store: Arc<dyn BlobStore>,
}

impl RecipeStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Write `record`, replacing any prior record with the same id.
    ///
    /// Fails with a validation error, before touching the store, when the
    /// record has no usable `id`.
    pub async fn save(&self, record: &Value) -> CatalogResult<RecipeId> {
        let id = RecipeId::from_document(record)?;
        let key = recipe_key(id.as_str());
        write_json(self.store.as_ref(), &key, record).await?;
        debug!(%id, %key, "saved recipe record");
        Ok(id)
    }

    /// Remove the record for `id`. Removing a missing record succeeds.
    pub async fn delete(&self, id: &RecipeId) -> CatalogResult<()> {
        let key = recipe_key(id.as_str());
        self.store.delete(&key).await?;
        debug!(%id, %key, "deleted recipe record");
        Ok(())
    }

    /// Read the record for `id`, or `default` when there is none.
    pub async fn read_or(&self, id: &RecipeId, default: Value) -> CatalogResult<Value> {
        let key = recipe_key(id.as_str());
        Ok(read_json_or(self.store.as_ref(), &key, default).await?)
    }
}

impl std::fmt::Debug for RecipeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeStore").finish_non_exhaustive()
    }
}
