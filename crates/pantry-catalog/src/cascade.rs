use std::sync::Arc;

use tracing::info;

use pantry_store::keys::recipe_images_prefix;
use pantry_store::BlobStore;

use crate::error::CatalogResult;
use crate::id::RecipeId;
use crate::index::CatalogIndex;
use crate::purge::{purge_prefix, PurgeConfig, PurgeReport};
use crate::record::RecipeStore;

/// What a cascading delete removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Index entries dropped for the id (0 when it was not listed).
    pub index_entries_removed: usize,
    /// Present when images were purged.
    pub purge: Option<PurgeReport>,
}

/// Removes a recipe together with its index entry and, optionally, its
/// image tree.
///
/// Steps run in a fixed order: record, index entry, images. An interrupted
/// run therefore never leaves a recipe listed in the index without its
/// record; at worst it leaves orphaned images, which a later run with
/// `purge_images` removes since the purge does not need the record or the
/// index entry to exist. Every step is idempotent.
#[derive(Clone)]
pub struct CascadeDeleter {
    store: Arc<dyn BlobStore>,
    records: RecipeStore,
    index: CatalogIndex,
    purge: PurgeConfig,
}

impl CascadeDeleter {
    pub fn new(
        store: Arc<dyn BlobStore>,
        records: RecipeStore,
        index: CatalogIndex,
        purge: PurgeConfig,
    ) -> Self {
        Self {
            store,
            records,
            index,
            purge,
        }
    }

    pub async fn delete_recipe(&self, id: &RecipeId, purge_images: bool) -> CatalogResult<DeleteReport> {
        self.records.delete(id).await?;
        let index_entries_removed = self.index.remove(id).await?;

        let purge = if purge_images {
            let prefix = recipe_images_prefix(id.as_str());
            Some(purge_prefix(self.store.as_ref(), &prefix, &self.purge).await?)
        } else {
            None
        };

        info!(
            %id,
            index_entries_removed,
            images_deleted = purge.as_ref().map(|p| p.deleted).unwrap_or(0),
            "recipe deleted"
        );
        Ok(DeleteReport {
            index_entries_removed,
            purge,
        })
    }
}

impl std::fmt::Debug for CascadeDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeDeleter")
            .field("index", &self.index)
            .field("purge", &self.purge)
            .finish_non_exhaustive()
    }
}
