//! Bulk deletion of everything under a key prefix.
//!
//! Listing and deleting are kept apart: [`PrefixLister`] produces keys page by
//! page, [`DeleteBatcher`] groups them into batches no larger than the
//! ceiling, and [`purge_prefix`] wires the two together, issuing one batch
//! delete at a time. Neither step is transactional; objects created under
//! the prefix while a purge runs may survive it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pantry_store::{BlobStore, StoreResult, MAX_BATCH_DELETE, MAX_LIST_PAGE};

use crate::error::{CatalogError, CatalogResult};

/// Purge settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Keys requested per listing call.
    pub page_size: usize,
    /// Keys per batch delete call; never more than [`MAX_BATCH_DELETE`].
    pub batch_ceiling: usize,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_LIST_PAGE,
            batch_ceiling: MAX_BATCH_DELETE,
        }
    }
}

/// Lazily pages through the keys under a prefix.
///
/// The lister is restartable: [`PrefixLister::cursor`] is the last key handed
/// out, and [`PrefixLister::resume`] starts a new lister right after it.
pub struct PrefixLister<'a> {
    store: &'a dyn BlobStore,
    prefix: String,
    page_size: usize,
    cursor: Option<String>,
    exhausted: bool,
}

impl<'a> PrefixLister<'a> {
    pub fn new(store: &'a dyn BlobStore, prefix: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            page_size: page_size.clamp(1, MAX_LIST_PAGE),
            cursor: None,
            exhausted: false,
        }
    }

    /// Continue a listing after `cursor`.
    pub fn resume(
        store: &'a dyn BlobStore,
        prefix: impl Into<String>,
        page_size: usize,
        cursor: impl Into<String>,
    ) -> Self {
        let mut lister = Self::new(store, prefix, page_size);
        lister.cursor = Some(cursor.into());
        lister
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Next page of keys, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> StoreResult<Option<Vec<String>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .store
            .list_page(&self.prefix, self.cursor.as_deref(), self.page_size)
            .await?;
        self.exhausted = page.is_last();
        let keys: Vec<String> = page.objects.into_iter().map(|o| o.key).collect();
        if let Some(last) = keys.last() {
            self.cursor = Some(last.clone());
        }
        if keys.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(keys))
    }
}

/// Groups keys into batches of at most `ceiling` keys.
#[derive(Debug)]
pub struct DeleteBatcher {
    ceiling: usize,
    pending: Vec<String>,
}

impl DeleteBatcher {
    /// `ceiling` is clamped to `1..=MAX_BATCH_DELETE`.
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.clamp(1, MAX_BATCH_DELETE);
        Self {
            ceiling,
            pending: Vec::with_capacity(ceiling),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Add a key; returns a full batch once the ceiling is reached.
    pub fn push(&mut self, key: String) -> Option<Vec<String>> {
        self.pending.push(key);
        if self.pending.len() >= self.ceiling {
            Some(std::mem::replace(
                &mut self.pending,
                Vec::with_capacity(self.ceiling),
            ))
        } else {
            None
        }
    }

    /// The final, partial batch, if any keys remain.
    pub fn finish(self) -> Option<Vec<String>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        }
    }
}

/// What a purge did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: usize,
    pub batches: usize,
    pub failed: Vec<String>,
}

async fn flush(
    store: &dyn BlobStore,
    batch: Vec<String>,
    report: &mut PurgeReport,
) -> StoreResult<()> {
    debug!(size = batch.len(), "deleting batch");
    let outcome = store.delete_batch(&batch).await?;
    report.batches += 1;
    report.deleted += outcome.deleted.len();
    for failure in outcome.failed {
        warn!(key = %failure.key, reason = %failure.reason, "object survived batch delete");
        report.failed.push(failure.key);
    }
    Ok(())
}

/// Delete every object under `prefix`.
///
/// Batches are issued sequentially, each full batch as soon as it fills and
/// the remainder at the end. Store errors abort the purge; per-key failures
/// are collected and reported as [`CatalogError::PurgeIncomplete`] once all
/// batches have run.
pub async fn purge_prefix(
    store: &dyn BlobStore,
    prefix: &str,
    config: &PurgeConfig,
) -> CatalogResult<PurgeReport> {
    let mut lister = PrefixLister::new(store, prefix, config.page_size);
    let mut batcher = DeleteBatcher::new(config.batch_ceiling);
    let mut report = PurgeReport::default();

    while let Some(keys) = lister.next_page().await? {
        for key in keys {
            if let Some(batch) = batcher.push(key) {
                flush(store, batch, &mut report).await?;
            }
        }
    }
    if let Some(batch) = batcher.finish() {
        flush(store, batch, &mut report).await?;
    }

    if !report.failed.is_empty() {
        return Err(CatalogError::PurgeIncomplete {
            prefix: prefix.to_string(),
            failed: report.failed,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pantry_store::{InMemoryBlobStore, PutOptions, StoreOp};

    async fn seed(store: &InMemoryBlobStore, prefix: &str, n: usize) {
        for i in 0..n {
            store
                .put(&format!("{prefix}{i:05}.webp"), Bytes::from_static(b"x"), PutOptions::default())
                .await
                .unwrap();
        }
        store.clear_ops();
    }

    #[test]
    fn batcher_flushes_at_ceiling() {
        let mut batcher = DeleteBatcher::new(2);
        assert!(batcher.push("a".into()).is_none());
        assert_eq!(batcher.push("b".into()), Some(vec!["a".to_string(), "b".to_string()]));
        assert!(batcher.push("c".into()).is_none());
        assert_eq!(batcher.pending(), 1);
        assert_eq!(batcher.finish(), Some(vec!["c".to_string()]));
    }

    #[test]
    fn batcher_ceiling_is_clamped() {
        assert_eq!(DeleteBatcher::new(0).ceiling(), 1);
        assert_eq!(DeleteBatcher::new(5000).ceiling(), MAX_BATCH_DELETE);
        assert!(DeleteBatcher::new(10).finish().is_none());
    }

    #[tokio::test]
    async fn lister_pages_and_resumes() {
        let store = InMemoryBlobStore::new();
        seed(&store, "images/recipes/1/", 5).await;

        let mut lister = PrefixLister::new(&store, "images/recipes/1/", 2);
        let first = lister.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let cursor = lister.cursor().unwrap().to_string();

        let mut resumed = PrefixLister::resume(&store, "images/recipes/1/", 2, cursor);
        let mut rest = Vec::new();
        while let Some(page) = resumed.next_page().await.unwrap() {
            rest.extend(page);
        }
        assert_eq!(rest.len(), 3);
        assert!(!rest.contains(&first[1]));
    }

    #[tokio::test]
    async fn lister_on_empty_prefix() {
        let store = InMemoryBlobStore::new();
        let mut lister = PrefixLister::new(&store, "images/recipes/none/", 10);
        assert!(lister.next_page().await.unwrap().is_none());
        assert!(lister.next_page().await.unwrap().is_none());
        assert_eq!(store.ops().len(), 1);
    }

    #[tokio::test]
    async fn purge_above_ceiling_uses_multiple_batches() {
        let store = InMemoryBlobStore::new();
        seed(&store, "images/recipes/9/", 2500).await;

        let report = purge_prefix(&store, "images/recipes/9/", &PurgeConfig::default())
            .await
            .unwrap();
        assert_eq!(report.deleted, 2500);
        assert_eq!(store.batch_sizes(), vec![1000, 1000, 500]);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn purge_exact_multiple_has_no_empty_tail_batch() {
        let store = InMemoryBlobStore::new();
        seed(&store, "images/recipes/9/", 6).await;
        let config = PurgeConfig {
            page_size: 4,
            batch_ceiling: 3,
        };
        let report = purge_prefix(&store, "images/recipes/9/", &config).await.unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(store.batch_sizes(), vec![3, 3]);
    }

    #[tokio::test]
    async fn purge_issues_batches_sequentially_between_pages() {
        let store = InMemoryBlobStore::new();
        seed(&store, "p/", 5).await;
        let config = PurgeConfig {
            page_size: 2,
            batch_ceiling: 2,
        };
        purge_prefix(&store, "p/", &config).await.unwrap();
        let ops: Vec<StoreOp> = store.ops();
        assert_eq!(
            ops,
            vec![
                StoreOp::List("p/".into()),
                StoreOp::DeleteBatch(2),
                StoreOp::List("p/".into()),
                StoreOp::DeleteBatch(2),
                StoreOp::List("p/".into()),
                StoreOp::DeleteBatch(1),
            ]
        );
    }

    #[tokio::test]
    async fn purge_leaves_other_prefixes_alone() {
        let store = InMemoryBlobStore::new();
        seed(&store, "images/recipes/1/", 3).await;
        seed(&store, "images/recipes/10/", 2).await;
        purge_prefix(&store, "images/recipes/1/", &PurgeConfig::default())
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn purge_reports_survivors() {
        let store = InMemoryBlobStore::new();
        seed(&store, "images/recipes/3/", 3).await;
        store.deny_delete("images/recipes/3/00001.webp");

        let err = purge_prefix(&store, "images/recipes/3/", &PurgeConfig::default())
            .await
            .unwrap_err();
        match err {
            CatalogError::PurgeIncomplete { prefix, failed } => {
                assert_eq!(prefix, "images/recipes/3/");
                assert_eq!(failed, vec!["images/recipes/3/00001.webp".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.len(), 1);

        store.allow_all_deletes();
        purge_prefix(&store, "images/recipes/3/", &PurgeConfig::default())
            .await
            .unwrap();
        assert!(store.is_empty());
    }
}
