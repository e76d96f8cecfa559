//! Filesystem-backed blob store.
//!
//! Keys map one-to-one onto files below a root directory, so the root can be
//! served as a static site with the exact layout the front-end expects.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::keys::{guess_content_type, validate_key};
use crate::object::{
    BatchDeleteOutcome, DeleteFailure, ListPage, ObjectMeta, Precondition, PutOptions, StoredBlob,
};
use crate::traits::{BlobStore, MAX_BATCH_DELETE, MAX_LIST_PAGE};

/// Marker embedded in temp file names; such files are never listed.
const TMP_MARKER: &str = ".pantry-tmp-";

/// Blob store rooted at a local directory.
///
/// Writes go to a temp file that is renamed into place, so readers never see
/// a partially written document. Conditional writes are serialized through an
/// in-process lock; two processes sharing one root get no such guarantee.
/// Content type and cache control are not persisted; reads infer the content
/// type from the key's extension.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    tmp_counter: AtomicU64,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        path.extend(key.split('/'));
        Ok(path)
    }

    async fn read_blob(&self, key: &str) -> StoreResult<Option<StoredBlob>> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => return Ok(None),
            Ok(_) => {}
            Err(e) if is_absent(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::read(&path).await {
            Ok(data) => {
                let options = PutOptions::with_content_type(guess_content_type(key));
                Ok(Some(StoredBlob::new(Bytes::from(data), &options)))
            }
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_blob(&self, key: &str, body: Bytes, options: &PutOptions) -> StoreResult<StoredBlob> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{file_name}{TMP_MARKER}{}-{n}", std::process::id()));
        tokio::fs::write(&tmp, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(key, bytes = body.len(), "wrote object");
        Ok(StoredBlob::new(body, options))
    }

    async fn remove_blob(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if is_absent(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_parents(&path).await;
        Ok(())
    }

    /// Remove directories left empty by a delete, stopping at the root.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root.as_path() || !d.starts_with(&self.root) {
                break;
            }
            if tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }
    }

    /// Deepest directory that can contain keys starting with `prefix`.
    fn walk_root(&self, prefix: &str) -> PathBuf {
        let dir_part = match prefix.rfind('/') {
            Some(i) => &prefix[..i],
            None => "",
        };
        let mut path = self.root.clone();
        path.extend(dir_part.split('/').filter(|s| !s.is_empty()));
        path
    }
}

/// A missing file, or a path running through a regular file, means "no object".
fn is_absent(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn list_sync(
    root: &Path,
    walk_root: &Path,
    prefix: &str,
    start_after: Option<&str>,
    max_keys: usize,
) -> StoreResult<ListPage> {
    if !walk_root.is_dir() {
        return Ok(ListPage::default());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(walk_root).follow_links(false) {
        let entry = entry.map_err(|e| {
            StoreError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "walk loop")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.contains(TMP_MARKER) || !key.starts_with(prefix) {
            continue;
        }
        if start_after.is_some_and(|after| key.as_str() <= after) {
            continue;
        }
        found.push(ObjectMeta {
            key,
            size: entry.metadata().map(|m| m.len()).unwrap_or(0),
        });
    }
    found.sort_by(|a, b| a.key.cmp(&b.key));

    let has_more = found.len() > max_keys;
    found.truncate(max_keys);
    let next = if has_more {
        found.last().map(|o| o.key.clone())
    } else {
        None
    };
    Ok(ListPage { objects: found, next })
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredBlob>> {
        self.read_blob(key).await
    }

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> StoreResult<StoredBlob> {
        let _guard = self.write_lock.lock().await;
        self.write_blob(key, body, &options).await
    }

    async fn put_if(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
        precondition: Precondition,
    ) -> StoreResult<StoredBlob> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_blob(key).await?;
        let holds = match (&precondition, &current) {
            (Precondition::Absent, None) => true,
            (Precondition::Matches(etag), Some(blob)) => blob.etag == *etag,
            _ => false,
        };
        if !holds {
            return Err(StoreError::PreconditionFailed(key.to_string()));
        }
        self.write_blob(key, body, &options).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.remove_blob(key).await
    }

    async fn delete_batch(&self, keys: &[String]) -> StoreResult<BatchDeleteOutcome> {
        if keys.len() > MAX_BATCH_DELETE {
            return Err(StoreError::BatchTooLarge {
                size: keys.len(),
                max: MAX_BATCH_DELETE,
            });
        }
        let _guard = self.write_lock.lock().await;
        let mut outcome = BatchDeleteOutcome::default();
        for key in keys {
            match self.remove_blob(key).await {
                Ok(()) => outcome.deleted.push(key.clone()),
                Err(e) => outcome.failed.push(DeleteFailure {
                    key: key.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ListPage> {
        let root = self.root.clone();
        let walk_root = self.walk_root(prefix);
        let prefix = prefix.to_string();
        let start_after = start_after.map(str::to_string);
        let max_keys = max_keys.clamp(1, MAX_LIST_PAGE);
        tokio::task::spawn_blocking(move || {
            list_sync(&root, &walk_root, &prefix, start_after.as_deref(), max_keys)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }
}
