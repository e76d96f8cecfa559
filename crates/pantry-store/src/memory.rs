use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::keys::validate_key;
use crate::object::{
    BatchDeleteOutcome, DeleteFailure, ListPage, ObjectMeta, Precondition, PutOptions, StoredBlob,
};
use crate::traits::{BlobStore, MAX_BATCH_DELETE, MAX_LIST_PAGE};

/// A call observed by an [`InMemoryBlobStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Get(String),
    Put(String),
    PutIf(String),
    Delete(String),
    DeleteBatch(usize),
    List(String),
}

/// In-memory, `BTreeMap`-based blob store.
///
/// Intended for tests and ephemeral runs. Every call is appended to an
/// operation log so callers can assert on exactly which store calls an
/// operation issued. The store can also be switched unavailable, or told to
/// refuse deleting specific keys, to exercise failure paths.
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredBlob>>,
    ops: Mutex<Vec<StoreOp>>,
    unavailable: AtomicBool,
    undeletable: RwLock<HashSet<String>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            ops: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            undeletable: RwLock::new(HashSet::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// All keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Calls issued against the store so far.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().expect("lock poisoned").clone()
    }

    /// Forget the recorded calls.
    pub fn clear_ops(&self) {
        self.ops.lock().expect("lock poisoned").clear();
    }

    /// Sizes of every batch delete call issued so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::DeleteBatch(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Refuse to delete `key`, both singly and inside batches.
    pub fn deny_delete(&self, key: impl Into<String>) {
        self.undeletable
            .write()
            .expect("lock poisoned")
            .insert(key.into());
    }

    /// Allow deleting every key again.
    pub fn allow_all_deletes(&self) {
        self.undeletable.write().expect("lock poisoned").clear();
    }

    fn record(&self, op: StoreOp) -> StoreResult<()> {
        self.ops.lock().expect("lock poisoned").push(op);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }

    fn is_undeletable(&self, key: &str) -> bool {
        self.undeletable.read().expect("lock poisoned").contains(key)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredBlob>> {
        self.record(StoreOp::Get(key.to_string()))?;
        validate_key(key)?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> StoreResult<StoredBlob> {
        self.record(StoreOp::Put(key.to_string()))?;
        validate_key(key)?;
        let blob = StoredBlob::new(body, &options);
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), blob.clone());
        Ok(blob)
    }

    async fn put_if(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
        precondition: Precondition,
    ) -> StoreResult<StoredBlob> {
        self.record(StoreOp::PutIf(key.to_string()))?;
        validate_key(key)?;
        let mut map = self.objects.write().expect("lock poisoned");
        let holds = match (&precondition, map.get(key)) {
            (Precondition::Absent, None) => true,
            (Precondition::Matches(etag), Some(current)) => current.etag == *etag,
            _ => false,
        };
        if !holds {
            return Err(StoreError::PreconditionFailed(key.to_string()));
        }
        let blob = StoredBlob::new(body, &options);
        map.insert(key.to_string(), blob.clone());
        Ok(blob)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.record(StoreOp::Delete(key.to_string()))?;
        validate_key(key)?;
        if self.is_undeletable(key) {
            return Err(StoreError::Unavailable(format!("access denied deleting {key}")));
        }
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> StoreResult<BatchDeleteOutcome> {
        if keys.len() > MAX_BATCH_DELETE {
            return Err(StoreError::BatchTooLarge {
                size: keys.len(),
                max: MAX_BATCH_DELETE,
            });
        }
        self.record(StoreOp::DeleteBatch(keys.len()))?;
        let mut outcome = BatchDeleteOutcome::default();
        let mut map = self.objects.write().expect("lock poisoned");
        for key in keys {
            if let Err(e) = validate_key(key) {
                outcome.failed.push(DeleteFailure {
                    key: key.clone(),
                    reason: e.to_string(),
                });
            } else if self.is_undeletable(key) {
                outcome.failed.push(DeleteFailure {
                    key: key.clone(),
                    reason: "access denied".into(),
                });
            } else {
                map.remove(key);
                outcome.deleted.push(key.clone());
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
        self.record(StoreOp::List(prefix.to_string()))?;
        let max_keys = max_keys.clamp(1, MAX_LIST_PAGE);
        let lower = match start_after {
            Some(after) if after >= prefix => Bound::Excluded(after.to_string()),
            _ => Bound::Included(prefix.to_string()),
        };

        let map = self.objects.read().expect("lock poisoned");
        let mut matching = map
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        let objects: Vec<ObjectMeta> = matching
            .by_ref()
            .take(max_keys)
            .map(|(k, v)| ObjectMeta {
                key: k.clone(),
                size: v.size(),
            })
            .collect();
        let next = match matching.next() {
            Some(_) => objects.last().map(|o| o.key.clone()),
            None => None,
        };
        Ok(ListPage { objects, next })
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("object_count", &self.len())
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}
