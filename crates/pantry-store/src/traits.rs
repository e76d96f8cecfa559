use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::object::{BatchDeleteOutcome, ListPage, Precondition, PutOptions, StoredBlob};

/// Maximum number of keys a single [`BlobStore::delete_batch`] call accepts.
pub const MAX_BATCH_DELETE: usize = 1000;

/// Maximum number of keys a single [`BlobStore::list_page`] call returns.
pub const MAX_LIST_PAGE: usize = 1000;

/// Key-addressed blob storage.
///
/// All implementations must satisfy these invariants:
/// - There are no multi-key transactions. Each call affects one key, except
///   `delete_batch`, which is not atomic across its keys either.
/// - `get` returns `Ok(None)` only when the backend explicitly reports the key
///   as absent. Transport and permission failures are errors.
/// - `delete` of a missing key succeeds.
/// - Listings are ordered lexicographically by key and paginate with a
///   `start_after` continuation token.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read an object.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredBlob>>;

    /// Write an object, fully replacing any prior value.
    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> StoreResult<StoredBlob>;

    /// Write an object only if `precondition` holds at the time of the write.
    ///
    /// Returns `StoreError::PreconditionFailed` otherwise, without writing.
    async fn put_if(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
        precondition: Precondition,
    ) -> StoreResult<StoredBlob>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Delete up to [`MAX_BATCH_DELETE`] objects in one call.
    ///
    /// Larger batches are rejected with `StoreError::BatchTooLarge` before
    /// anything is deleted.
    async fn delete_batch(&self, keys: &[String]) -> StoreResult<BatchDeleteOutcome>;

    /// List up to `max_keys` objects under `prefix` whose key sorts after
    /// `start_after`.
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ListPage>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
