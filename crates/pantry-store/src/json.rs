//! JSON document helpers on top of [`BlobStore`].
//!
//! Documents are written pretty-printed with two-space indentation and
//! non-ASCII text left unescaped, the format the front-end has always read.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::object::{Precondition, PutOptions, StoredBlob};
use crate::traits::BlobStore;

/// A decoded document together with the etag it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub etag: String,
}

/// Serialize `value` in the on-store JSON format.
pub fn encode_json<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Bytes> {
    serde_json::to_vec_pretty(value)
        .map(Bytes::from)
        .map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn decode_json<T: DeserializeOwned>(key: &str, blob: &StoredBlob) -> StoreResult<T> {
    serde_json::from_slice(&blob.body).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Read and decode `key`, or return `default` when the key is absent.
///
/// Only absence collapses to the default. A document that exists but does
/// not decode is an error, as is any store failure.
pub async fn read_json_or<S, T>(store: &S, key: &str, default: T) -> StoreResult<T>
where
    S: BlobStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(blob) => decode_json(key, &blob),
        None => Ok(default),
    }
}

/// Read and decode `key` along with its etag, for a later conditional write.
pub async fn read_json_versioned<S, T>(store: &S, key: &str) -> StoreResult<Option<Versioned<T>>>
where
    S: BlobStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(blob) => Ok(Some(Versioned {
            value: decode_json(key, &blob)?,
            etag: blob.etag,
        })),
        None => Ok(None),
    }
}

/// Encode `value` and write it to `key`, replacing any prior document.
pub async fn write_json<S, T>(store: &S, key: &str, value: &T) -> StoreResult<StoredBlob>
where
    S: BlobStore + ?Sized,
    T: Serialize + ?Sized,
{
    let body = encode_json(key, value)?;
    store.put(key, body, PutOptions::json()).await
}

/// Encode `value` and write it to `key` only if `precondition` holds.
pub async fn write_json_if<S, T>(
    store: &S,
    key: &str,
    value: &T,
    precondition: Precondition,
) -> StoreResult<StoredBlob>
where
    S: BlobStore + ?Sized,
    T: Serialize + ?Sized,
{
    let body = encode_json(key, value)?;
    store.put_if(key, body, PutOptions::json(), precondition).await
}
