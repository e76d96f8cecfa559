//! Value types exchanged with a [`crate::BlobStore`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content type used when the writer does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Entity tag of a stored body: the hex BLAKE3 digest of its bytes.
///
/// Two writes of identical bytes produce the same tag, so a conditional write
/// against an unchanged document still succeeds.
pub fn compute_etag(body: &[u8]) -> String {
    blake3::hash(body).to_hex().to_string()
}

/// An object as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub etag: String,
}

impl StoredBlob {
    pub fn new(body: Bytes, options: &PutOptions) -> Self {
        let etag = compute_etag(&body);
        Self {
            body,
            content_type: options
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            cache_control: options.cache_control.clone(),
            etag,
        }
    }

    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Metadata attached to a write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

impl PutOptions {
    /// Options for JSON documents the front-end reads directly.
    pub fn json() -> Self {
        Self {
            content_type: Some("application/json; charset=utf-8".to_string()),
            cache_control: Some("no-cache".to_string()),
        }
    }

    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            cache_control: None,
        }
    }
}

/// Condition a [`crate::BlobStore::put_if`] must satisfy to take effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// The key must not exist yet.
    Absent,
    /// The key must exist with exactly this etag.
    Matches(String),
}

/// One entry of a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// One page of a prefix listing.
///
/// `next` is the continuation token to pass as `start_after` for the
/// following page; `None` means the listing is exhausted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    pub next: Option<String>,
}

impl ListPage {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.key.as_str())
    }

    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// A key the backend failed to delete inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub reason: String,
}

/// Result of one batch delete call.
///
/// Backends report per-key failures here instead of failing the whole call,
/// matching how bulk-delete APIs of object stores behave.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
}

impl BatchDeleteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
