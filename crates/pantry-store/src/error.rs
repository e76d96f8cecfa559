/// Errors from blob store operations.
///
/// Absence of a key is not an error: [`crate::BlobStore::get`] reports it as
/// `Ok(None)`. Everything here is a real failure and must be propagated.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is malformed or would escape the store namespace.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A conditional write found the key in a different state than expected.
    #[error("precondition failed for {0}")]
    PreconditionFailed(String),

    /// A batch delete exceeded the backend's per-call ceiling.
    #[error("batch of {size} keys exceeds the ceiling of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Serialization or deserialization failure.
    #[error("serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
