use thiserror::Error;

use pantry_store::StoreError;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required field is missing or malformed. Raised before any store
    /// mutation.
    #[error("{0}")]
    Validation(String),

    /// The key lies outside the namespaces callers may delete from.
    #[error("key not allowed: {0}")]
    KeyNotAllowed(String),

    /// The stored index is not a JSON array.
    #[error("catalog index is corrupt: {0}")]
    CorruptIndex(String),

    /// Concurrent writers kept changing the index; the update was not applied.
    #[error("catalog index changed concurrently {attempts} times; giving up")]
    IndexConflict { attempts: u32 },

    /// Some image objects survived a purge. Re-running the delete finishes it.
    #[error("purge of {prefix} left {} objects behind", failed.len())]
    PurgeIncomplete { prefix: String, failed: Vec<String> },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::KeyNotAllowed(_))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
