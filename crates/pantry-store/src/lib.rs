//! Blob storage for the Pantry recipe catalog.
//!
//! Everything Pantry persists -- recipe records, the catalog index, image
//! objects, contact submissions -- lives in a key-addressed blob store with
//! per-key read, write and delete, conditional writes, bounded batch deletes
//! and paginated prefix listing. There are no multi-key transactions.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store for tests and ephemeral runs
//! - [`FsBlobStore`] -- files below a root directory, servable as a static site
//!
//! # Design Rules
//!
//! 1. Absence is not an error: `get` returns `Ok(None)` for a missing key.
//! 2. Deletes are idempotent.
//! 3. A batch delete never exceeds [`MAX_BATCH_DELETE`] keys.
//! 4. Etags are content digests, so conditional writes work on any backend.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod json;
pub mod keys;
pub mod memory;
pub mod object;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use json::{read_json_or, read_json_versioned, write_json, write_json_if, Versioned};
pub use memory::{InMemoryBlobStore, StoreOp};
pub use object::{
    compute_etag, BatchDeleteOutcome, DeleteFailure, ListPage, ObjectMeta, Precondition,
    PutOptions, StoredBlob,
};
pub use traits::{BlobStore, MAX_BATCH_DELETE, MAX_LIST_PAGE};
