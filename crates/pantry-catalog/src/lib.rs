//! Recipe catalog core for Pantry.
//!
//! A recipe is stored twice: as a full record at `data/recipes/<id>.json` and
//! as a summary entry in the catalog index at `data/recipes/index.json`. This
//! crate keeps the two consistent on top of any [`pantry_store::BlobStore`].
//!
//! # Components
//!
//! - [`RecipeId`] -- validated recipe identifier
//! - [`RecipeStore`] -- per-recipe records
//! - [`CatalogIndex`] -- read-modify-write of the index with optimistic
//!   concurrency, or last-writer-wins when configured
//! - [`purge_prefix`] -- paginated listing feeding bounded batch deletes
//! - [`CascadeDeleter`] -- record, index entry, then images
//! - [`ObjectGuard`] -- prefix bound on client-supplied keys
//! - [`ContactDesk`] -- spam-filtered contact intake with notifier fan-out
//! - [`CatalogService`] -- the operations exposed to the HTTP layer
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pantry_catalog::{CatalogConfig, CatalogService, SaveRecipeRequest};
//! use pantry_store::InMemoryBlobStore;
//! use serde_json::json;
//!
//! # async fn example() -> pantry_catalog::CatalogResult<()> {
//! let service = CatalogService::new(Arc::new(InMemoryBlobStore::new()), &CatalogConfig::default());
//! let saved = service
//!     .save_recipe(SaveRecipeRequest {
//!         recipe_json: json!({"id": "r1", "title": "Soup"}),
//!         index_patch: json!({"id": "r1", "title": "Soup"}),
//!     })
//!     .await?;
//! assert_eq!(saved.id.as_str(), "r1");
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod config;
pub mod contact;
pub mod error;
pub mod guard;
pub mod id;
pub mod index;
pub mod purge;
pub mod record;
pub mod service;

pub use cascade::{CascadeDeleter, DeleteReport};
pub use config::CatalogConfig;
pub use contact::{
    ContactConfig, ContactDesk, ContactForm, ContactReceipt, ContactSubmission, LogNotifier,
    Notifier, NotifierKind, SpamFilter, Verdict,
};
pub use error::{CatalogError, CatalogResult};
pub use guard::ObjectGuard;
pub use id::RecipeId;
pub use index::{CatalogIndex, IndexConfig, IndexDocument, IndexWriteMode, UpsertOutcome};
pub use purge::{purge_prefix, DeleteBatcher, PrefixLister, PurgeConfig, PurgeReport};
pub use record::RecipeStore;
pub use service::{
    CatalogService, DeleteObjectRequest, DeleteRecipeRequest, SaveOutcome, SaveRecipeRequest,
};
