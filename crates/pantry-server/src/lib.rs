//! HTTP server for the Pantry recipe catalog.
//!
//! A single entry point for a static front-end: recipe saves with index
//! reconciliation, cascading recipe deletes, guarded object deletes,
//! presigned image uploads and contact-form intake. All request bodies and
//! responses are JSON; errors are `{"error": "..."}`.

pub mod config;
pub mod error;
pub mod handler;
pub mod presign;
pub mod router;
pub mod server;
pub mod state;

pub use config::{CorsConfig, PresignConfig, ServerConfig, StoreBackend, StoreConfig};
pub use error::{ServerError, ServerResult};
pub use presign::{PresignedUpload, Presigner, UploadQuery};
pub use server::PantryServer;
pub use state::AppState;
