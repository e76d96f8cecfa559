use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use pantry_catalog::{CatalogConfig, ContactConfig, IndexConfig, PurgeConfig};
use pantry_store::{BlobStore, FsBlobStore, InMemoryBlobStore};

use crate::error::{ServerError, ServerResult};

/// Server configuration. Every section is optional in the TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Path prefix all routes are mounted under, e.g. an API gateway stage.
    pub route_prefix: String,
    /// Externally visible base URL, used in presigned upload URLs.
    pub public_url: Option<String>,
    pub max_body_bytes: usize,
    /// Serve the store root as a static site (filesystem backend only).
    pub serve_static: bool,
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub purge: PurgeConfig,
    pub presign: PresignConfig,
    pub contact: ContactConfig,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            route_prefix: String::new(),
            public_url: None,
            max_body_bytes: 10 * 1024 * 1024,
            serve_static: false,
            store: StoreConfig::default(),
            index: IndexConfig::default(),
            purge: PurgeConfig::default(),
            presign: PresignConfig::default(),
            contact: ContactConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Fs,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory of the filesystem backend.
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            root: PathBuf::from("site"),
        }
    }
}

impl StoreConfig {
    pub async fn open(&self) -> ServerResult<Arc<dyn BlobStore>> {
        match self.backend {
            StoreBackend::Fs => {
                let store = FsBlobStore::open(self.root.clone()).await?;
                info!(root = %self.root.display(), "opened filesystem store");
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                info!("using in-memory store; nothing will be persisted");
                Ok(Arc::new(InMemoryBlobStore::new()))
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresignConfig {
    /// Key material for upload signatures. Uploads are disabled without it.
    pub secret: Option<String>,
    pub expires_secs: u64,
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            secret: None,
            expires_secs: 900,
        }
    }
}

impl std::fmt::Debug for PresignConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresignConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("expires_secs", &self.expires_secs)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `*` or a single exact origin.
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> ServerResult<Self> {
        toml::from_str(source).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read `path` if given, then apply `PANTRY_*` environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading configuration");
                Self::from_toml_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("PANTRY_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::Config(format!("PANTRY_BIND_ADDR={addr}: {e}")))?;
            info!(%addr, "PANTRY_BIND_ADDR override applied");
        }
        if let Some(root) = lookup("PANTRY_STORE_ROOT") {
            info!(%root, "PANTRY_STORE_ROOT override applied");
            self.store.root = PathBuf::from(root);
        }
        if let Some(secret) = lookup("PANTRY_PRESIGN_SECRET") {
            info!("PANTRY_PRESIGN_SECRET override applied");
            self.presign.secret = Some(secret);
        }
        if let Some(url) = lookup("PANTRY_PUBLIC_URL") {
            info!(%url, "PANTRY_PUBLIC_URL override applied");
            self.public_url = Some(url);
        }
        Ok(())
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            index: self.index.clone(),
            purge: self.purge.clone(),
            contact: self.contact.clone(),
        }
    }

    /// The route prefix with a leading `/` and no trailing `/`; empty when
    /// routes sit at the root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.route_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Absolute URL of the upload endpoint handed out in presigned URLs.
    pub fn upload_endpoint(&self) -> String {
        let base = match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.bind_addr),
        };
        format!("{base}{}/upload", self.normalized_prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_catalog::IndexWriteMode;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(c.store.backend, StoreBackend::Fs);
        assert_eq!(c.presign.expires_secs, 900);
        assert!(c.presign.secret.is_none());
        assert_eq!(c.cors.allow_origin, "*");
        assert_eq!(c.upload_endpoint(), "http://127.0.0.1:8000/upload");
    }

    #[test]
    fn toml_sections_merge_with_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            route_prefix = "/prod/"
            public_url = "https://api.example.org/"

            [store]
            backend = "memory"

            [index]
            write_mode = "last_writer_wins"

            [presign]
            secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(c.store.backend, StoreBackend::Memory);
        assert_eq!(c.store.root, PathBuf::from("site"));
        assert_eq!(c.index.write_mode, IndexWriteMode::LastWriterWins);
        assert_eq!(c.presign.expires_secs, 900);
        assert_eq!(c.normalized_prefix(), "/prod");
        assert_eq!(c.upload_endpoint(), "https://api.example.org/prod/upload");
        assert_eq!(c.catalog_config().index.write_mode, IndexWriteMode::LastWriterWins);
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let err = ServerConfig::from_toml_str("[store]\nbackend = \"s3\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PANTRY_BIND_ADDR", "0.0.0.0:9000"),
            ("PANTRY_STORE_ROOT", "/srv/pantry"),
            ("PANTRY_PRESIGN_SECRET", "k"),
        ]
        .into();
        let mut c = ServerConfig::default();
        c.apply_env(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.store.root, PathBuf::from("/srv/pantry"));
        assert_eq!(c.presign.secret.as_deref(), Some("k"));
        assert!(c.public_url.is_none());
    }

    #[test]
    fn bad_bind_addr_override() {
        let mut c = ServerConfig::default();
        let err = c
            .apply_env(|name| (name == "PANTRY_BIND_ADDR").then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let presign = PresignConfig {
            secret: Some("hunter2".into()),
            ..PresignConfig::default()
        };
        assert!(!format!("{presign:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn opens_configured_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Fs,
            root: dir.path().join("site"),
        };
        let store = config.open().await.unwrap();
        assert!(store.get("data/recipes/index.json").await.unwrap().is_none());
    }
}
