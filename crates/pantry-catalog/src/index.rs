//! The catalog index: one JSON array summarizing every recipe.
//!
//! The index lives at `data/recipes/index.json` and is rewritten as a whole
//! on every change. [`IndexDocument`] is its in-memory form, an ordered list
//! of entries plus an id-to-position map, serialized back to the same plain
//! array. [`CatalogIndex`] performs the read-modify-write cycle against the
//! store.
//!
//! # Concurrency
//!
//! The store has no transactions, so two writers racing on the index would
//! each rewrite the whole array. In [`IndexWriteMode::Optimistic`] the write
//! is conditional on the etag that was read and the cycle is retried when
//! another writer got there first. [`IndexWriteMode::LastWriterWins`] writes
//! unconditionally; one of two racing updates is then silently lost.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use pantry_store::keys::INDEX_KEY;
use pantry_store::{
    read_json_or, read_json_versioned, write_json, write_json_if, BlobStore, Precondition,
    StoreError, Versioned,
};

use crate::error::{CatalogError, CatalogResult};
use crate::id::RecipeId;

/// How index rewrites guard against concurrent writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexWriteMode {
    /// Conditional write on the etag read; retry on conflict.
    #[default]
    Optimistic,
    /// Unconditional write; concurrent updates may be lost.
    LastWriterWins,
}

/// Index reconciliation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub write_mode: IndexWriteMode,
    /// Read-modify-write cycles attempted before reporting a conflict.
    pub max_attempts: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            write_mode: IndexWriteMode::Optimistic,
            max_attempts: 5,
        }
    }
}

/// What an upsert did to the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The entry was appended at `position`.
    Inserted { position: usize },
    /// An existing entry at `position` was replaced in place.
    Replaced { position: usize },
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

/// In-memory catalog index.
///
/// Entries keep their stored order. Entries without a string `id` are kept
/// verbatim and never matched by upsert or remove.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexDocument {
    entries: Vec<Value>,
    /// First position of every id.
    positions: HashMap<String, usize>,
    /// Whether some id occurs more than once.
    has_duplicates: bool,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Value>) -> Self {
        let mut doc = Self {
            entries,
            positions: HashMap::new(),
            has_duplicates: false,
        };
        doc.reindex();
        doc
    }

    /// Decode a stored index. Anything but a JSON array is corrupt.
    pub fn from_value(value: Value) -> CatalogResult<Self> {
        match value {
            Value::Array(entries) => Ok(Self::from_entries(entries)),
            other => Err(CatalogError::CorruptIndex(format!(
                "expected a JSON array, found {}",
                json_kind(&other)
            ))),
        }
    }

    fn reindex(&mut self) {
        self.positions.clear();
        self.has_duplicates = false;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(id) = entry_id(entry) {
                if self.positions.contains_key(id) {
                    self.has_duplicates = true;
                } else {
                    self.positions.insert(id.to_string(), i);
                }
            }
        }
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Value> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.position(id).map(|i| &self.entries[i])
    }

    /// Insert or replace the entry carrying `patch`'s id.
    ///
    /// An existing entry is replaced in place; later duplicates of the same id
    /// are dropped so the id ends up unique. Otherwise the patch is appended.
    /// Entries with other ids keep their relative order either way.
    pub fn upsert(&mut self, patch: Value) -> CatalogResult<UpsertOutcome> {
        let id = RecipeId::from_document(&patch)?;
        match self.position(id.as_str()) {
            Some(position) => {
                self.entries[position] = patch;
                if self.has_duplicates {
                    let mut i = 0;
                    self.entries.retain(|entry| {
                        let keep = i == position || entry_id(entry) != Some(id.as_str());
                        i += 1;
                        keep
                    });
                    self.reindex();
                }
                Ok(UpsertOutcome::Replaced { position })
            }
            None => {
                let position = self.entries.len();
                self.entries.push(patch);
                self.positions.insert(id.into_inner(), position);
                Ok(UpsertOutcome::Inserted { position })
            }
        }
    }

    /// Drop every entry with `id`. Returns how many were dropped.
    pub fn remove(&mut self, id: &str) -> usize {
        if !self.positions.contains_key(id) {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|entry| entry_id(entry) != Some(id));
        self.reindex();
        before - self.entries.len()
    }
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read-modify-write access to the stored catalog index.
#[derive(Clone)]
pub struct CatalogIndex {
    store: Arc<dyn BlobStore>,
    config: IndexConfig,
}

impl CatalogIndex {
    pub fn new(store: Arc<dyn BlobStore>, config: IndexConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Current index; empty when none has been written yet.
    pub async fn load(&self) -> CatalogResult<IndexDocument> {
        let value = read_json_or(self.store.as_ref(), INDEX_KEY, Value::Array(Vec::new())).await?;
        IndexDocument::from_value(value)
    }

    /// Insert or replace the entry for `patch`'s id.
    pub async fn upsert(&self, patch: Value) -> CatalogResult<UpsertOutcome> {
        RecipeId::from_document(&patch)?;
        let outcome = self.modify(|doc| doc.upsert(patch.clone())).await?;
        debug!(?outcome, "index entry upserted");
        Ok(outcome)
    }

    /// Remove every entry for `id`. Returns how many were removed.
    pub async fn remove(&self, id: &RecipeId) -> CatalogResult<usize> {
        let removed = self.modify(|doc| Ok(doc.remove(id.as_str()))).await?;
        debug!(%id, removed, "index entry removed");
        Ok(removed)
    }

    async fn modify<F, R>(&self, mut apply: F) -> CatalogResult<R>
    where
        F: FnMut(&mut IndexDocument) -> CatalogResult<R>,
    {
        match self.config.write_mode {
            IndexWriteMode::LastWriterWins => {
                let mut doc = self.load().await?;
                let result = apply(&mut doc)?;
                write_json(self.store.as_ref(), INDEX_KEY, &doc).await?;
                Ok(result)
            }
            IndexWriteMode::Optimistic => {
                let attempts = self.config.max_attempts.max(1);
                for attempt in 1..=attempts {
                    let read: Option<Versioned<Value>> =
                        read_json_versioned(self.store.as_ref(), INDEX_KEY).await?;
                    let (mut doc, precondition) = match read {
                        Some(v) => (IndexDocument::from_value(v.value)?, Precondition::Matches(v.etag)),
                        None => (IndexDocument::new(), Precondition::Absent),
                    };
                    let result = apply(&mut doc)?;
                    match write_json_if(self.store.as_ref(), INDEX_KEY, &doc, precondition).await {
                        Ok(_) => return Ok(result),
                        Err(StoreError::PreconditionFailed(_)) => {
                            debug!(attempt, "index changed while updating; retrying");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                warn!(attempts, "giving up on index update after repeated conflicts");
                Err(CatalogError::IndexConflict { attempts })
            }
        }
    }
}

impl std::fmt::Debug for CatalogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogIndex")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
