//! Recipe identifier validation.
//!
//! A recipe id becomes a single path segment of several store keys
//! (`data/recipes/<id>.json`, `images/recipes/<id>/`), so it must be safe
//! to embed there:
//! - Must be non-empty
//! - Must not contain `/`, `\` or control characters
//! - Must not start with `.`
//! - Must not be `index`, which would alias the catalog index document

use std::fmt;

use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};

/// Id that would make a record key collide with the index key.
const RESERVED_ID: &str = "index";

/// A validated recipe identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipeId(String);

impl RecipeId {
    /// Validate `raw` as a recipe id.
    ///
    /// # Examples
    ///
    /// ```
    /// use pantry_catalog::RecipeId;
    ///
    /// assert!(RecipeId::parse("borscht-2").is_ok());
    /// assert!(RecipeId::parse("").is_err());
    /// assert!(RecipeId::parse("../etc").is_err());
    /// ```
    pub fn parse(raw: &str) -> CatalogResult<Self> {
        if raw.is_empty() {
            return Err(CatalogError::validation("missing id"));
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(CatalogError::validation(format!(
                "invalid id {raw:?}: must not contain path separators"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(CatalogError::validation(format!(
                "invalid id {raw:?}: must not contain control characters"
            )));
        }
        if raw.starts_with('.') {
            return Err(CatalogError::validation(format!(
                "invalid id {raw:?}: must not start with '.'"
            )));
        }
        if raw == RESERVED_ID {
            return Err(CatalogError::validation(format!(
                "invalid id {raw:?}: reserved for the catalog index"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Extract and validate the `id` field of a JSON document.
    ///
    /// A missing field, a non-string field and an empty string all report
    /// `missing id`.
    pub fn from_document(doc: &Value) -> CatalogResult<Self> {
        match doc.get("id").and_then(Value::as_str) {
            Some(raw) => Self::parse(raw),
            None => Err(CatalogError::validation("missing id")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
