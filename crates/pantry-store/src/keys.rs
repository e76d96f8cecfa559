//! The persisted key layout and key validation.
//!
//! The layout is shared with the static front-end, which fetches these keys
//! directly, so the paths here must not change:
//!
//! - `data/recipes/<id>.json` -- one recipe record
//! - `data/recipes/index.json` -- the catalog index (a JSON array)
//! - `images/recipes/<id>/...` -- image objects of one recipe
//! - `data/contacts/<unix-millis>.json` -- one contact submission

use crate::error::{StoreError, StoreResult};

/// Namespace holding recipe records and the catalog index.
pub const RECIPE_DATA_PREFIX: &str = "data/recipes/";

/// Namespace holding per-recipe image trees.
pub const RECIPE_IMAGES_PREFIX: &str = "images/recipes/";

/// Namespace holding contact submissions.
pub const CONTACTS_PREFIX: &str = "data/contacts/";

/// Key of the catalog index document.
pub const INDEX_KEY: &str = "data/recipes/index.json";

/// Key of the record for recipe `id`.
pub fn recipe_key(id: &str) -> String {
    format!("{RECIPE_DATA_PREFIX}{id}.json")
}

/// Prefix under which all images of recipe `id` live.
///
/// Always ends with `/` so that recipe `1` never matches recipe `10`.
pub fn recipe_images_prefix(id: &str) -> String {
    format!("{RECIPE_IMAGES_PREFIX}{id}/")
}

/// Key of the contact submission received at `unix_millis`.
pub fn contact_key(unix_millis: i64) -> String {
    format!("{CONTACTS_PREFIX}{unix_millis}.json")
}

/// Best-effort content type for `key`, judged by its extension.
pub fn guess_content_type(key: &str) -> String {
    let ext = key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let essence = match ext.as_str() {
        "json" => mime::APPLICATION_JSON,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "webp" => return "image/webp".to_string(),
        "avif" => return "image/avif".to_string(),
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" => mime::APPLICATION_JAVASCRIPT,
        "txt" => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    essence.essence_str().to_string()
}

/// Check that `key` is a well-formed relative object key.
///
/// Rejects empty keys, absolute keys, backslashes, control characters and
/// `.`/`..`/empty path segments. A trailing `/` is not allowed either: keys
/// name objects, not directories.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_key(key, "empty key"));
    }
    if key.starts_with('/') {
        return Err(StoreError::invalid_key(key, "key must be relative"));
    }
    if key.contains('\\') {
        return Err(StoreError::invalid_key(key, "backslash in key"));
    }
    if key.chars().any(char::is_control) {
        return Err(StoreError::invalid_key(key, "control character in key"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(StoreError::invalid_key(key, "empty path segment")),
            "." | ".." => return Err(StoreError::invalid_key(key, "relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
