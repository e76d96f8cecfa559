//! Presigned upload URLs.
//!
//! A presigned URL points at this server's own `PUT /upload` endpoint and
//! carries the object key, the content type the client must send, an expiry
//! (unix seconds) and a keyed BLAKE3 MAC over the three. Holding the URL is
//! the only authorization the upload endpoint checks.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::config::PresignConfig;
use crate::error::{ServerError, ServerResult};

const KEY_CONTEXT: &str = "pantry presigned upload v1";

/// Unreserved characters per RFC 3986 stay as-is.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// What the client receives from `/upload-url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub url: String,
    pub method: String,
    pub expires_at: i64,
    pub content_type: String,
}

/// Query string of a presigned upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub key: String,
    pub content_type: String,
    pub expires: i64,
    pub signature: String,
}

#[derive(Clone)]
pub struct Presigner {
    mac_key: [u8; 32],
    expires_secs: i64,
    upload_endpoint: String,
}

impl Presigner {
    pub fn new(secret: &str, expires_secs: u64, upload_endpoint: impl Into<String>) -> Self {
        Self {
            mac_key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            expires_secs: i64::try_from(expires_secs).unwrap_or(i64::MAX),
            upload_endpoint: upload_endpoint.into(),
        }
    }

    /// `None` when no secret is configured.
    pub fn from_config(config: &PresignConfig, upload_endpoint: impl Into<String>) -> Option<Self> {
        config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|secret| Self::new(secret, config.expires_secs, upload_endpoint))
    }

    pub fn upload_endpoint(&self) -> &str {
        &self.upload_endpoint
    }

    fn mac(&self, key: &str, content_type: &str, expires: i64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.mac_key);
        // Length-prefixed so that field boundaries cannot shift.
        for field in [key.as_bytes(), content_type.as_bytes()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.update(&expires.to_le_bytes());
        hasher.finalize()
    }

    /// Sign an upload of `key` valid until `now + expires_secs`.
    pub fn presign(&self, key: &str, content_type: &str, now: i64) -> PresignedUpload {
        let expires_at = now.saturating_add(self.expires_secs);
        let signature = self.mac(key, content_type, expires_at).to_hex();
        let url = format!(
            "{}?key={}&contentType={}&expires={}&signature={}",
            self.upload_endpoint,
            utf8_percent_encode(key, QUERY_VALUE),
            utf8_percent_encode(content_type, QUERY_VALUE),
            expires_at,
            signature,
        );
        PresignedUpload {
            url,
            method: "PUT".into(),
            expires_at,
            content_type: content_type.to_string(),
        }
    }

    /// Accept `query` only if it was signed by this presigner and has not
    /// expired at `now`.
    pub fn verify(&self, query: &UploadQuery, now: i64) -> ServerResult<()> {
        let given = blake3::Hash::from_hex(&query.signature)
            .map_err(|_| ServerError::Signature("malformed signature".into()))?;
        // blake3::Hash equality is constant-time.
        if given != self.mac(&query.key, &query.content_type, query.expires) {
            return Err(ServerError::Signature("signature mismatch".into()));
        }
        if now > query.expires {
            return Err(ServerError::Signature("upload URL expired".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presigner")
            .field("expires_secs", &self.expires_secs)
            .field("upload_endpoint", &self.upload_endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn presigner() -> Presigner {
        Presigner::new("test-secret", 900, "http://pantry.test/upload")
    }

    fn query_of(upload: &PresignedUpload, key: &str) -> UploadQuery {
        let signature = upload.url.rsplit("signature=").next().unwrap().to_string();
        UploadQuery {
            key: key.to_string(),
            content_type: upload.content_type.clone(),
            expires: upload.expires_at,
            signature,
        }
    }

    #[test]
    fn url_carries_encoded_fields() {
        let upload = presigner().presign("images/recipes/r1/a b.jpg", "image/jpeg", NOW);
        assert_eq!(upload.method, "PUT");
        assert_eq!(upload.expires_at, NOW + 900);
        assert!(upload.url.starts_with(
            "http://pantry.test/upload?key=images%2Frecipes%2Fr1%2Fa%20b.jpg&contentType=image%2Fjpeg&expires=1760000900&signature="
        ));
    }

    #[test]
    fn signed_query_verifies() {
        let p = presigner();
        let upload = p.presign("images/recipes/r1/a.jpg", "image/jpeg", NOW);
        p.verify(&query_of(&upload, "images/recipes/r1/a.jpg"), NOW + 10).unwrap();
    }

    #[test]
    fn tampered_fields_fail() {
        let p = presigner();
        let upload = p.presign("images/recipes/r1/a.jpg", "image/jpeg", NOW);

        let other_key = query_of(&upload, "images/recipes/r2/a.jpg");
        assert!(matches!(p.verify(&other_key, NOW), Err(ServerError::Signature(_))));

        let mut other_type = query_of(&upload, "images/recipes/r1/a.jpg");
        other_type.content_type = "text/html".into();
        assert!(p.verify(&other_type, NOW).is_err());

        let mut extended = query_of(&upload, "images/recipes/r1/a.jpg");
        extended.expires += 3600;
        assert!(p.verify(&extended, NOW).is_err());

        let mut garbage = query_of(&upload, "images/recipes/r1/a.jpg");
        garbage.signature = "zz".into();
        assert!(p.verify(&garbage, NOW).is_err());
    }

    #[test]
    fn expired_url_fails() {
        let p = presigner();
        let upload = p.presign("images/recipes/r1/a.jpg", "image/jpeg", NOW);
        let err = p
            .verify(&query_of(&upload, "images/recipes/r1/a.jpg"), NOW + 901)
            .unwrap_err();
        assert_eq!(err.to_string(), "upload rejected: upload URL expired");
    }

    #[test]
    fn different_secret_fails() {
        let upload = presigner().presign("images/recipes/r1/a.jpg", "image/jpeg", NOW);
        let other = Presigner::new("another", 900, "http://pantry.test/upload");
        assert!(other.verify(&query_of(&upload, "images/recipes/r1/a.jpg"), NOW).is_err());
    }

    #[test]
    fn missing_secret_disables_presigning() {
        assert!(Presigner::from_config(&PresignConfig::default(), "http://x/upload").is_none());
        let config = PresignConfig {
            secret: Some("k".into()),
            expires_secs: 60,
        };
        assert!(Presigner::from_config(&config, "http://x/upload").is_some());
    }
}
