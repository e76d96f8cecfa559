use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use pantry_catalog::CatalogError;
use pantry_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed body or query string.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upload signature missing, malformed, mismatched or expired.
    #[error("upload rejected: {0}")]
    Signature(String),

    /// No presign secret is configured.
    #[error("uploads are disabled on this server")]
    UploadsDisabled,

    #[error("not found")]
    NotFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Catalog(e) => catalog_status(e),
            Self::Store(e) => store_status(e),
            Self::Signature(_) => StatusCode::FORBIDDEN,
            Self::UploadsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn catalog_status(e: &CatalogError) -> StatusCode {
    match e {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        CatalogError::IndexConflict { .. } => StatusCode::CONFLICT,
        CatalogError::Store(e) => store_status(e),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::InvalidKey { .. } => StatusCode::BAD_REQUEST,
        StoreError::PreconditionFailed(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_are_400() {
        let e = ServerError::from(CatalogError::validation("missing id"));
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "missing id");

        let e = ServerError::from(CatalogError::KeyNotAllowed("secrets/x".into()));
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflicts_are_409() {
        let e = ServerError::from(CatalogError::IndexConflict { attempts: 5 });
        assert_eq!(e.status(), StatusCode::CONFLICT);
        let e = ServerError::from(CatalogError::Store(StoreError::PreconditionFailed("k".into())));
        assert_eq!(e.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_failures_are_500() {
        let e = ServerError::from(StoreError::Unavailable("down".into()));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let e = ServerError::from(CatalogError::CorruptIndex("object".into()));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn signature_and_routing() {
        assert_eq!(ServerError::Signature("expired".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ServerError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::UploadsDisabled.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
