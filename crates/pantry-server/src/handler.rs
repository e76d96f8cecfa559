use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use pantry_catalog::{
    CatalogError, ContactForm, DeleteObjectRequest, DeleteRecipeRequest, SaveRecipeRequest,
};
use pantry_store::keys::guess_content_type;
use pantry_store::PutOptions;

use crate::error::{ServerError, ServerResult};
use crate::presign::{PresignedUpload, Presigner, UploadQuery};
use crate::state::AppState;

/// Body of an `/upload-url` call.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadUrlRequest {
    pub key: String,
    pub content_type: Option<String>,
}

/// Query string of a local multipart upload.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocalUploadQuery {
    pub key: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "pantry-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn save_recipe(
    State(state): State<AppState>,
    payload: Result<Json<SaveRecipeRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    let saved = state.catalog.save_recipe(request).await?;
    Ok(Json(json!({ "ok": true, "id": saved.id.as_str() })))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRecipeRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    let (id, _report) = state.catalog.delete_recipe(&request).await?;
    Ok(Json(json!({ "ok": true, "id": id.as_str() })))
}

pub async fn delete_object(
    State(state): State<AppState>,
    payload: Result<Json<DeleteObjectRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    state.catalog.delete_object(&request).await?;
    Ok(Json(json!({ "ok": true, "key": request.key })))
}

pub async fn upload_url(
    State(state): State<AppState>,
    payload: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> ServerResult<Json<PresignedUpload>> {
    let Json(request) = payload?;
    let presigner = presigner(&state)?;
    if request.key.is_empty() {
        return Err(CatalogError::validation("missing key").into());
    }
    state.catalog.upload_guard().check(&request.key)?;

    let content_type = request
        .content_type
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| guess_content_type(&request.key));
    let upload = presigner.presign(&request.key, &content_type, Utc::now().timestamp());
    info!(key = %request.key, %content_type, expires_at = upload.expires_at, "upload URL issued");
    Ok(Json(upload))
}

/// Receive a presigned upload.
pub async fn upload(
    State(state): State<AppState>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let Query(query) = query?;
    presigner(&state)?.verify(&query, Utc::now().timestamp())?;

    match headers.get(CONTENT_TYPE) {
        Some(sent) if sent.as_bytes() == query.content_type.as_bytes() => {}
        Some(_) => {
            return Err(ServerError::Signature(
                "content type does not match the signed URL".into(),
            ))
        }
        None => return Err(ServerError::Signature("missing content type".into())),
    }
    state.catalog.upload_guard().check(&query.key)?;

    let size = body.len();
    state
        .store
        .put(&query.key, body, PutOptions::with_content_type(query.content_type))
        .await?;
    info!(key = %query.key, size, "upload stored");
    Ok(Json(json!({ "ok": true, "key": query.key })))
}

/// Multipart upload straight into a filesystem store, for local authoring.
///
/// The object is written under `key` from the `file` part. Only mounted when
/// the store is the local filesystem.
pub async fn local_upload(
    State(state): State<AppState>,
    query: Result<Query<LocalUploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<Value>> {
    let Query(query) = query?;
    let key = query.key.trim_start_matches('/');
    if key.is_empty() {
        return Err(CatalogError::validation("missing key").into());
    }
    state.catalog.upload_guard().check(key)?;

    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_owned)
            .unwrap_or_else(|| guess_content_type(key));
        let body = field.bytes().await?;
        let size = body.len();
        state
            .store
            .put(key, body, PutOptions::with_content_type(content_type))
            .await?;
        info!(key, size, "local upload stored");
        return Ok(Json(json!({ "ok": true, "key": key })));
    }
    Err(ServerError::BadRequest("missing file".into()))
}

/// Contact form intake. Spam is acknowledged exactly like a stored message.
pub async fn contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(form) = payload?;
    state.catalog.submit_contact(&form).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

fn presigner(state: &AppState) -> ServerResult<&Presigner> {
    state.presigner.as_ref().ok_or(ServerError::UploadsDisabled)
}
