use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put, MethodRouter};
use axum::Router;
use pantry_store::keys::CONTACTS_PREFIX;
use percent_encoding::percent_decode_str;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{CorsConfig, ServerConfig, StoreBackend};
use crate::error::{ServerError, ServerResult};
use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Pantry endpoints.
pub fn build_router(state: AppState, config: &ServerConfig) -> ServerResult<Router> {
    let upload: MethodRouter<AppState> = match config.store.backend {
        StoreBackend::Fs => put(handler::upload).post(handler::local_upload),
        StoreBackend::Memory => put(handler::upload),
    };
    let api = Router::new()
        .route("/health", get(handler::health))
        .route("/save-recipe", post(handler::save_recipe))
        .route("/delete-recipe", post(handler::delete_recipe))
        .route("/delete-object", post(handler::delete_object))
        .route("/upload-url", post(handler::upload_url))
        .route("/upload", upload)
        .route("/contact", post(handler::contact))
        .with_state(state);

    let prefix = config.normalized_prefix();
    let app = if prefix.is_empty() {
        api
    } else {
        info!(%prefix, "mounting routes under prefix");
        Router::new().nest(&prefix, api)
    };

    let app = match (config.serve_static, config.store.backend) {
        (true, StoreBackend::Fs) => {
            info!(root = %config.store.root.display(), "serving store root as static site");
            let site = Router::new()
                .fallback_service(ServeDir::new(&config.store.root).append_index_html_on_directories(true))
                .layer(middleware::from_fn(hide_private_paths));
            app.fallback_service(site)
        }
        (true, StoreBackend::Memory) => {
            warn!("serve_static ignored for the in-memory store");
            app.fallback(handler::not_found)
        }
        (false, _) => app.fallback(handler::not_found),
    };

    Ok(app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors)?))
}

/// Static requests never reach objects under the contacts namespace.
async fn hide_private_paths(request: Request, next: Next) -> Response {
    if is_private_path(request.uri().path()) {
        return ServerError::NotFound.into_response();
    }
    next.run(request).await
}

/// Whether a request path resolves into the contacts namespace, after the
/// same decoding and segment normalization the static file service applies.
fn is_private_path(path: &str) -> bool {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let mut segments = decoded.split('/').filter(|s| !s.is_empty() && *s != ".");
    CONTACTS_PREFIX
        .split('/')
        .filter(|s| !s.is_empty())
        .all(|private| segments.next().is_some_and(|s| s.eq_ignore_ascii_case(private)))
}

fn cors_layer(config: &CorsConfig) -> ServerResult<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::OPTIONS, Method::POST, Method::PUT, Method::GET])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));
    if config.allow_origin == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let origin = HeaderValue::from_str(&config.allow_origin)
        .map_err(|e| ServerError::Config(format!("cors.allow_origin: {e}")))?;
    Ok(layer.allow_origin(AllowOrigin::exact(origin)))
}
