use axum::Router;
use axum::routing::{get, post};

use crate::config::AppConfig;
use crate::handlers::{docs, files, upload};
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(upload::upload)
                .layer(upload::upload_body_limit(config.storage.max_upload_size))
                .fallback(files::dispatch),
        )
        .route(
            "/api-docs/openapi.json",
            get(docs::openapi).fallback(files::dispatch),
        )
        .fallback(files::dispatch)
}
