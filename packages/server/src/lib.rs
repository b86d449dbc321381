pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod reaper;
pub mod repository;
pub mod routes;
pub mod state;
pub mod utils;

use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Filedrop API",
        version = "1.0.0",
        description = "Upload files and share them by short, expiring links"
    ),
    paths(handlers::upload::upload, handlers::files::dispatch),
    tags((name = "Files", description = "Uploading and downloading files")),
)]
pub struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    routes::routes(&state.config)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
