use axum::Json;
use utoipa::OpenApi;

use crate::ApiDoc;

/// OpenAPI description of the public HTTP surface.
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
