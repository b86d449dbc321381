use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use common::storage::{BlobStore, ContentHash, StagedBlob};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::repository::NewFile;
use crate::state::AppState;
use crate::utils::filename::{public_extension, validate_upload_name};

/// Name of the multipart part carrying the file.
pub const FILE_FIELD: &str = "file";

/// Allowance for multipart boundaries and part headers on top of the file
/// itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let limit = max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Stores the `file` multipart part and redirects to its public link. \
        Identical content is stored once; every upload gets its own id.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 303, description = "Uploaded; `Location` holds `/<id><ext>`", body = String, content_type = "text/plain"),
        (status = 400, description = "Not multipart, missing `file` part, or invalid name", body = String),
        (status = 413, description = "File exceeds the configured maximum", body = String),
    ),
)]
#[instrument(skip(state, headers, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let max_size = state.config.storage.max_upload_size;
    if let Some(declared) = declared_length(&headers)
        && declared > max_size
    {
        return Err(AppError::TooLarge);
    }

    let mut multipart =
        multipart.map_err(|e| AppError::BadRequest(format!("invalid upload: {}", e.body_text())))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_owned();
        validate_upload_name(&name).map_err(|e| AppError::BadRequest(e.message().into()))?;

        let (staged, checksum, size) =
            stream_field_to_store(field, state.blob_store.as_ref(), max_size).await?;

        let id = state
            .repository
            .create(NewFile {
                name: name.clone(),
                size,
                checksum,
            })
            .await?;
        staged.publish().await?;

        info!(%id, size, %checksum, "File uploaded");

        let location = format!("/{id}{}", public_extension(&name));
        return Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, &location)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(format!("{location}\n").into())
            .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")));
    }

    Err(AppError::BadRequest(format!("missing `{FILE_FIELD}` part")))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge
    } else {
        AppError::BadRequest(format!("upload read error: {}", err.body_text()))
    }
}

/// Stream a multipart field into a staged blob, hashing as it goes.
///
/// The returned blob is sealed but not yet published; dropping it discards
/// the temporary file.
async fn stream_field_to_store(
    mut field: Field<'_>,
    blob_store: &dyn BlobStore,
    max_size: u64,
) -> Result<(Box<dyn StagedBlob>, ContentHash, u64), AppError> {
    let mut staged = blob_store.stage(Some(max_size)).await?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        staged.write(&chunk).await?;
    }

    let (checksum, size) = staged.seal().await?;
    Ok((staged, checksum, size))
}
