use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SubsecRound, Utc};
use common::storage::{Blob, StorageError};
use tokio::fs;
use tracing::{error, instrument};

use super::content::{Content, header_value, read_head, serve_content};
use crate::error::AppError;
use crate::repository::FileEntry;
use crate::state::AppState;
use crate::utils::filename::strip_extension;
use crate::utils::http::{content_disposition_value, http_date};
use crate::utils::mime::downgrade_markup;
use crate::utils::sniff::sniff;

const ALLOW: &str = "GET, HEAD, OPTIONS";
const ALLOW_ROOT: &str = "GET, HEAD, OPTIONS, POST";

/// Cache lifetime for content that never changes under its URL.
const IMMUTABLE_CACHE: &str = "max-age=31536000";

/// Entry point for every request not handled by an explicit route: static
/// assets first, then uploaded files by id.
#[utoipa::path(
    get,
    path = "/{file}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Download an uploaded file",
    description = "Serves the file with the given id. Anything after the first `.` is \
        ignored. Supports conditional and single-range requests.",
    params(("file" = String, Path, description = "`<id>` optionally followed by an extension")),
    responses(
        (status = 200, description = "File content"),
        (status = 206, description = "Requested byte range"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Unknown or expired file", body = String),
        (status = 416, description = "Range not satisfiable"),
    ),
)]
#[instrument(skip(state, headers), fields(path = %uri.path()))]
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let path = uri.path();
    let allow = if path == "/" { ALLOW_ROOT } else { ALLOW };

    if method == Method::OPTIONS {
        let allow = HeaderValue::from_static(allow);
        return Ok((
            StatusCode::OK,
            [
                (header::ALLOW, allow.clone()),
                (header::ACCESS_CONTROL_ALLOW_METHODS, allow),
            ],
        )
            .into_response());
    }
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::MethodNotAllowed { allow });
    }

    if let Some(content) = static_asset(&state, path).await? {
        return serve_content(&method, &headers, content).await;
    }

    let content = uploaded_file(&state, path).await?;
    serve_content(&method, &headers, content).await
}

/// Resolve `path` against the web root. `None` when no regular file matches.
async fn static_asset(state: &AppState, path: &str) -> Result<Option<Content>, AppError> {
    let Some(mut file_path) = web_path(&state.config.web.path, path) else {
        return Ok(None);
    };

    let mut metadata = match fs::metadata(&file_path).await {
        Ok(metadata) => metadata,
        Err(_) => return Ok(None),
    };
    if metadata.is_dir() {
        file_path.push("index.html");
        metadata = match fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };
    }
    if !metadata.is_file() {
        return Ok(None);
    }

    let file = fs::File::open(&file_path).await.map_err(StorageError::from)?;
    let mut blob = Blob {
        reader: Box::new(file),
        len: metadata.len(),
    };

    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
        .trunc_subsecs(0);

    let file_name = file_path.to_string_lossy();
    let content_type = match state.mime.by_name(&file_name) {
        Some(content_type) => content_type,
        None => {
            let head = read_head(&mut blob.reader)
                .await
                .map_err(StorageError::from)?;
            sniff(&head).to_owned()
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(&content_type)?);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE),
    );

    Ok(Some(Content {
        blob,
        etag: format!(
            "W/\"{:x}-{:x}\"",
            modified.timestamp(),
            metadata.len()
        ),
        last_modified: modified,
        headers,
    }))
}

/// Map a request path onto the web root, refusing anything that could
/// escape it.
fn web_path(root: &Path, path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        resolved.push(segment);
    }
    Some(resolved)
}

async fn uploaded_file(state: &AppState, path: &str) -> Result<Content, AppError> {
    let segment = path.strip_prefix('/').unwrap_or(path);
    if segment.contains('/') {
        return Err(AppError::NotFound);
    }
    let id = strip_extension(segment);
    if id.is_empty() {
        return Err(AppError::NotFound);
    }

    let entry = state.repository.lookup(id).await?;
    let now = Utc::now();
    if entry.is_expired(now) {
        return Err(AppError::NotFound);
    }

    let mut blob = match state.blob_store.open(&entry.checksum).await {
        Ok(blob) => blob,
        Err(StorageError::NotFound(_)) => {
            error!(id = %entry.id, checksum = %entry.checksum, "Blob missing for live file");
            return Err(AppError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = match state.mime.by_name(&entry.name) {
        Some(content_type) => content_type,
        None => {
            let head = read_head(&mut blob.reader)
                .await
                .map_err(StorageError::from)?;
            sniff(&head).to_owned()
        }
    };

    let mut headers = cache_headers(&entry, now)?;
    headers.insert(
        header::CONTENT_TYPE,
        header_value(&downgrade_markup(&content_type))?,
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition_value(&entry.name))?,
    );

    Ok(Content {
        blob,
        etag: format!("\"{}\"", entry.checksum.to_hex()),
        last_modified: entry.timestamp,
        headers,
    })
}

fn cache_headers(entry: &FileEntry, now: DateTime<Utc>) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    match entry.expires {
        None => {
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(IMMUTABLE_CACHE),
            );
        }
        Some(expires) => {
            let remaining = (expires - now).num_seconds().max(0);
            headers.insert(
                header::CACHE_CONTROL,
                header_value(&format!("public, must-revalidate, max-age={remaining}"))?,
            );
            headers.insert(header::EXPIRES, header_value(&http_date(expires))?);
        }
    }
    Ok(headers)
}
