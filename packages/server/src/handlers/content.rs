//! Conditional and ranged transfer of a stored body.

use std::io::SeekFrom;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::Response;
use chrono::{DateTime, SubsecRound, Utc};
use common::storage::{Blob, BoxReader};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::utils::http::{ByteRange, http_date, parse_http_date};
use crate::utils::sniff::SNIFF_LEN;

/// A body ready to be served, with the validators `serve_content` needs.
pub struct Content {
    pub blob: Blob,
    /// Complete entity tag including quotes, and the `W/` prefix if weak.
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    /// Representation headers (type, disposition, caching) sent with every
    /// response for this content.
    pub headers: HeaderMap,
}

/// Serve `content` for a GET or HEAD request.
///
/// Handles `If-None-Match`/`If-Modified-Since` (304), a single `Range`
/// (206, or 416 when unsatisfiable) subject to `If-Range`, and omits the body
/// for HEAD.
pub async fn serve_content(
    method: &Method,
    request: &HeaderMap,
    content: Content,
) -> Result<Response, AppError> {
    let Content {
        blob,
        etag,
        last_modified,
        mut headers,
    } = content;
    let last_modified = last_modified.trunc_subsecs(0);

    headers.insert(header::ETAG, header_value(&etag)?);
    headers.insert(
        header::LAST_MODIFIED,
        header_value(&http_date(last_modified))?,
    );

    if not_modified(request, &etag, last_modified) {
        headers.remove(header::CONTENT_TYPE);
        headers.remove(header::CONTENT_DISPOSITION);
        return build(StatusCode::NOT_MODIFIED, headers, Body::empty());
    }

    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let len = blob.len;
    let range = match request.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(range) if if_range_holds(request, &etag, last_modified) => {
            ByteRange::parse(range, len)
        }
        _ => ByteRange::Full,
    };

    let mut reader = blob.reader;
    let (status, start, count) = match range {
        ByteRange::Full => (StatusCode::OK, 0, len),
        ByteRange::Partial { start, end } => {
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes {start}-{end}/{len}"))?,
            );
            (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
        }
        ByteRange::Unsatisfiable => {
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes */{len}"))?,
            );
            headers.remove(header::CONTENT_DISPOSITION);
            return build(StatusCode::RANGE_NOT_SATISFIABLE, headers, Body::empty());
        }
    };
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(count));

    if *method == Method::HEAD {
        return build(status, headers, Body::empty());
    }

    if start > 0 {
        reader
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to seek blob: {e}")))?;
    }
    let body = Body::from_stream(ReaderStream::new(reader.take(count)));
    build(status, headers, body)
}

/// Read up to [`SNIFF_LEN`] bytes for content sniffing and rewind.
pub async fn read_head(reader: &mut BoxReader) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut *reader)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await?;
    reader.seek(SeekFrom::Start(0)).await?;
    Ok(head)
}

pub fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid header value {value:?}: {e}")))
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Result<Response, AppError> {
    let mut response = Response::builder()
        .status(status)
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;
    *response.headers_mut() = headers;
    Ok(response)
}

fn not_modified(request: &HeaderMap, etag: &str, last_modified: DateTime<Utc>) -> bool {
    if let Some(if_none_match) = request.get(header::IF_NONE_MATCH) {
        return if_none_match
            .to_str()
            .is_ok_and(|value| etag_list_matches(value, etag));
    }

    request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
        .is_some_and(|since| last_modified <= since)
}

/// Weak comparison against a comma-separated `If-None-Match` list.
fn etag_list_matches(list: &str, etag: &str) -> bool {
    let etag = etag.trim_start_matches("W/");
    list.split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

/// Whether a `Range` header may be honoured given `If-Range`.
fn if_range_holds(request: &HeaderMap, etag: &str, last_modified: DateTime<Utc>) -> bool {
    let Some(value) = request.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let value = value.trim();
    if value.starts_with('"') {
        // Strong comparison; weak tags never satisfy If-Range.
        return !etag.starts_with("W/") && value == etag;
    }
    parse_http_date(value).is_some_and(|date| date == last_modified)
}
