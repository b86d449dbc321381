use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use common::storage::StorageError;

use crate::repository::RepositoryError;

/// Application-level error type.
///
/// Every variant renders as a short plain-text reason. Internal details are
/// logged, never sent to the client.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    TooLarge,
    NotFound,
    /// Contains the value for the `Allow` header.
    MethodNotAllowed {
        allow: &'static str,
    },
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = match &self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                status.canonical_reason().unwrap_or_default().to_string()
            }
            _ => status.canonical_reason().unwrap_or_default().to_string(),
        };

        let mut response = (status, format!("{reason}\n")).into_response();
        if let AppError::MethodNotAllowed { allow } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(hash) => {
                tracing::warn!(checksum = %hash, "Blob missing from storage");
                AppError::NotFound
            }
            StorageError::SizeLimitExceeded { .. } => AppError::TooLarge,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound,
            other => AppError::Internal(other.to_string()),
        }
    }
}
