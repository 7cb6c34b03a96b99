use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::worker::WorkerError;

/// Errors surfaced by the HTTP handlers.
///
/// Pipeline failures are deliberately opaque to clients: every cause
/// becomes the same 500 "colorization failed". The detail goes to the log.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("not found")]
    NotFound,

    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<axum::extract::multipart::MultipartError> for WebError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        WebError::Upload {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            WebError::Upload { status, message } => (status, message).into_response(),
            WebError::Worker(WorkerError::Colorize(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "colorization failed").into_response()
            }
            WebError::Worker(WorkerError::Unavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, "inference worker unavailable").into_response()
            }
            WebError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            WebError::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
