use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;

/// Error returned by the HTTP handlers.
///
/// Bodies are plain text, which is what the Sigfox backend logs for a
/// failed callback.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The store could not persist or load readings.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Storage(msg) => {
                error!("Error saving to database: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::UnsupportedMediaType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!(
                    "Expected application/json or application/x-www-form-urlencoded, got '{}'",
                    content_type
                ),
            )
                .into_response(),
        }
    }
}
