use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use minbar_media::MediaError;

/// Error taxonomy exposed to clients.
///
/// Validation and auth failures carry their own message; backend failures
/// respond with a generic retry-able message and log the detail, so store
/// internals never leak into a response body. Cleanup failures are not
/// represented here at all — the media layer logs and swallows them.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Deliberately generic: the caller cannot distinguish "no such PIN"
    /// from "wrong role", which would otherwise allow PIN enumeration.
    #[error("invalid PIN or role")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("this action is not available to your role")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("storage backend unavailable, please try again")]
    Unavailable,

    #[error("something went wrong, please try again")]
    Backend(#[source] anyhow::Error),
}

impl ApiError {
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Backend(err.into())
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidImage(msg) => ApiError::Validation(msg),
            MediaError::NotFound => ApiError::NotFound,
            MediaError::BackendUnavailable => ApiError::Unavailable,
            MediaError::Backend(e) => ApiError::Backend(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ApiError::Backend(e) = &self {
            error!("Backend error: {:#}", e);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
