use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;

use crate::types::ErrorResponse;

/// Failures a [`Feed`](crate::feed::Feed) implementation may report.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The cursor was not produced by this feed.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("{0}")]
    Internal(String),
}

/// Failures while resolving a feed URI or aggregating feed descriptions.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("{0}")]
    BadRequest(String),

    /// The URI does not start with any acceptable `at://<did>/app.bsky.feed.generator/` prefix.
    #[error("{0}")]
    UnsupportedActor(String),

    #[error("{0}")]
    NotFound(String),

    #[error("failed to describe feeds: {0}")]
    Describe(#[source] FeedError),
}

/// An error returned from an HTTP handler, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(e: RouterError) -> Self {
        match e {
            RouterError::BadRequest(msg) | RouterError::UnsupportedActor(msg) => {
                ApiError::BadRequest(msg)
            }
            RouterError::NotFound(msg) => ApiError::NotFound(msg),
            e @ RouterError::Describe(_) => ApiError::Internal(e.to_string()),
        }
    }
}

// InvalidCursor stays a 500 so clients see the same status as any other page failure.
impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        ApiError::Internal(format!("failed to get feed items: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed with {}: {}", status, self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
