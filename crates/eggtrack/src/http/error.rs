//! Error responses for the HTTP facade.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::Error;

/// Errors returned by request handlers.
///
/// Every variant is rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input fields.
    #[error("{0}")]
    BadRequest(String),

    /// Secret missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// The requested entry does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Anything else; details are logged, not returned.
    #[error("{public}")]
    Internal {
        /// Message sent to the caller.
        public: &'static str,
        /// Logged cause.
        detail: String,
    },
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    ///
    /// - BadRequest: 400
    /// - Unauthorized: 401
    /// - NotFound: 404
    /// - Internal: 500
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Wrap a crate error with the message a caller sees if it is a server fault.
    #[must_use]
    pub fn from_error(err: Error, public: &'static str) -> Self {
        match err {
            Error::Validation { message } => Self::BadRequest(message),
            Error::InvalidPayload { reason } => Self::BadRequest(reason),
            Error::Unauthorized => Self::Unauthorized,
            Error::NotFound { .. } => Self::NotFound("Entry not found".to_string()),
            other => Self::Internal {
                public,
                detail: other.to_string(),
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::from_error(err, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal { public, detail } = &self {
            error!(%detail, "{public}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
