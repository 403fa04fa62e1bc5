//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CafeError, ErrorKind};
use thiserror::Error;

use crate::envelope::Envelope;

/// Shown instead of datastore failures, which are only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Domain operation failed.
    #[error(transparent)]
    Domain(#[from] CafeError),

    /// Malformed body, path or query.
    #[error("{0}")]
    BadRequest(String),

    /// Identity headers present but unusable.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// No route matches the path.
    #[error("Endpoint not found")]
    RouteNotFound,

    /// The route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => match err.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Domain(err @ CafeError::Persistence(_)) => {
                tracing::error!(error = %err, retryable = err.is_retryable(), "request failed in datastore");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => {
                tracing::debug!(%status, error = %other, "request rejected");
                other.to_string()
            }
        };

        (status, Json(Envelope::failure(message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}
