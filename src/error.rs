//! API error type and its JSON rendering.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Errors a handler can return.
///
/// Every variant renders as the standard `{success: false, error}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Credentials were presented but could not be checked.
    #[error("{0}")]
    Forbidden(String),

    /// The resource does not exist or belongs to another user.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. `context` is the client-facing message, `source` is logged.
    #[error("{context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Underlying failure text attached to 500 responses.
///
/// The development-only middleware in [`crate::app`] copies it into the
/// envelope's `message` field; otherwise it never leaves the process.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail {
    pub context: String,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Internal { context, source } => {
                log::error!("{}: {:#}", context, source);
                let mut response =
                    (status, Json(ApiResponse::<()>::failure(context.clone()))).into_response();
                response.extensions_mut().insert(InternalErrorDetail {
                    context,
                    detail: source.to_string(),
                });
                response
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => (status, Json(ApiResponse::<()>::failure(msg))).into_response(),
        }
    }
}

/// Attach a client-facing message to any fallible call, turning it into a 500.
pub trait ResultExt<T> {
    fn context_500(self, context: &str) -> Result<T, ApiError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn context_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(context, e))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `axum::Json` whose rejections use the API envelope instead of plain text.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
