//! API error types.
//!
//! Every HTTP failure is surfaced to the caller as a structured
//! `{ok: false, error}` body with a status from the fixed taxonomy.
//! Realtime-path failures are silent no-ops and never reach this type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use coterie_store::StoreError;

/// API error taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required request field is absent or blank.
    #[error("missing fields")]
    MissingFields,

    /// The invite code does not match the configured value.
    #[error("invalid invite code")]
    InvalidInviteCode,

    /// The admin code does not match the configured value.
    #[error("invalid admin code")]
    InvalidAdminCode,

    /// Missing or invalid session token.
    #[error("unauthorized")]
    Unauthorized,

    /// A non-admin session attempted an admin action.
    #[error("forbidden")]
    Forbidden,

    /// Invalid input, including duplicate room slugs.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFields | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidInviteCode | Self::InvalidAdminCode | Self::Forbidden => {
                StatusCode::FORBIDDEN
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = %detail, "Internal error");
        }

        let body = Json(json!({
            "ok": false,
            "error": self.to_string(),
        }));

        (self.status_code(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::BadRequest("slug already exists".to_string()),
            StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
