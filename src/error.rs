//! Marketplace error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2002,
///     "message": "conflict: slot is already taken",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`MarketError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                   |
/// |-----------|------------------|-------------------------------|
/// | 1000–1999 | Request / Policy | 400 Bad Request               |
/// | 2000–2999 | State            | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server           | 500 / 502                     |
/// | 4000–4999 | Identity         | 401 Unauthorized / 403 Forbidden |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No identity could be resolved for the caller.
    #[error("authentication required")]
    Unauthorized,

    /// The caller is known but lacks ownership or entitlement.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced slot, order, provider or service does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional update matched nothing: someone else won the race or
    /// the target already advanced to an incompatible state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Policy violation or malformed request.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Inbound webhook failed authenticity checks.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The external payment gateway rejected or failed a request.
    #[error("payment gateway error: {0}")]
    GatewayError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Generic message shown when a slot was taken by another actor.
    pub const ALREADY_TAKEN: &'static str = "slot is already taken or no longer available";

    /// Shorthand for the race-lost [`MarketError::Conflict`].
    #[must_use]
    pub fn already_taken() -> Self {
        Self::Conflict(Self::ALREADY_TAKEN.to_string())
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::BadRequest(_) => 1001,
            Self::InvalidSignature(_) => 1002,
            Self::NotFound(_) => 2001,
            Self::Conflict(_) => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::GatewayError(_) => 3002,
            Self::Unauthorized => 4001,
            Self::Forbidden(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(MarketError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            MarketError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            MarketError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(MarketError::already_taken().status_code(), StatusCode::CONFLICT);
        assert_eq!(
            MarketError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MarketError::GatewayError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn codes_fall_in_their_ranges() {
        assert!((1000..2000).contains(&MarketError::InvalidSignature("x".into()).error_code()));
        assert!((2000..3000).contains(&MarketError::already_taken().error_code()));
        assert!((3000..4000).contains(&MarketError::PersistenceError("x".into()).error_code()));
        assert!((4000..5000).contains(&MarketError::Unauthorized.error_code()));
    }

    #[test]
    fn conflict_message_is_generic() {
        let msg = MarketError::already_taken().to_string();
        assert!(msg.contains("already taken"));
    }
}
