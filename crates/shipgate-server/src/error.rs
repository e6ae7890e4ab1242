//! HTTP error types for the Shipgate server.
//!
//! Maps domain errors from `shipgate-core` into HTTP responses. Every
//! error variant produces a JSON body with a machine-readable `error`
//! field and a human-readable `message`. Crypto failures on the read
//! path are deliberately collapsed into a generic internal error so the
//! response never hints at key or ciphertext state.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use shipgate_core::error::{AccessError, AuditError, CryptoError, DirectoryError};
use shipgate_core::session::SessionError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// No valid session.
    Unauthorized(String),
    /// The caller's role does not permit the operation.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// The resource existed but is no longer usable (expired invite).
    Gone(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// A conflicting state (e.g. already a member).
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Gone(msg) => (StatusCode::GONE, "gone", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound => Self::NotFound("project not found".to_owned()),
            AccessError::Forbidden(msg) => Self::Forbidden(msg),
            AccessError::Internal(inner) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { .. } => Self::NotFound(err.to_string()),
            DirectoryError::Store(_)
            | DirectoryError::CorruptDocument { .. }
            | DirectoryError::Encode { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        // Never leak which stage failed to the client.
        match err {
            CryptoError::KeyDerivation { .. }
            | CryptoError::Encryption { .. }
            | CryptoError::MalformedEnvelope { .. }
            | CryptoError::Decryption => Self::Internal("cryptographic operation failed".to_owned()),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Internal(err.to_string())
    }
}
