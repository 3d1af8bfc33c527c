//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps the service taxonomy ([`BadgeError`]) and the crate-local errors of
//! the key store, the status lists and the credential layer to HTTP status
//! codes and a JSON body `{"error": {"code", "message"}}`.
//!
//! Internal and crypto failures are logged server-side with their full
//! message and returned to the client as a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bdg_core::BadgeError;
use bdg_keys::KeyStoreError;
use bdg_status::StatusError;
use bdg_vc::VcError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown key, issuer, credential or list (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input or unsupported algorithm (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to act for this issuer or key (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Concurrent writers exhausted the retry budget (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A persisted status list could not be decoded (500).
    #[error("revocation state error: {0}")]
    RevocationState(String),

    /// A cryptographic primitive failed (500). Message is logged only.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::RevocationState(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "REVOCATION_STATE_ERROR")
            }
            Self::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CRYPTO_FAILURE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Crypto(_) => "A cryptographic operation failed".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Crypto(_) => tracing::error!(error = %self, "crypto failure"),
            Self::RevocationState(_) => tracing::error!(error = %self, "status list unreadable"),
            Self::Conflict(_) => tracing::warn!(error = %self, "write conflict"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BadgeError> for AppError {
    fn from(err: BadgeError) -> Self {
        let message = err.to_string();
        match err {
            BadgeError::Validation(_) | BadgeError::Canonicalization(_) => Self::Validation(message),
            BadgeError::NotFound(_) => Self::NotFound(message),
            BadgeError::Forbidden(_) => Self::Forbidden(message),
            BadgeError::Crypto(_) => Self::Crypto(message),
            BadgeError::RevocationState(_) => Self::RevocationState(message),
            BadgeError::Conflict(_) => Self::Conflict(message),
            BadgeError::Storage(_) => Self::Internal(message),
        }
    }
}

impl From<KeyStoreError> for AppError {
    fn from(err: KeyStoreError) -> Self {
        BadgeError::from(err).into()
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        BadgeError::from(err).into()
    }
}

impl From<VcError> for AppError {
    fn from(err: VcError) -> Self {
        BadgeError::from(err).into()
    }
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdg_core::StoreError;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (AppError::from(BadgeError::NotFound("k".into())), StatusCode::NOT_FOUND),
            (
                AppError::from(BadgeError::Validation("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::from(BadgeError::Forbidden("x".into())), StatusCode::FORBIDDEN),
            (AppError::from(BadgeError::Conflict("x".into())), StatusCode::CONFLICT),
            (
                AppError::from(BadgeError::RevocationState("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(BadgeError::Storage("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{err}");
        }
    }

    #[test]
    fn revoked_key_is_forbidden() {
        let err: AppError = KeyStoreError::KeyRevoked("k1".into()).into();
        assert_eq!(err.status_and_code(), (StatusCode::FORBIDDEN, "FORBIDDEN"));
    }

    #[test]
    fn duplicate_store_row_is_conflict() {
        let err: AppError = KeyStoreError::Store(StoreError::Duplicate("k1".into())).into();
        assert_eq!(err.status_and_code().1, "CONFLICT");
    }

    #[test]
    fn corrupted_list_is_revocation_state_error() {
        let err: AppError = StatusError::Corrupted("bad gzip".into()).into();
        assert_eq!(err.status_and_code().1, "REVOCATION_STATE_ERROR");
    }

    #[tokio::test]
    async fn crypto_details_are_not_returned() {
        let (status, body) = body_json(AppError::Crypto("sealed key for k1 did not open".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CRYPTO_FAILURE");
        assert!(!body["error"]["message"].as_str().unwrap().contains("k1"));
    }

    #[tokio::test]
    async fn internal_details_are_not_returned() {
        let (_, body) = body_json(AppError::Internal("pool timed out on 10.0.0.3".into())).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = body_json(AppError::NotFound("issuer acme".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "not found: issuer acme");
    }
}
