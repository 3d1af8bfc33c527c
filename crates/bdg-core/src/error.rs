//! # Error Types: Service Error Taxonomy
//!
//! `BadgeError` is the error classification shared by every crate in the
//! workspace. Crate-local errors (`CryptoError`, `VcError`, `KeyStoreError`,
//! `StatusError`) and the shared persistence error `StoreError` convert into
//! it, and the HTTP layer maps each variant to a status code.
//!
//! ## Design
//!
//! - `Validation` is the caller's fault and is never retried.
//! - `Crypto` messages never contain key material. Callers log the full
//!   context server-side; the HTTP layer returns a generic message.
//! - `RevocationState` is raised for a corrupted status list. Verification
//!   turns it into an "unknown" result rather than "not revoked".
//! - `Conflict` means optimistic-concurrency retries were exhausted.

use thiserror::Error;

/// Top-level error type for the badge trust core.
#[derive(Error, Debug)]
pub enum BadgeError {
    /// Malformed input or an unsupported algorithm.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown key, issuer, credential or status list.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not permitted, e.g. signing with a revoked key.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A cryptographic primitive failed.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// A persisted status list could not be decoded.
    #[error("revocation state error: {0}")]
    RevocationState(String),

    /// A concurrent writer won every retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error from a persistence backend (in-memory or Postgres).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend failed (connection, query, constraint).
    #[error("backend error: {0}")]
    Backend(String),

    /// A row with the same identity already exists.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for BadgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => BadgeError::Conflict(err.to_string()),
            other => BadgeError::Storage(other.to_string()),
        }
    }
}

impl BadgeError {
    /// Short machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Crypto(_) => "CRYPTO_FAILURE",
            Self::RevocationState(_) => "REVOCATION_STATE_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Canonicalization(_) => "CANONICALIZATION_ERROR",
        }
    }
}
