//! Status list errors.

use bdg_core::{BadgeError, StoreError};
use bdg_keys::KeyStoreError;
use bdg_vc::VcError;
use thiserror::Error;

/// Errors from status list operations.
#[derive(Error, Debug)]
pub enum StatusError {
    /// A persisted list does not decode.
    #[error("status list corrupted: {0}")]
    Corrupted(String),

    /// Compression of a list failed.
    #[error("status list encoding failed: {0}")]
    Encoding(String),

    /// Unknown list or credential.
    #[error("not found: {0}")]
    NotFound(String),

    /// The credential is registered to a different issuer.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent writers kept winning the version check.
    #[error("status list update conflict: {0}")]
    Conflict(String),

    /// Signing the list credential failed.
    #[error(transparent)]
    Keys(#[from] KeyStoreError),

    /// Building or signing the list credential failed.
    #[error(transparent)]
    Vc(#[from] VcError),

    /// The repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StatusError> for BadgeError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Corrupted(_) => BadgeError::RevocationState(err.to_string()),
            StatusError::Encoding(_) => BadgeError::Storage(err.to_string()),
            StatusError::NotFound(_) => BadgeError::NotFound(err.to_string()),
            StatusError::Forbidden(_) => BadgeError::Forbidden(err.to_string()),
            StatusError::Validation(_) => BadgeError::Validation(err.to_string()),
            StatusError::Conflict(_) => BadgeError::Conflict(err.to_string()),
            StatusError::Keys(e) => e.into(),
            StatusError::Vc(e) => e.into(),
            StatusError::Store(e) => e.into(),
        }
    }
}
