//! Key store errors.

use bdg_core::{BadgeError, StoreError};
use bdg_crypto::CryptoError;
use thiserror::Error;

/// Errors from [`KeyStore`](crate::KeyStore) operations.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// No key or issuer with that identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The key is revoked and cannot sign.
    #[error("key {0} is revoked and cannot sign")]
    KeyRevoked(String),

    /// A verification method id did not have the `controller#keyId` shape.
    #[error("invalid verification method id: {0}")]
    InvalidVerificationMethod(String),

    /// A primitive failed, or sealed key material could not be opened.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<KeyStoreError> for BadgeError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound(_) => BadgeError::NotFound(err.to_string()),
            KeyStoreError::KeyRevoked(_) => BadgeError::Forbidden(err.to_string()),
            KeyStoreError::InvalidVerificationMethod(_) => BadgeError::Validation(err.to_string()),
            KeyStoreError::Crypto(e) => e.into(),
            KeyStoreError::Store(e) => e.into(),
        }
    }
}
