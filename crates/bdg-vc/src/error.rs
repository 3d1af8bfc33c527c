//! Errors from credential parsing and signing.
//!
//! Verification does not return these for an invalid credential; it folds
//! them into a [`VerificationResult`](crate::VerificationResult).

use bdg_core::{BadgeError, CanonicalizationError};
use bdg_crypto::CryptoError;
use thiserror::Error;

/// Errors from VC signing and document handling.
#[derive(Error, Debug)]
pub enum VcError {
    /// Canonicalization of the credential body failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is not a credential this service can handle.
    #[error("invalid credential document: {0}")]
    InvalidDocument(String),

    /// The proof object is malformed.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The key's algorithm cannot produce the requested proof encoding.
    #[error("unsupported algorithm for this proof format: {0}")]
    UnsupportedAlgorithm(String),

    /// Signing options are missing or inconsistent.
    #[error("invalid signing options: {0}")]
    InvalidOptions(String),

    /// A JWS compact serialization could not be parsed.
    #[error("malformed JWS: {0}")]
    MalformedJws(String),

    /// A primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<VcError> for BadgeError {
    fn from(err: VcError) -> Self {
        match err {
            VcError::Canonicalization(e) => BadgeError::Canonicalization(e),
            VcError::Crypto(e) => e.into(),
            other => BadgeError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_errors_are_validation() {
        let err: BadgeError = VcError::InvalidDocument("not an object".into()).into();
        assert!(matches!(err, BadgeError::Validation(_)));
    }

    #[test]
    fn crypto_errors_keep_their_class() {
        let err: BadgeError = VcError::Crypto(CryptoError::Signing("x".into())).into();
        assert!(matches!(err, BadgeError::Crypto(_)));
    }
}
