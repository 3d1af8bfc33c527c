//! # Cryptographic Error Types
//!
//! Messages describe what failed, never the key material involved.

use bdg_core::BadgeError;
use thiserror::Error;

/// Errors from cryptographic operations in `bdg-crypto`.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The algorithm name is not one of Ed25519, RS256 or ES256.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material could not be parsed or has the wrong shape.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The primitive refused to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The signature does not verify under the given public key.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Multibase, base64 or hex decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Private-key sealing or unsealing failed.
    #[error("key sealing error: {0}")]
    Sealing(String),
}

impl From<CryptoError> for BadgeError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedAlgorithm(_) => BadgeError::Validation(err.to_string()),
            other => BadgeError::Crypto(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_algorithm_is_validation() {
        let err: BadgeError = CryptoError::UnsupportedAlgorithm("HS256".into()).into();
        assert!(matches!(err, BadgeError::Validation(_)));
        assert!(err.to_string().contains("HS256"));
    }

    #[test]
    fn primitive_failures_are_crypto() {
        let err: BadgeError = CryptoError::InvalidKey("bad length".into()).into();
        assert!(matches!(err, BadgeError::Crypto(_)));
    }
}
