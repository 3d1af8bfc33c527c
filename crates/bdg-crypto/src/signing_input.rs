//! # Signing Input
//!
//! `SigningInput` is the only byte sequence a key will sign or verify:
//!
//! - [`SigningInput::data_integrity()`]: `SHA-256(proof config) ||
//!   SHA-256(document)`, as in `eddsa-jcs-2022`, so the proof options are
//!   covered along with the document.
//! - [`SigningInput::jws()`]: the JWS signing string
//!   `BASE64URL(header) || "." || BASE64URL(payload)`, where the payload is
//!   the canonical bytes.
//! - [`SigningInput::canonical()`]: the canonical bytes themselves.
//!
//! All take `&CanonicalBytes`, so no path exists from an arbitrary
//! serialization to a signature.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bdg_core::CanonicalBytes;
use sha2::{Digest, Sha256};

/// Bytes handed to a signature primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInput(Vec<u8>);

impl SigningInput {
    /// Sign the canonical bytes directly.
    pub fn canonical(bytes: &CanonicalBytes) -> Self {
        Self(bytes.as_bytes().to_vec())
    }

    /// Data Integrity hash data: the SHA-256 of the canonical proof
    /// configuration followed by the SHA-256 of the canonical document.
    pub fn data_integrity(proof_config: &CanonicalBytes, document: &CanonicalBytes) -> Self {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&Sha256::digest(proof_config.as_bytes()));
        bytes.extend_from_slice(&Sha256::digest(document.as_bytes()));
        Self(bytes)
    }

    /// Build the JWS signing string from an already-encoded protected header
    /// segment and the canonical payload.
    ///
    /// The header segment is taken verbatim so a verifier reproduces exactly
    /// the string the signer signed.
    pub fn jws(header_segment: &str, payload: &CanonicalBytes) -> Self {
        let payload_segment = base64url_encode(payload.as_bytes());
        Self(format!("{header_segment}.{payload_segment}").into_bytes())
    }

    /// Access the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Unpadded base64url, as used by JWS.
pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url.
pub fn base64url_decode(s: &str) -> Result<Vec<u8>, crate::CryptoError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| crate::CryptoError::Encoding(format!("invalid base64url: {e}")))
}
