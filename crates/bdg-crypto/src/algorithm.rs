//! # Algorithm Names
//!
//! `KeyAlgorithm` is the internal algorithm enum. It maps explicitly to two
//! external vocabularies that do not agree with each other:
//!
//! | Variant   | Primitive                    | JWT `alg` | Data Integrity cryptosuite |
//! |-----------|------------------------------|-----------|----------------------------|
//! | `Ed25519` | `Ed25519` (SHA-512 inside)   | `EdDSA`   | `eddsa-jcs-2022`           |
//! | `Rs256`   | `RSASSA-PKCS1-v1_5-SHA256`   | `RS256`   | none                       |
//! | `Es256`   | `ECDSA-P256-SHA256`          | `ES256`   | `ecdsa-jcs-2019`           |
//!
//! No name is ever derived from another by string manipulation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Signature algorithm of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// Ed25519 (EdDSA over Curve25519).
    #[serde(rename = "Ed25519")]
    Ed25519,
    /// RSA 2048 with PKCS#1 v1.5 padding over SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
}

impl KeyAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [KeyAlgorithm; 3] = [Self::Ed25519, Self::Rs256, Self::Es256];

    /// Stable name used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
        }
    }

    /// Name of the concrete signature primitive.
    pub fn primitive_name(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::Rs256 => "RSASSA-PKCS1-v1_5-SHA256",
            Self::Es256 => "ECDSA-P256-SHA256",
        }
    }

    /// Value of the JWS `alg` header.
    pub fn jwt_alg(&self) -> &'static str {
        match self {
            Self::Ed25519 => "EdDSA",
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
        }
    }

    /// Map a JWS `alg` header back to the internal enum.
    pub fn from_jwt_alg(alg: &str) -> Result<Self, CryptoError> {
        match alg {
            "EdDSA" => Ok(Self::Ed25519),
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            other => Err(CryptoError::UnsupportedAlgorithm(format!("JWT alg {other:?}"))),
        }
    }

    /// Data Integrity cryptosuite tag, if one is defined for this algorithm.
    pub fn cryptosuite(&self) -> Option<&'static str> {
        match self {
            Self::Ed25519 => Some("eddsa-jcs-2022"),
            Self::Es256 => Some("ecdsa-jcs-2019"),
            Self::Rs256 => None,
        }
    }

    /// Map a cryptosuite tag back to the internal enum.
    pub fn from_cryptosuite(suite: &str) -> Result<Self, CryptoError> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.cryptosuite() == Some(suite))
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(format!("cryptosuite {suite:?}")))
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CryptoError;

    /// Accepts the storage name case-insensitively, plus the JWT `alg` alias
    /// `EdDSA`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" | "eddsa" => Ok(Self::Ed25519),
            "rs256" => Ok(Self::Rs256),
            "es256" => Ok(Self::Es256),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}
