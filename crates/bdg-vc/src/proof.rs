//! # Proof Types
//!
//! A signed credential carries exactly one proof, in one of two encodings:
//!
//! - **`DataIntegrityProof`**: a detached signature over the canonical
//!   credential bytes, multibase-encoded in `proofValue`, tagged with a
//!   cryptosuite.
//! - **`JwtProof2020`**: a JWS compact serialization whose payload is the
//!   canonical credential bytes. The verification method is the JWS `kid`.
//!
//! `Proof` is a tagged variant keyed on the JSON `type` field. Signer and
//! verifier dispatch on [`Proof::kind()`]; neither encoding is preferred.

use bdg_core::{CanonicalBytes, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VcError;

/// Proof type tag for Data Integrity proofs.
pub const DATA_INTEGRITY_PROOF_TYPE: &str = "DataIntegrityProof";

/// Proof type tag for JWT proofs.
pub const JWT_PROOF_TYPE: &str = "JwtProof2020";

/// The proof attached to a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Proof {
    /// Detached signature over canonical bytes.
    #[serde(rename = "DataIntegrityProof")]
    DataIntegrity(DataIntegrityProof),
    /// JWS compact serialization.
    #[serde(rename = "JwtProof2020")]
    Jwt(JwtProof),
}

/// Fields of a `DataIntegrityProof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIntegrityProof {
    /// Cryptosuite tag, e.g. `eddsa-jcs-2022`.
    pub cryptosuite: String,
    /// When the proof was created.
    pub created: Timestamp,
    /// Id of the key that produced the proof.
    pub verification_method: String,
    /// Why the proof was made.
    pub proof_purpose: ProofPurpose,
    /// Signature bytes, multibase base58btc.
    pub proof_value: String,
}

/// Fields of a `JwtProof2020`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtProof {
    /// `header.payload.signature`, each segment unpadded base64url.
    pub jwt: String,
}

/// Which encoding a proof uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofKind {
    /// `DataIntegrityProof`.
    DataIntegrity,
    /// `JwtProof2020`.
    Jwt,
}

/// Proof purpose vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    /// The issuer asserts the credential claims are true.
    #[default]
    AssertionMethod,
    /// Authentication of the holder.
    Authentication,
}

impl DataIntegrityProof {
    /// Canonical proof configuration: the proof object without
    /// `proofValue`. Signed together with the document.
    pub fn config(&self) -> Result<CanonicalBytes, VcError> {
        let mut value = serde_json::to_value(Proof::DataIntegrity(self.clone()))?;
        if let Value::Object(map) = &mut value {
            map.remove("proofValue");
        }
        Ok(CanonicalBytes::from_value(value)?)
    }
}

impl Proof {
    /// Encoding of this proof.
    pub fn kind(&self) -> ProofKind {
        match self {
            Self::DataIntegrity(_) => ProofKind::DataIntegrity,
            Self::Jwt(_) => ProofKind::Jwt,
        }
    }
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataIntegrity => f.write_str(DATA_INTEGRITY_PROOF_TYPE),
            Self::Jwt => f.write_str(JWT_PROOF_TYPE),
        }
    }
}

impl std::fmt::Display for ProofPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssertionMethod => f.write_str("assertionMethod"),
            Self::Authentication => f.write_str("authentication"),
        }
    }
}
