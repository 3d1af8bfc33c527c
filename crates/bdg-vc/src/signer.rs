//! # Credential Signing
//!
//! [`CredentialSigner::sign()`] turns an unsigned document and an unlocked
//! key into a signed credential:
//!
//! 1. drop any existing `proof`;
//! 2. canonicalize the remainder ([`Credential::signing_input()`]);
//! 3. sign with the key's primitive through the injected provider. A Data
//!    Integrity signature also covers the proof options (everything in the
//!    proof but `proofValue`);
//! 4. attach a `DataIntegrityProof` or a `JwtProof2020`, as the caller asked;
//! 5. return the original fields untouched plus the new proof.
//!
//! The encoding is chosen by the caller and never negotiated.

use std::sync::Arc;

use bdg_core::Timestamp;
use bdg_crypto::{CryptoProvider, KeyAlgorithm, KeyPair, SigningInput};
use multibase::Base;
use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::VcError;
use crate::jws::{self, JwsHeader};
use crate::proof::{DataIntegrityProof, JwtProof, Proof, ProofPurpose};

/// Proof encoding requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofFormat {
    /// `DataIntegrityProof` with a cryptosuite tag.
    DataIntegrity,
    /// `JwtProof2020` (JWS compact serialization).
    Jwt,
}

/// Caller-supplied proof parameters.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Id of the signing key, `controller#keyId`.
    pub verification_method: String,
    /// Proof purpose; `assertionMethod` for issuance.
    pub proof_purpose: ProofPurpose,
    /// Encoding of the proof.
    pub format: ProofFormat,
    /// Proof creation time. Defaults to now.
    pub created: Option<Timestamp>,
}

impl SignOptions {
    /// Options for an `assertionMethod` proof.
    pub fn new(verification_method: impl Into<String>, format: ProofFormat) -> Self {
        Self {
            verification_method: verification_method.into(),
            proof_purpose: ProofPurpose::AssertionMethod,
            format,
            created: None,
        }
    }

    /// Override the creation time.
    pub fn created_at(mut self, created: Timestamp) -> Self {
        self.created = Some(created);
        self
    }
}

/// Attaches proofs to credentials.
#[derive(Clone)]
pub struct CredentialSigner {
    provider: Arc<dyn CryptoProvider>,
}

impl CredentialSigner {
    /// Create a signer using `provider` for the signature primitive.
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Whether `algorithm` can produce a `format` proof. Checked by
    /// [`sign()`](Self::sign) as well; callers with side effects to run
    /// before signing check first.
    pub fn ensure_supported(algorithm: KeyAlgorithm, format: ProofFormat) -> Result<(), VcError> {
        match format {
            ProofFormat::DataIntegrity if algorithm.cryptosuite().is_none() => {
                Err(VcError::UnsupportedAlgorithm(format!(
                    "{algorithm} has no Data Integrity cryptosuite; use a JWT proof"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Sign `document` with `key`.
    ///
    /// # Errors
    ///
    /// - `VcError::InvalidOptions` for an empty verification method.
    /// - `VcError::UnsupportedAlgorithm` when a Data Integrity proof is
    ///   requested for an algorithm without a cryptosuite (RS256).
    /// - `VcError::Canonicalization` / `VcError::Crypto` for primitive
    ///   failures.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(format = ?options.format, alg = %key.algorithm())
    )]
    pub fn sign(
        &self,
        document: &Credential,
        key: &KeyPair,
        options: &SignOptions,
    ) -> Result<Credential, VcError> {
        if options.verification_method.trim().is_empty() {
            return Err(VcError::InvalidOptions(
                "verification method must not be empty".into(),
            ));
        }

        Self::ensure_supported(key.algorithm(), options.format)?;

        let unsigned = document.without_proof();
        let canonical = unsigned.signing_input()?;

        let proof = match options.format {
            ProofFormat::DataIntegrity => {
                let algorithm = key.algorithm();
                let cryptosuite = algorithm.cryptosuite().ok_or_else(|| {
                    VcError::UnsupportedAlgorithm(format!("{algorithm} has no cryptosuite"))
                })?;
                let mut proof = DataIntegrityProof {
                    cryptosuite: cryptosuite.to_string(),
                    created: options.created.unwrap_or_else(Timestamp::now),
                    verification_method: options.verification_method.clone(),
                    proof_purpose: options.proof_purpose,
                    proof_value: String::new(),
                };
                let signature = self.provider.sign(
                    key,
                    &SigningInput::data_integrity(&proof.config()?, &canonical),
                )?;
                proof.proof_value = multibase::encode(Base::Base58Btc, signature.as_bytes());
                Proof::DataIntegrity(proof)
            }
            ProofFormat::Jwt => {
                let header = JwsHeader::new(key.algorithm(), options.verification_method.clone());
                let header_segment = header.encode()?;
                let signature = self
                    .provider
                    .sign(key, &SigningInput::jws(&header_segment, &canonical))?;
                Proof::Jwt(JwtProof {
                    jwt: jws::assemble(&header_segment, &canonical, &signature),
                })
            }
        };

        unsigned.with_proof(&proof)
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialSigner(provider={})", self.provider.provider_name())
    }
}
