//! # Credential Verification
//!
//! [`CredentialVerifier::verify()`] never returns an error for an invalid
//! credential. Every failure becomes `verified = false` with a message in
//! `errors`. The checks short-circuit in this order:
//!
//! 1. a single well-formed proof is present;
//! 2. the key named by the proof's verification method resolves;
//! 3. the key's algorithm matches the proof, and the credential issuer
//!    controls the key;
//! 4. the signature verifies over the recomputed canonical bytes;
//! 5. the validity window contains `now`;
//! 6. the credential is neither revoked nor suspended.
//!
//! ## Security Invariant
//!
//! Keys are resolved by the verification method written in the proof, never
//! by "the issuer's current key", so credentials signed before a rotation
//! keep verifying. A status lookup that fails reports status `unknown` and
//! `verified = false`; it never reads as "not revoked".

use std::sync::Arc;

use async_trait::async_trait;
use bdg_core::{BadgeError, CanonicalBytes, CredentialId, IssuerId, Timestamp};
use bdg_crypto::{CryptoProvider, KeyAlgorithm, PublicKey, Signature, SigningInput};
use serde::Serialize;

use crate::credential::Credential;
use crate::jws::CompactJws;
use crate::proof::{Proof, ProofKind, ProofPurpose};

/// A public key looked up by verification method id.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// The verification key.
    pub public_key: PublicKey,
    /// Issuer owning the key.
    pub issuer_id: IssuerId,
    /// Controller DID of the key.
    pub controller: String,
    /// Whether the key has been retired. Retired keys still verify.
    pub revoked: bool,
}

/// Looks up public keys by verification method id.
#[async_trait]
pub trait VerificationKeyResolver: Send + Sync {
    /// Resolve `verification_method`. `Ok(None)` means no such key.
    async fn resolve_verification_key(
        &self,
        verification_method: &str,
    ) -> Result<Option<ResolvedKey>, BadgeError>;
}

/// Current out-of-band status of a credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    /// Set on the issuer's revocation list.
    pub revoked: bool,
    /// Set on the issuer's suspension list.
    pub suspended: bool,
}

/// Reads the current status of a credential.
#[async_trait]
pub trait RevocationCheck: Send + Sync {
    /// Status of `credential_id`. An error means the status is unknown.
    async fn status_flags(&self, credential_id: &CredentialId) -> Result<StatusFlags, BadgeError>;
}

/// Outcome of the status step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusOutcome {
    /// No status check ran (no checker, no credential id, or an earlier
    /// step failed).
    NotChecked,
    /// Neither revoked nor suspended.
    Active,
    /// Revoked.
    Revoked,
    /// Suspended.
    Suspended,
    /// The status list could not be read.
    Unknown,
}

/// Structured verification result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Signature valid, within validity window, and not revoked/suspended.
    pub verified: bool,
    /// Reasons for failure; empty when verified.
    pub errors: Vec<String>,
    /// Encoding of the proof that was checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<ProofKind>,
    /// Verification method named by the proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    /// Status step outcome.
    pub status: StatusOutcome,
}

impl VerificationResult {
    fn failed(mut self, error: impl Into<String>) -> Self {
        self.verified = false;
        self.errors.push(error.into());
        self
    }
}

/// Verifies credential proofs and status.
#[derive(Clone)]
pub struct CredentialVerifier {
    resolver: Arc<dyn VerificationKeyResolver>,
    status: Option<Arc<dyn RevocationCheck>>,
    provider: Arc<dyn CryptoProvider>,
}

impl CredentialVerifier {
    /// Verifier that checks signatures only.
    pub fn new(resolver: Arc<dyn VerificationKeyResolver>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            resolver,
            status: None,
            provider,
        }
    }

    /// Also consult `status` after the signature verifies.
    pub fn with_status_check(mut self, status: Arc<dyn RevocationCheck>) -> Self {
        self.status = Some(status);
        self
    }

    /// Verify against the current time, accepting either proof encoding.
    pub async fn verify(&self, credential: &Credential) -> VerificationResult {
        self.verify_at(credential, None, Timestamp::now()).await
    }

    /// Verify, requiring a specific proof encoding.
    pub async fn verify_expecting(&self, credential: &Credential, kind: ProofKind) -> VerificationResult {
        self.verify_at(credential, Some(kind), Timestamp::now()).await
    }

    /// Verify as of `now`.
    #[tracing::instrument(level = "debug", skip_all, fields(credential_id = tracing::field::Empty))]
    pub async fn verify_at(
        &self,
        credential: &Credential,
        expected: Option<ProofKind>,
        now: Timestamp,
    ) -> VerificationResult {
        let credential_id = credential.id();
        if let Some(id) = &credential_id {
            tracing::Span::current().record("credential_id", id.as_str());
        }

        let mut result = VerificationResult {
            verified: false,
            errors: Vec::new(),
            proof_type: None,
            verification_method: None,
            status: StatusOutcome::NotChecked,
        };

        // (a) proof present
        let proof = match credential.proof() {
            Ok(Some(proof)) => proof,
            Ok(None) => return result.failed("credential has no proof"),
            Err(e) => return result.failed(e.to_string()),
        };
        result.proof_type = Some(proof.kind());
        if let Some(kind) = expected {
            if kind != proof.kind() {
                return result.failed(format!("expected {kind} proof, found {}", proof.kind()));
            }
        }

        let parsed = match ParsedProof::from_proof(&proof) {
            Ok(p) => p,
            Err(e) => return result.failed(e),
        };
        result.verification_method = Some(parsed.verification_method().to_string());

        // (b) resolve the key named by the proof
        let resolved = match self
            .resolver
            .resolve_verification_key(parsed.verification_method())
            .await
        {
            Ok(Some(key)) => key,
            Ok(None) => {
                return result.failed(format!(
                    "verification method not found: {}",
                    parsed.verification_method()
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "verification key lookup failed");
                return result.failed(format!("verification key lookup failed: {e}"));
            }
        };

        if resolved.public_key.algorithm() != parsed.algorithm {
            return result.failed(format!(
                "proof algorithm {} does not match key algorithm {}",
                parsed.algorithm,
                resolved.public_key.algorithm()
            ));
        }
        if let Some(issuer) = credential.issuer() {
            if issuer != resolved.issuer_id && issuer.as_str() != resolved.controller {
                return result.failed(format!(
                    "issuer {issuer} does not control verification method {}",
                    parsed.verification_method()
                ));
            }
        }

        // (c) recompute canonical bytes, (d) verify signature
        let canonical = match credential.signing_input() {
            Ok(c) => c,
            Err(e) => return result.failed(e.to_string()),
        };
        let signature_check = match &parsed.body {
            ParsedBody::DataIntegrity {
                config, signature, ..
            } => self.provider.verify(
                &resolved.public_key,
                &SigningInput::data_integrity(config, &canonical),
                signature,
            ),
            ParsedBody::Jwt(jws) => {
                if !jws.payload_matches(&canonical) {
                    return result.failed("credential does not match the JWT payload");
                }
                self.provider
                    .verify(&resolved.public_key, &jws.signing_input(&canonical), &jws.signature)
            }
        };
        if let Err(e) = signature_check {
            tracing::debug!(error = %e, "signature rejected");
            return result.failed("signature verification failed");
        }

        // validity window
        match credential.expires_at() {
            Ok(Some(exp)) if exp < now => return result.failed(format!("credential expired at {exp}")),
            Ok(_) => {}
            Err(e) => return result.failed(e.to_string()),
        }
        match credential.valid_from() {
            Ok(Some(from)) if from > now => {
                return result.failed(format!("credential not valid before {from}"))
            }
            Ok(_) => {}
            Err(e) => return result.failed(e.to_string()),
        }

        // (e) status
        if let (Some(status), Some(id)) = (&self.status, &credential_id) {
            match status.status_flags(id).await {
                Ok(flags) if flags.revoked => {
                    result.status = StatusOutcome::Revoked;
                    return result.failed("credential has been revoked");
                }
                Ok(flags) if flags.suspended => {
                    result.status = StatusOutcome::Suspended;
                    return result.failed("credential is suspended");
                }
                Ok(_) => result.status = StatusOutcome::Active,
                Err(e) => {
                    tracing::warn!(error = %e, "status lookup failed; reporting unknown");
                    result.status = StatusOutcome::Unknown;
                    return result.failed(format!("revocation status unknown: {e}"));
                }
            }
        }

        result.verified = true;
        result
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("status_check", &self.status.is_some())
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

// ─── Proof parsing ──────────────────────────────────────────────────────

struct ParsedProof<'a> {
    algorithm: KeyAlgorithm,
    body: ParsedBody<'a>,
}

enum ParsedBody<'a> {
    DataIntegrity {
        verification_method: &'a str,
        config: CanonicalBytes,
        signature: Signature,
    },
    Jwt(CompactJws<'a>),
}

impl<'a> ParsedProof<'a> {
    fn from_proof(proof: &'a Proof) -> Result<Self, String> {
        match proof {
            Proof::DataIntegrity(p) => {
                if p.proof_purpose != ProofPurpose::AssertionMethod {
                    return Err(format!(
                        "proof purpose {} is not assertionMethod",
                        p.proof_purpose
                    ));
                }
                let algorithm = KeyAlgorithm::from_cryptosuite(&p.cryptosuite)
                    .map_err(|e| e.to_string())?;
                let (_, bytes) = multibase::decode(&p.proof_value)
                    .map_err(|e| format!("invalid proofValue: {e}"))?;
                let config = p.config().map_err(|e| e.to_string())?;
                Ok(Self {
                    algorithm,
                    body: ParsedBody::DataIntegrity {
                        verification_method: &p.verification_method,
                        config,
                        signature: Signature::from_bytes(bytes),
                    },
                })
            }
            Proof::Jwt(p) => {
                let jws = CompactJws::parse(&p.jwt).map_err(|e| e.to_string())?;
                let algorithm = jws.header.algorithm().map_err(|e| e.to_string())?;
                Ok(Self {
                    algorithm,
                    body: ParsedBody::Jwt(jws),
                })
            }
        }
    }

    fn verification_method(&self) -> &str {
        match &self.body {
            ParsedBody::DataIntegrity {
                verification_method,
                ..
            } => *verification_method,
            ParsedBody::Jwt(jws) => jws.header.kid.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{CredentialSigner, ProofFormat, SignOptions};
    use bdg_crypto::{KeyPair, SeededCryptoProvider};
    use serde_json::json;
    use std::collections::HashMap;

    struct MapResolver(HashMap<String, ResolvedKey>);

    #[async_trait]
    impl VerificationKeyResolver for MapResolver {
        async fn resolve_verification_key(&self, vm: &str) -> Result<Option<ResolvedKey>, BadgeError> {
            Ok(self.0.get(vm).cloned())
        }
    }

    struct FixedStatus(Result<StatusFlags, ()>);

    #[async_trait]
    impl RevocationCheck for FixedStatus {
        async fn status_flags(&self, _: &CredentialId) -> Result<StatusFlags, BadgeError> {
            self.0
                .map_err(|_| BadgeError::RevocationState("corrupted list".into()))
        }
    }

    struct Fixture {
        provider: Arc<SeededCryptoProvider>,
        signer: CredentialSigner,
    }

    impl Fixture {
        fn new() -> Self {
            let provider = Arc::new(SeededCryptoProvider::new(5));
            Self {
                signer: CredentialSigner::new(provider.clone()),
                provider,
            }
        }

        fn key(&self, alg: KeyAlgorithm) -> KeyPair {
            self.provider.generate_keypair(alg).unwrap()
        }

        fn verifier(&self, keys: &[(&str, &KeyPair)]) -> CredentialVerifier {
            let map = keys
                .iter()
                .map(|(vm, kp)| {
                    (
                        vm.to_string(),
                        ResolvedKey {
                            public_key: kp.public_key(),
                            issuer_id: IssuerId::new("I").unwrap(),
                            controller: "did:web:localhost:issuers:I".into(),
                            revoked: false,
                        },
                    )
                })
                .collect();
            CredentialVerifier::new(Arc::new(MapResolver(map)), self.provider.clone())
        }
    }

    fn doc() -> Credential {
        Credential::from_value(json!({
            "id": "urn:uuid:abc",
            "issuer": "I",
            "credentialSubject": {"achievement": {"name": "X"}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn sign_then_verify_both_formats() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let verifier = fx.verifier(&[("vm1", &key)]);
        for format in [ProofFormat::DataIntegrity, ProofFormat::Jwt] {
            let signed = fx.signer.sign(&doc(), &key, &SignOptions::new("vm1", format)).unwrap();
            let result = verifier.verify(&signed).await;
            assert!(result.verified, "{format:?}: {:?}", result.errors);
            assert_eq!(result.verification_method.as_deref(), Some("vm1"));
            assert_eq!(result.status, StatusOutcome::NotChecked);
        }
    }

    #[tokio::test]
    async fn missing_proof_fails() {
        let fx = Fixture::new();
        let result = fx.verifier(&[]).verify(&doc()).await;
        assert!(!result.verified);
        assert_eq!(result.errors, vec!["credential has no proof".to_string()]);
    }

    #[tokio::test]
    async fn unknown_verification_method_fails() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx
            .signer
            .sign(&doc(), &key, &SignOptions::new("vm-missing", ProofFormat::DataIntegrity))
            .unwrap();
        let result = fx.verifier(&[("vm1", &key)]).verify(&signed).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn tampered_leaf_fails_for_jwt() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Es256);
        let mut signed = fx.signer.sign(&doc(), &key, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();
        *signed.pointer_mut("/credentialSubject/achievement/name").unwrap() = json!("Y");
        let result = fx.verifier(&[("vm1", &key)]).verify(&signed).await;
        assert!(!result.verified);
    }

    #[tokio::test]
    async fn wrong_key_same_algorithm_fails() {
        let fx = Fixture::new();
        let a = fx.key(KeyAlgorithm::Ed25519);
        let b = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx
            .signer
            .sign(&doc(), &a, &SignOptions::new("vm1", ProofFormat::DataIntegrity))
            .unwrap();
        let result = fx.verifier(&[("vm1", &b)]).verify(&signed).await;
        assert!(!result.verified);
        assert_eq!(result.errors, vec!["signature verification failed".to_string()]);
    }

    #[tokio::test]
    async fn proof_options_are_signed() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let verifier = fx.verifier(&[("vm1", &key)]);
        let signed = fx
            .signer
            .sign(&doc(), &key, &SignOptions::new("vm1", ProofFormat::DataIntegrity))
            .unwrap();
        assert!(verifier.verify(&signed).await.verified);

        let mut backdated = signed.clone();
        *backdated.pointer_mut("/proof/created").unwrap() = json!("2001-01-01T00:00:00Z");
        let result = verifier.verify(&backdated).await;
        assert!(!result.verified);
        assert_eq!(result.errors, vec!["signature verification failed".to_string()]);
    }

    #[tokio::test]
    async fn non_assertion_purpose_fails() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let options = SignOptions {
            proof_purpose: ProofPurpose::Authentication,
            ..SignOptions::new("vm1", ProofFormat::DataIntegrity)
        };
        let signed = fx.signer.sign(&doc(), &key, &options).unwrap();
        let result = fx.verifier(&[("vm1", &key)]).verify(&signed).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("not assertionMethod"));

        // Relabelling the purpose breaks the signature instead.
        let mut relabelled = signed.clone();
        *relabelled.pointer_mut("/proof/proofPurpose").unwrap() = json!("assertionMethod");
        let result = fx.verifier(&[("vm1", &key)]).verify(&relabelled).await;
        assert_eq!(result.errors, vec!["signature verification failed".to_string()]);
    }

    #[tokio::test]
    async fn algorithm_mismatch_fails() {
        let fx = Fixture::new();
        let ed = fx.key(KeyAlgorithm::Ed25519);
        let es = fx.key(KeyAlgorithm::Es256);
        let signed = fx.signer.sign(&doc(), &ed, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();
        let result = fx.verifier(&[("vm1", &es)]).verify(&signed).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("does not match key algorithm"));
    }

    #[tokio::test]
    async fn foreign_issuer_fails() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let mut d = doc();
        d.insert("issuer", json!("someone-else"));
        let signed = fx.signer.sign(&d, &key, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();
        let result = fx.verifier(&[("vm1", &key)]).verify(&signed).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("does not control"));
    }

    #[tokio::test]
    async fn expected_kind_enforced() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx.signer.sign(&doc(), &key, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();
        let verifier = fx.verifier(&[("vm1", &key)]);
        assert!(verifier.verify_expecting(&signed, ProofKind::Jwt).await.verified);
        assert!(!verifier.verify_expecting(&signed, ProofKind::DataIntegrity).await.verified);
    }

    #[tokio::test]
    async fn expired_and_not_yet_valid_fail() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let verifier = fx.verifier(&[("vm1", &key)]);
        let now = Timestamp::parse("2026-06-01T00:00:00Z").unwrap();

        let mut d = doc();
        d.insert("expirationDate", json!("2026-01-01T00:00:00Z"));
        let signed = fx.signer.sign(&d, &key, &SignOptions::new("vm1", ProofFormat::DataIntegrity)).unwrap();
        let result = verifier.verify_at(&signed, None, now).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("expired"));

        let mut d = doc();
        d.insert("validFrom", json!("2027-01-01T00:00:00Z"));
        let signed = fx.signer.sign(&d, &key, &SignOptions::new("vm1", ProofFormat::DataIntegrity)).unwrap();
        let result = verifier.verify_at(&signed, None, now).await;
        assert!(!result.verified);
        assert!(result.errors[0].contains("not valid before"));
    }

    #[tokio::test]
    async fn revoked_and_suspended_fail() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx.signer.sign(&doc(), &key, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();

        let revoked = fx
            .verifier(&[("vm1", &key)])
            .with_status_check(Arc::new(FixedStatus(Ok(StatusFlags { revoked: true, suspended: false }))));
        let result = revoked.verify(&signed).await;
        assert!(!result.verified);
        assert_eq!(result.status, StatusOutcome::Revoked);

        let suspended = fx
            .verifier(&[("vm1", &key)])
            .with_status_check(Arc::new(FixedStatus(Ok(StatusFlags { revoked: false, suspended: true }))));
        assert_eq!(suspended.verify(&signed).await.status, StatusOutcome::Suspended);

        let active = fx
            .verifier(&[("vm1", &key)])
            .with_status_check(Arc::new(FixedStatus(Ok(StatusFlags::default()))));
        let result = active.verify(&signed).await;
        assert!(result.verified);
        assert_eq!(result.status, StatusOutcome::Active);
    }

    #[tokio::test]
    async fn status_error_degrades_to_unknown() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx.signer.sign(&doc(), &key, &SignOptions::new("vm1", ProofFormat::Jwt)).unwrap();
        let verifier = fx
            .verifier(&[("vm1", &key)])
            .with_status_check(Arc::new(FixedStatus(Err(()))));
        let result = verifier.verify(&signed).await;
        assert!(!result.verified);
        assert_eq!(result.status, StatusOutcome::Unknown);
        assert!(result.errors[0].contains("unknown"));
    }

    #[tokio::test]
    async fn result_serializes_camel_case() {
        let fx = Fixture::new();
        let key = fx.key(KeyAlgorithm::Ed25519);
        let signed = fx
            .signer
            .sign(
                &doc(),
                &key,
                &SignOptions {
                    verification_method: "vm1".into(),
                    proof_purpose: ProofPurpose::AssertionMethod,
                    format: ProofFormat::DataIntegrity,
                    created: None,
                },
            )
            .unwrap();
        let result = fx.verifier(&[("vm1", &key)]).verify(&signed).await;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["verified"], true);
        assert_eq!(json["proofType"], "data-integrity");
        assert_eq!(json["verificationMethod"], "vm1");
        assert_eq!(json["status"], "notChecked");
    }
}
