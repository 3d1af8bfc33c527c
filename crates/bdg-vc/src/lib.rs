//! # bdg-vc: Verifiable Credentials for the Badge Trust Core
//!
//! - **Credential documents** ([`Credential`]): an open JSON object with
//!   typed accessors for `id`, `issuer`, `proof` and validity dates.
//! - **Proofs** ([`Proof`]): a tagged variant of `DataIntegrityProof` and
//!   `JwtProof2020`.
//! - **Signing** ([`CredentialSigner`]) and **verification**
//!   ([`CredentialVerifier`]), both dispatching on the proof kind.
//! - **Seams**: [`VerificationKeyResolver`] (implemented by the key store)
//!   and [`RevocationCheck`] (implemented by the status list manager).
//!
//! ## Security Invariants
//!
//! - All proof computation uses [`CanonicalBytes`](bdg_core::CanonicalBytes)
//!   of the credential without `proof`, never an ad hoc serialization.
//! - Verification returns a [`VerificationResult`]; it does not error for a
//!   bad credential.

pub mod credential;
pub mod error;
pub mod jws;
pub mod proof;
pub mod signer;
pub mod verifier;

// Re-export primary types.
pub use credential::{Credential, VC_CONTEXT_V1};
pub use error::VcError;
pub use jws::credential_from_jwt;
pub use proof::{DataIntegrityProof, JwtProof, Proof, ProofKind, ProofPurpose};
pub use signer::{CredentialSigner, ProofFormat, SignOptions};
pub use verifier::{
    CredentialVerifier, ResolvedKey, RevocationCheck, StatusFlags, StatusOutcome,
    VerificationKeyResolver, VerificationResult,
};
