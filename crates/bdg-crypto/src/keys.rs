//! # Key Pairs, Public Keys and Signatures
//!
//! One enum per role, one variant per [`KeyAlgorithm`]. The signer and the
//! verifier dispatch on the variant; there is no trait object per algorithm.
//!
//! ## Key material encodings
//!
//! | Algorithm | Public bytes                 | Secret bytes            |
//! |-----------|------------------------------|-------------------------|
//! | Ed25519   | 32-byte point                | 32-byte seed            |
//! | RS256     | PKCS#1 DER `RSAPublicKey`    | PKCS#8 DER              |
//! | ES256     | SEC1 compressed point (33 B) | 32-byte scalar          |
//!
//! ## Security Invariant
//!
//! `KeyPair` does not implement `Serialize` and its `Debug` output is
//! redacted. Secret bytes leave this module only inside `Zeroizing`, and
//! only to be sealed.

use p256::ecdsa as p256_ecdsa;
use rand_core::{CryptoRng, RngCore};
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::algorithm::KeyAlgorithm;
use crate::error::CryptoError;
use crate::multikey;
use crate::signing_input::SigningInput;

/// RSA modulus size for newly generated RS256 keys.
pub const RSA_KEY_BITS: usize = 2048;

/// A private signing key of one of the supported algorithms.
pub enum KeyPair {
    /// Ed25519 signing key.
    Ed25519(ed25519_dalek::SigningKey),
    /// RSA private key.
    Rs256(Box<RsaPrivateKey>),
    /// P-256 ECDSA signing key.
    Es256(p256_ecdsa::SigningKey),
}

/// A public verification key of one of the supported algorithms.
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKey {
    /// Ed25519 verifying key.
    Ed25519(ed25519_dalek::VerifyingKey),
    /// RSA public key.
    Rs256(Box<RsaPublicKey>),
    /// P-256 ECDSA verifying key.
    Es256(p256_ecdsa::VerifyingKey),
}

/// Raw signature bytes. Length depends on the algorithm (64 bytes for
/// Ed25519 and ES256, 256 bytes for RS256-2048).
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

// ─── KeyPair ────────────────────────────────────────────────────────────

impl KeyPair {
    /// Generate a fresh key pair from the given RNG.
    pub fn generate<R: RngCore + CryptoRng>(
        algorithm: KeyAlgorithm,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => Ok(Self::Ed25519(ed25519_dalek::SigningKey::generate(rng))),
            KeyAlgorithm::Rs256 => RsaPrivateKey::new(rng, RSA_KEY_BITS)
                .map(|k| Self::Rs256(Box::new(k)))
                .map_err(|e| CryptoError::KeyGeneration(format!("RSA: {e}"))),
            KeyAlgorithm::Es256 => Ok(Self::Es256(p256_ecdsa::SigningKey::random(rng))),
        }
    }

    /// Rebuild a key pair from its secret bytes (see the module table).
    pub fn from_secret_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self, CryptoError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let seed: [u8; 32] = bytes.try_into().map_err(|_| {
                    CryptoError::InvalidKey(format!(
                        "Ed25519 seed must be 32 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
            }
            KeyAlgorithm::Rs256 => RsaPrivateKey::from_pkcs8_der(bytes)
                .map(|k| Self::Rs256(Box::new(k)))
                .map_err(|e| CryptoError::InvalidKey(format!("RSA PKCS#8: {e}"))),
            KeyAlgorithm::Es256 => p256_ecdsa::SigningKey::from_slice(bytes)
                .map(Self::Es256)
                .map_err(|e| CryptoError::InvalidKey(format!("P-256 scalar: {e}"))),
        }
    }

    /// Export the secret bytes for sealing.
    pub fn secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match self {
            Self::Ed25519(k) => Ok(Zeroizing::new(k.to_bytes().to_vec())),
            Self::Rs256(k) => k
                .to_pkcs8_der()
                .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
                .map_err(|e| CryptoError::InvalidKey(format!("RSA PKCS#8 export: {e}"))),
            Self::Es256(k) => Ok(Zeroizing::new(k.to_bytes().to_vec())),
        }
    }

    /// Algorithm of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::Rs256(_) => KeyAlgorithm::Rs256,
            Self::Es256(_) => KeyAlgorithm::Es256,
        }
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(k) => PublicKey::Ed25519(k.verifying_key()),
            Self::Rs256(k) => PublicKey::Rs256(Box::new(k.to_public_key())),
            Self::Es256(k) => PublicKey::Es256(p256_ecdsa::VerifyingKey::from(k)),
        }
    }

    /// Sign with the algorithm-specific primitive. All three primitives are
    /// deterministic (ECDSA nonces follow RFC 6979).
    pub fn sign(&self, input: &SigningInput) -> Result<Signature, CryptoError> {
        let msg = input.as_bytes();
        match self {
            Self::Ed25519(k) => Ok(Signature(k.sign(msg).to_bytes().to_vec())),
            Self::Rs256(k) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new((**k).clone());
                signer
                    .try_sign(msg)
                    .map(|sig| Signature(sig.to_vec()))
                    .map_err(|e| CryptoError::Signing(format!("RS256: {e}")))
            }
            Self::Es256(k) => {
                let sig: p256_ecdsa::Signature = k
                    .try_sign(msg)
                    .map_err(|e| CryptoError::Signing(format!("ES256: {e}")))?;
                Ok(Signature(sig.to_bytes().to_vec()))
            }
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({}, <redacted>)", self.algorithm())
    }
}

// ─── PublicKey ──────────────────────────────────────────────────────────

impl PublicKey {
    /// Algorithm of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::Rs256(_) => KeyAlgorithm::Rs256,
            Self::Es256(_) => KeyAlgorithm::Es256,
        }
    }

    /// Raw public bytes (see the module table).
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Ed25519(k) => Ok(k.to_bytes().to_vec()),
            Self::Rs256(k) => k
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| CryptoError::InvalidKey(format!("RSA PKCS#1 export: {e}"))),
            Self::Es256(k) => Ok(k.to_encoded_point(true).as_bytes().to_vec()),
        }
    }

    /// Parse raw public bytes for the given algorithm.
    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self, CryptoError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let arr: [u8; 32] = bytes.try_into().map_err(|_| {
                    CryptoError::InvalidKey(format!(
                        "Ed25519 public key must be 32 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&arr)
                    .map(Self::Ed25519)
                    .map_err(|e| CryptoError::InvalidKey(format!("Ed25519 point: {e}")))
            }
            KeyAlgorithm::Rs256 => RsaPublicKey::from_pkcs1_der(bytes)
                .map(|k| Self::Rs256(Box::new(k)))
                .map_err(|e| CryptoError::InvalidKey(format!("RSA PKCS#1: {e}"))),
            KeyAlgorithm::Es256 => p256_ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::Es256)
                .map_err(|e| CryptoError::InvalidKey(format!("P-256 point: {e}"))),
        }
    }

    /// Self-describing multibase (base58btc) form with a multicodec prefix.
    pub fn to_multibase(&self) -> Result<String, CryptoError> {
        Ok(multikey::encode_public(self.algorithm(), &self.to_bytes()?))
    }

    /// Parse the multibase form produced by [`PublicKey::to_multibase()`].
    /// The algorithm is read from the multicodec prefix.
    pub fn from_multibase(s: &str) -> Result<Self, CryptoError> {
        let (algorithm, bytes) = multikey::decode_public(s)?;
        Self::from_bytes(algorithm, &bytes)
    }

    /// Verify a signature over `input`.
    ///
    /// # Errors
    ///
    /// `CryptoError::VerificationFailed` for a malformed or non-matching
    /// signature.
    pub fn verify(&self, input: &SigningInput, signature: &Signature) -> Result<(), CryptoError> {
        let msg = input.as_bytes();
        let sig = signature.as_bytes();
        match self {
            Self::Ed25519(k) => {
                let sig = ed25519_dalek::Signature::from_slice(sig)
                    .map_err(|e| CryptoError::VerificationFailed(format!("malformed signature: {e}")))?;
                k.verify(msg, &sig)
                    .map_err(|_| CryptoError::VerificationFailed("Ed25519 signature mismatch".into()))
            }
            Self::Rs256(k) => {
                let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new((**k).clone());
                let sig = rsa::pkcs1v15::Signature::try_from(sig)
                    .map_err(|e| CryptoError::VerificationFailed(format!("malformed signature: {e}")))?;
                verifier
                    .verify(msg, &sig)
                    .map_err(|_| CryptoError::VerificationFailed("RS256 signature mismatch".into()))
            }
            Self::Es256(k) => {
                let sig = p256_ecdsa::Signature::from_slice(sig)
                    .map_err(|e| CryptoError::VerificationFailed(format!("malformed signature: {e}")))?;
                k.verify(msg, &sig)
                    .map_err(|_| CryptoError::VerificationFailed("ES256 signature mismatch".into()))
            }
        }
    }
}

// ─── Signature ──────────────────────────────────────────────────────────

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}
