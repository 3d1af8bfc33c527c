//! # Crypto Provider Abstraction
//!
//! Key generation and randomness go through an injected [`CryptoProvider`]
//! rather than a process-wide RNG. Production code uses
//! [`OsCryptoProvider`]; tests substitute [`SeededCryptoProvider`] to get
//! reproducible keys and nonces without patching globals.
//!
//! ## Security Invariants
//!
//! - `CryptoProvider` is `Send + Sync` for use across async tasks.
//! - Signing input is `&SigningInput`, which can only be built from
//!   `CanonicalBytes`.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_core::{OsRng, RngCore};

use crate::algorithm::KeyAlgorithm;
use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey, Signature};
use crate::signing_input::SigningInput;

/// Source of key pairs and randomness, plus the sign/verify entry points.
pub trait CryptoProvider: Send + Sync {
    /// Generate a new key pair for `algorithm`.
    fn generate_keypair(&self, algorithm: KeyAlgorithm) -> Result<KeyPair, CryptoError>;

    /// Fill `buf` with random bytes.
    fn fill_random(&self, buf: &mut [u8]);

    /// Sign with `key`.
    fn sign(&self, key: &KeyPair, input: &SigningInput) -> Result<Signature, CryptoError> {
        key.sign(input)
    }

    /// Verify `signature` with `key`.
    fn verify(
        &self,
        key: &PublicKey,
        input: &SigningInput,
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        key.verify(input, signature)
    }

    /// Human-readable name for diagnostics.
    fn provider_name(&self) -> &str;
}

// ─── OsCryptoProvider ────────────────────────────────────────────────────

/// Provider backed by the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCryptoProvider;

impl CryptoProvider for OsCryptoProvider {
    fn generate_keypair(&self, algorithm: KeyAlgorithm) -> Result<KeyPair, CryptoError> {
        KeyPair::generate(algorithm, &mut OsRng)
    }

    fn fill_random(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    fn provider_name(&self) -> &str {
        "OsCryptoProvider"
    }
}

// ─── SeededCryptoProvider ────────────────────────────────────────────────

/// Deterministic provider for tests. Two providers built from the same seed
/// produce the same sequence of keys and random bytes.
///
/// Not for production: the seed is the whole secret.
pub struct SeededCryptoProvider {
    rng: Mutex<StdRng>,
}

impl SeededCryptoProvider {
    /// Create from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CryptoProvider for SeededCryptoProvider {
    fn generate_keypair(&self, algorithm: KeyAlgorithm) -> Result<KeyPair, CryptoError> {
        let mut rng = self.rng.lock();
        KeyPair::generate(algorithm, &mut *rng)
    }

    fn fill_random(&self, buf: &mut [u8]) {
        self.rng.lock().fill_bytes(buf);
    }

    fn provider_name(&self) -> &str {
        "SeededCryptoProvider"
    }
}

impl std::fmt::Debug for SeededCryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SeededCryptoProvider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdg_core::CanonicalBytes;

    #[test]
    fn seeded_providers_are_reproducible() {
        let a = SeededCryptoProvider::new(42);
        let b = SeededCryptoProvider::new(42);
        let ka = a.generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let kb = b.generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        assert_eq!(ka.public_key(), kb.public_key());
    }

    #[test]
    fn seeded_sequence_advances() {
        let p = SeededCryptoProvider::new(42);
        let k1 = p.generate_keypair(KeyAlgorithm::Es256).unwrap();
        let k2 = p.generate_keypair(KeyAlgorithm::Es256).unwrap();
        assert_ne!(k1.public_key(), k2.public_key());
    }

    #[test]
    fn os_provider_random_bytes_differ() {
        let p = OsCryptoProvider;
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        p.fill_random(&mut a);
        p.fill_random(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn default_sign_and_verify_delegate_to_keys() {
        let p = OsCryptoProvider;
        let key = p.generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let input = SigningInput::canonical(&CanonicalBytes::new(&"hello").unwrap());
        let sig = p.sign(&key, &input).unwrap();
        p.verify(&key.public_key(), &input, &sig).unwrap();
        assert_eq!(p.provider_name(), "OsCryptoProvider");
    }
}
