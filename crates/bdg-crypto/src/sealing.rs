//! # Private-Key Sealing
//!
//! Private keys are stored encrypted with AES-256-GCM under a service-wide
//! key-encryption key. The sealed form is
//! `multibase(base64url, nonce(12) || ciphertext || tag(16))`, which is what
//! lands in the `privateKeyMultibase` column.
//!
//! The key id is bound as associated data, so a sealed blob copied onto a
//! different key record fails to open.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use multibase::Base;
use zeroize::Zeroizing;

use crate::algorithm::KeyAlgorithm;
use crate::error::CryptoError;
use crate::keys::KeyPair;
use crate::provider::CryptoProvider;

const NONCE_SIZE: usize = 12;

/// Encrypts and decrypts private-key material.
pub struct KeySealer {
    key: Zeroizing<[u8; 32]>,
    provider: Arc<dyn CryptoProvider>,
}

impl KeySealer {
    /// Create from a raw 32-byte key-encryption key.
    pub fn new(key: Zeroizing<[u8; 32]>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { key, provider }
    }

    /// Create from a 64-character hex key-encryption key.
    pub fn from_hex(hex: &str, provider: Arc<dyn CryptoProvider>) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex_to_bytes(hex.trim())?);
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Sealing(format!(
                "key-encryption key must be 32 bytes (64 hex chars), got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self::new(Zeroizing::new(key), provider))
    }

    /// Create with a random key drawn from the provider. Sealed keys do not
    /// survive a restart.
    pub fn ephemeral(provider: Arc<dyn CryptoProvider>) -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        provider.fill_random(&mut key[..]);
        Self::new(key, provider)
    }

    /// Encrypt `plaintext`, binding `aad`.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|e| CryptoError::Sealing(format!("cipher init failed: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.provider.fill_random(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::Sealing("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(multibase::encode(Base::Base64Url, out))
    }

    /// Decrypt a value produced by [`KeySealer::seal()`] with the same `aad`.
    pub fn open(&self, sealed: &str, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let (_, bytes) = multibase::decode(sealed)
            .map_err(|e| CryptoError::Sealing(format!("invalid sealed key encoding: {e}")))?;
        if bytes.len() <= NONCE_SIZE {
            return Err(CryptoError::Sealing("sealed key too short".into()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|e| CryptoError::Sealing(format!("cipher init failed: {e}")))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::Sealing("decryption failed (wrong key or tampered record)".into()))
    }

    /// Seal a key pair's secret bytes.
    pub fn seal_key(&self, key: &KeyPair, aad: &[u8]) -> Result<String, CryptoError> {
        let secret = key.secret_bytes()?;
        self.seal(&secret, aad)
    }

    /// Open a sealed key pair.
    pub fn open_key(
        &self,
        algorithm: KeyAlgorithm,
        sealed: &str,
        aad: &[u8],
    ) -> Result<KeyPair, CryptoError> {
        let secret = self.open(sealed, aad)?;
        KeyPair::from_secret_bytes(algorithm, &secret)
    }
}

impl std::fmt::Debug for KeySealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySealer(provider={})", self.provider.provider_name())
    }
}

/// Decode a hex string to bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, CryptoError> {
    if hex.len() % 2 != 0 {
        return Err(CryptoError::Encoding(format!(
            "hex string has odd length {}",
            hex.len()
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CryptoError::Encoding(format!("invalid hex at offset {i}")))
        })
        .collect()
}

/// Encode bytes as lowercase hex.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
