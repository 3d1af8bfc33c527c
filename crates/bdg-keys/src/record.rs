//! # Signing Key Records
//!
//! [`SigningKeyRecord`] is the persisted form of an issuer key. Records are
//! created active, may be revoked once, and are never deleted: a revoked key
//! keeps verifying the credentials it signed.
//!
//! The verification method id of a key is `{controller}#{keyId}`. That string
//! is what proofs carry, and what the store resolves.

use bdg_core::{IssuerId, KeyId, Timestamp};
use bdg_crypto::{CryptoError, KeyAlgorithm, PublicKey};
use serde::{Deserialize, Serialize};

use crate::error::KeyStoreError;

/// Verification method type published for every key.
pub const VERIFICATION_METHOD_TYPE: &str = "Multikey";

/// A stored issuer signing key.
///
/// `private_key_multibase` holds sealed (encrypted) key material only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyRecord {
    /// Key identifier.
    pub key_id: KeyId,
    /// Owning issuer.
    pub issuer_id: IssuerId,
    /// Signature algorithm.
    pub algorithm: KeyAlgorithm,
    /// Public key, multibase with multicodec prefix.
    pub public_key_multibase: String,
    /// Sealed private key.
    pub private_key_multibase: String,
    /// Controller DID.
    pub controller: String,
    /// Whether the key has been retired.
    pub revoked: bool,
    /// When the key was retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<Timestamp>,
    /// When the key was created.
    pub created_at: Timestamp,
}

/// Lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Usable for new signatures.
    Active,
    /// Verification only.
    Revoked,
}

impl SigningKeyRecord {
    /// `{controller}#{keyId}`.
    pub fn verification_method(&self) -> String {
        verification_method_id(&self.controller, &self.key_id)
    }

    /// Lifecycle state.
    pub fn status(&self) -> KeyStatus {
        if self.revoked {
            KeyStatus::Revoked
        } else {
            KeyStatus::Active
        }
    }

    /// Parse the public key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        let key = PublicKey::from_multibase(&self.public_key_multibase)?;
        if key.algorithm() != self.algorithm {
            return Err(CryptoError::InvalidKey(format!(
                "key {} is recorded as {} but its material is {}",
                self.key_id,
                self.algorithm,
                key.algorithm()
            )));
        }
        Ok(key)
    }

    /// Public view with no private material.
    pub fn to_verification_method(&self) -> VerificationMethod {
        VerificationMethod {
            id: self.verification_method(),
            method_type: VERIFICATION_METHOD_TYPE.to_string(),
            controller: self.controller.clone(),
            public_key_multibase: self.public_key_multibase.clone(),
            key_id: self.key_id,
            algorithm: self.algorithm,
            status: self.status(),
            created_at: self.created_at,
            revoked_at: self.revoked_at,
        }
    }

    /// Associated data bound to the sealed private key.
    pub(crate) fn sealing_aad(key_id: &KeyId) -> Vec<u8> {
        format!("bdg-signing-key:{key_id}").into_bytes()
    }
}

/// Public verification-method document for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// `{controller}#{keyId}`.
    pub id: String,
    /// Always `Multikey`.
    #[serde(rename = "type")]
    pub method_type: String,
    /// Controller DID.
    pub controller: String,
    /// Public key, multibase.
    pub public_key_multibase: String,
    /// Key identifier.
    pub key_id: KeyId,
    /// Signature algorithm.
    pub algorithm: KeyAlgorithm,
    /// Lifecycle state.
    pub status: KeyStatus,
    /// When the key was created.
    pub created_at: Timestamp,
    /// When the key was retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<Timestamp>,
}

/// Build a verification method id.
pub fn verification_method_id(controller: &str, key_id: &KeyId) -> String {
    format!("{controller}#{key_id}")
}

/// Split a verification method id into controller and key id.
pub fn parse_verification_method(vm: &str) -> Result<(&str, KeyId), KeyStoreError> {
    let (controller, fragment) = vm
        .rsplit_once('#')
        .ok_or_else(|| KeyStoreError::InvalidVerificationMethod(format!("{vm:?} has no fragment")))?;
    if controller.is_empty() {
        return Err(KeyStoreError::InvalidVerificationMethod(format!(
            "{vm:?} has no controller"
        )));
    }
    let key_id = fragment
        .parse::<KeyId>()
        .map_err(|_| KeyStoreError::InvalidVerificationMethod(format!("{vm:?} fragment is not a key id")))?;
    Ok((controller, key_id))
}
