//! # KeyStore
//!
//! Lifecycle of issuer signing keys on top of a [`KeyRepository`]:
//!
//! - [`KeyStore::generate_key()`] creates a key pair, seals the private half,
//!   and makes it the issuer's active key (demoting the previous one).
//! - [`KeyStore::rotate_key()`] does the same for an issuer that already has
//!   keys, reusing the previous algorithm unless told otherwise.
//! - [`KeyStore::revoke_key()`] retires a key without replacing it.
//! - [`KeyStore::unlock()`] / [`KeyStore::active_signing_key()`] open sealed
//!   key material for signing and refuse revoked keys.
//!
//! The store also implements [`VerificationKeyResolver`]: lookups go by the
//! key named in the verification method, including revoked keys.
//!
//! ## Security Invariant
//!
//! Private keys exist in plaintext only inside an [`UnlockedKey`]. Sealed
//! material is bound to its key id, so a sealed blob copied onto another
//! record does not open.

use std::sync::Arc;

use async_trait::async_trait;
use bdg_core::{BadgeError, IssuerId, KeyId, Timestamp};
use bdg_crypto::{CryptoProvider, KeyAlgorithm, KeyPair, KeySealer, PublicKey};
use bdg_vc::{ResolvedKey, VerificationKeyResolver};
use tracing::{info, warn};

use crate::error::KeyStoreError;
use crate::record::{parse_verification_method, SigningKeyRecord, VerificationMethod};
use crate::repository::KeyRepository;

/// Default prefix for issuer controller DIDs.
pub const DEFAULT_CONTROLLER_PREFIX: &str = "did:web:localhost:issuers:";

/// KeyStore configuration.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    /// Controller DID of an issuer is this prefix followed by the issuer id.
    pub controller_prefix: String,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            controller_prefix: DEFAULT_CONTROLLER_PREFIX.to_string(),
        }
    }
}

/// A key opened for signing.
pub struct UnlockedKey {
    /// Key identifier.
    pub key_id: KeyId,
    /// Owning issuer.
    pub issuer_id: IssuerId,
    /// `{controller}#{keyId}`, to put in the proof.
    pub verification_method: String,
    /// Private key material.
    pub key_pair: KeyPair,
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("key_id", &self.key_id)
            .field("issuer_id", &self.issuer_id)
            .field("verification_method", &self.verification_method)
            .field("key_pair", &self.key_pair)
            .finish()
    }
}

/// Issuer signing-key lifecycle.
#[derive(Clone)]
pub struct KeyStore {
    repo: Arc<dyn KeyRepository>,
    sealer: Arc<KeySealer>,
    provider: Arc<dyn CryptoProvider>,
    config: KeyStoreConfig,
}

impl KeyStore {
    pub fn new(
        repo: Arc<dyn KeyRepository>,
        sealer: Arc<KeySealer>,
        provider: Arc<dyn CryptoProvider>,
        config: KeyStoreConfig,
    ) -> Self {
        Self {
            repo,
            sealer,
            provider,
            config,
        }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Arc<dyn KeyRepository> {
        &self.repo
    }

    /// Controller DID for `issuer_id`.
    pub fn controller_for(&self, issuer_id: &IssuerId) -> String {
        format!("{}{}", self.config.controller_prefix, issuer_id)
    }

    /// Generate a key and make it the issuer's active key. Any previously
    /// active key is revoked in the same repository write.
    #[tracing::instrument(skip(self), fields(issuer = %issuer_id))]
    pub async fn generate_key(
        &self,
        issuer_id: &IssuerId,
        algorithm: KeyAlgorithm,
    ) -> Result<SigningKeyRecord, KeyStoreError> {
        let key_pair = self.provider.generate_keypair(algorithm)?;
        let key_id = KeyId::new();
        let now = Timestamp::now();

        let record = SigningKeyRecord {
            key_id,
            issuer_id: issuer_id.clone(),
            algorithm,
            public_key_multibase: key_pair.public_key().to_multibase()?,
            private_key_multibase: self
                .sealer
                .seal_key(&key_pair, &SigningKeyRecord::sealing_aad(&key_id))?,
            controller: self.controller_for(issuer_id),
            revoked: false,
            revoked_at: None,
            created_at: now,
        };

        let demoted = self.repo.activate(record.clone(), now).await?;
        match demoted {
            Some(previous) => info!(
                key_id = %key_id,
                previous = %previous,
                algorithm = %algorithm,
                "signing key generated; previous active key revoked"
            ),
            None => info!(key_id = %key_id, algorithm = %algorithm, "signing key generated"),
        }
        Ok(record)
    }

    /// Replace the issuer's active key.
    ///
    /// `algorithm` defaults to that of the most recent key.
    ///
    /// # Errors
    ///
    /// `KeyStoreError::NotFound` if the issuer has never had a key.
    #[tracing::instrument(skip(self), fields(issuer = %issuer_id))]
    pub async fn rotate_key(
        &self,
        issuer_id: &IssuerId,
        algorithm: Option<KeyAlgorithm>,
    ) -> Result<SigningKeyRecord, KeyStoreError> {
        let keys = self.repo.list_for(issuer_id).await?;
        let latest = keys
            .iter()
            .max_by_key(|k| k.created_at)
            .ok_or_else(|| KeyStoreError::NotFound(format!("issuer {issuer_id} has no keys")))?;
        let algorithm = algorithm.unwrap_or(latest.algorithm);
        self.generate_key(issuer_id, algorithm).await
    }

    /// Retire a key without generating a replacement.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_key(&self, key_id: &KeyId) -> Result<SigningKeyRecord, KeyStoreError> {
        let record = self
            .repo
            .revoke(key_id, Timestamp::now())
            .await?
            .ok_or_else(|| KeyStoreError::NotFound(format!("key {key_id}")))?;
        info!(key_id = %key_id, issuer = %record.issuer_id, "signing key revoked");
        Ok(record)
    }

    /// The issuer's active key record.
    pub async fn active_key(&self, issuer_id: &IssuerId) -> Result<SigningKeyRecord, KeyStoreError> {
        self.repo
            .active_for(issuer_id)
            .await?
            .ok_or_else(|| KeyStoreError::NotFound(format!("issuer {issuer_id} has no active key")))
    }

    /// All keys of an issuer, public view.
    pub async fn list_keys(&self, issuer_id: &IssuerId) -> Result<Vec<VerificationMethod>, KeyStoreError> {
        let keys = self.repo.list_for(issuer_id).await?;
        if keys.is_empty() {
            return Err(KeyStoreError::NotFound(format!("issuer {issuer_id} has no keys")));
        }
        Ok(keys.iter().map(SigningKeyRecord::to_verification_method).collect())
    }

    /// A key record by id.
    pub async fn get_key(&self, key_id: &KeyId) -> Result<SigningKeyRecord, KeyStoreError> {
        self.repo
            .get(key_id)
            .await?
            .ok_or_else(|| KeyStoreError::NotFound(format!("key {key_id}")))
    }

    /// Public verification-method document for a key.
    pub async fn verification_method_document(
        &self,
        key_id: &KeyId,
    ) -> Result<VerificationMethod, KeyStoreError> {
        Ok(self.get_key(key_id).await?.to_verification_method())
    }

    /// Resolve a verification method id to its key record.
    ///
    /// The full id must match, so a key id grafted onto another controller
    /// does not resolve.
    pub async fn record_for_verification_method(
        &self,
        verification_method: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyStoreError> {
        let (_, key_id) = parse_verification_method(verification_method)?;
        Ok(self
            .repo
            .get(&key_id)
            .await?
            .filter(|record| record.verification_method() == verification_method))
    }

    /// Public key named by a verification method, active or revoked.
    pub async fn public_key_for(&self, verification_method: &str) -> Result<PublicKey, KeyStoreError> {
        let record = self
            .record_for_verification_method(verification_method)
            .await?
            .ok_or_else(|| KeyStoreError::NotFound(format!("verification method {verification_method}")))?;
        Ok(record.public_key()?)
    }

    /// Open a key for signing.
    ///
    /// # Errors
    ///
    /// - `KeyStoreError::NotFound` for an unknown key.
    /// - `KeyStoreError::KeyRevoked` for a revoked key.
    /// - `KeyStoreError::Crypto` if the sealed material does not open.
    pub async fn unlock(&self, key_id: &KeyId) -> Result<UnlockedKey, KeyStoreError> {
        let record = self.get_key(key_id).await?;
        self.open(record)
    }

    /// Open the issuer's active key for signing.
    pub async fn active_signing_key(&self, issuer_id: &IssuerId) -> Result<UnlockedKey, KeyStoreError> {
        let record = self.active_key(issuer_id).await?;
        self.open(record)
    }

    fn open(&self, record: SigningKeyRecord) -> Result<UnlockedKey, KeyStoreError> {
        if record.revoked {
            return Err(KeyStoreError::KeyRevoked(record.key_id.to_string()));
        }
        let key_pair = self
            .sealer
            .open_key(
                record.algorithm,
                &record.private_key_multibase,
                &SigningKeyRecord::sealing_aad(&record.key_id),
            )
            .map_err(|e| {
                tracing::error!(key_id = %record.key_id, error = %e, "sealed signing key did not open");
                e
            })?;
        if key_pair.public_key().to_multibase()? != record.public_key_multibase {
            return Err(KeyStoreError::Crypto(bdg_crypto::CryptoError::InvalidKey(format!(
                "private key of {} does not match its public key",
                record.key_id
            ))));
        }
        Ok(UnlockedKey {
            verification_method: record.verification_method(),
            key_id: record.key_id,
            issuer_id: record.issuer_id,
            key_pair,
        })
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("provider", &self.provider.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl VerificationKeyResolver for KeyStore {
    async fn resolve_verification_key(
        &self,
        verification_method: &str,
    ) -> Result<Option<ResolvedKey>, BadgeError> {
        let record = match self.record_for_verification_method(verification_method).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            // A malformed id names no key.
            Err(KeyStoreError::InvalidVerificationMethod(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let public_key = record.public_key().map_err(|e| {
            warn!(key_id = %record.key_id, error = %e, "stored public key does not parse");
            BadgeError::from(e)
        })?;
        Ok(Some(ResolvedKey {
            public_key,
            issuer_id: record.issuer_id,
            controller: record.controller,
            revoked: record.revoked,
        }))
    }
}
