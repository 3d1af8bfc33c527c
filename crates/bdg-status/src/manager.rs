//! # Status List Manager
//!
//! Owns each issuer's status lists (one per purpose), maps credentials to
//! bits, and republishes the signed list credential on every change.
//!
//! ## Concurrency
//!
//! A list is one shared blob per (issuer, purpose), so every write is a
//! read-modify-write. Two mechanisms close the lost-update window:
//!
//! - within a process, writes to the same list are serialized on a
//!   per-(issuer, purpose) async mutex;
//! - across processes, the write is a compare-and-swap on the list version
//!   and is retried from a fresh read on conflict, up to
//!   `max_write_attempts`, after which the caller gets `Conflict`.
//!
//! ## Security Invariant
//!
//! Reads go to the list bit, never to the mirrored per-credential row. A list
//! that fails to decode is an error (`RevocationState`), never "not revoked".

use std::sync::Arc;

use async_trait::async_trait;
use bdg_core::{BadgeError, CredentialId, IssuerId, StatusListId, StoreError, Timestamp};
use bdg_keys::KeyStore;
use bdg_vc::{
    Credential, CredentialSigner, ProofFormat, RevocationCheck, SignOptions, StatusFlags,
    VC_CONTEXT_V1,
};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::bitvector::BitVector;
use crate::error::StatusError;
use crate::index::{index_for_credential, DEFAULT_CAPACITY};
use crate::model::{
    CredentialStatusRecord, CredentialStatusView, StatusChange, StatusList, StatusListEntry,
    StatusListIndexMapping, StatusPurpose, STATUS_LIST_CONTEXT, STATUS_LIST_CREDENTIAL_TYPE,
    STATUS_LIST_SUBJECT_TYPE,
};
use crate::repository::StatusListRepository;

/// Status list configuration.
#[derive(Debug, Clone)]
pub struct StatusListConfig {
    /// Public base URL; list ids are `{base_url}/status/list/{issuerId}`.
    pub base_url: String,
    /// Capacity of newly created lists.
    pub capacity: usize,
    /// Compare-and-swap attempts per status write.
    pub max_write_attempts: u32,
}

impl Default for StatusListConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            capacity: DEFAULT_CAPACITY,
            max_write_attempts: 5,
        }
    }
}

/// Per-issuer status list service.
pub struct StatusListManager {
    repo: Arc<dyn StatusListRepository>,
    keys: Arc<KeyStore>,
    signer: CredentialSigner,
    config: StatusListConfig,
    locks: DashMap<(IssuerId, StatusPurpose), Arc<Mutex<()>>>,
}

impl StatusListManager {
    pub fn new(
        repo: Arc<dyn StatusListRepository>,
        keys: Arc<KeyStore>,
        signer: CredentialSigner,
        config: StatusListConfig,
    ) -> Self {
        Self {
            repo,
            keys,
            signer,
            config,
            locks: DashMap::new(),
        }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Arc<dyn StatusListRepository> {
        &self.repo
    }

    /// Public URL (and credential id) of an issuer's list.
    pub fn list_url(&self, issuer_id: &IssuerId, purpose: StatusPurpose) -> String {
        let base = format!(
            "{}/status/list/{}",
            self.config.base_url.trim_end_matches('/'),
            issuer_id
        );
        match purpose {
            StatusPurpose::Revocation => base,
            StatusPurpose::Suspension => format!("{base}?purpose=suspension"),
        }
    }

    /// The issuer's list for `purpose`, creating (and signing) an empty one
    /// on first use.
    ///
    /// # Errors
    ///
    /// `NotFound` (through the key store) when the issuer has no active key
    /// to sign a new list with.
    #[tracing::instrument(skip(self), fields(issuer = %issuer_id))]
    pub async fn get_or_create(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<StatusList, StatusError> {
        if let Some(list) = self.repo.find_list(issuer_id, purpose).await? {
            return Ok(list);
        }
        let lock = self.lock_for(issuer_id, purpose);
        let _guard = lock.lock().await;
        self.ensure_list(issuer_id, purpose).await
    }

    /// The signed list credential served to relying parties.
    pub async fn status_list_credential(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<Credential, StatusError> {
        Ok(self.get_or_create(issuer_id, purpose).await?.credential)
    }

    /// Place a credential on the issuer's list and return the
    /// `credentialStatus` entry to embed before signing it.
    #[tracing::instrument(skip(self), fields(issuer = %issuer_id, credential = %credential_id))]
    pub async fn register(
        &self,
        issuer_id: &IssuerId,
        credential_id: &CredentialId,
        purpose: StatusPurpose,
    ) -> Result<StatusListEntry, StatusError> {
        let list = self.get_or_create(issuer_id, purpose).await?;
        let mapping = self.map_credential(&list, credential_id).await?;
        Ok(StatusListEntry::new(
            &self.list_url(issuer_id, purpose),
            purpose,
            mapping.status_index,
        ))
    }

    /// Set or clear the credential's bit on the issuer's `purpose` list and
    /// republish the list. Setting a bit that is already set (or clearing a
    /// clear one) changes nothing on the list.
    #[tracing::instrument(
        skip_all,
        fields(issuer = %issuer_id, credential = %credential_id, purpose = %purpose, value = value)
    )]
    pub async fn set_status(
        &self,
        issuer_id: &IssuerId,
        credential_id: &CredentialId,
        purpose: StatusPurpose,
        value: bool,
        reason: Option<String>,
    ) -> Result<StatusChange, StatusError> {
        let lock = self.lock_for(issuer_id, purpose);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        let change = loop {
            attempt += 1;
            let list = self.ensure_list(issuer_id, purpose).await?;
            let mapping = self.map_credential(&list, credential_id).await?;
            let index = mapping.status_index;

            let mut bits = self.decode(&list)?;
            if bits.get(index) == value {
                break StatusChange {
                    credential_id: credential_id.clone(),
                    purpose,
                    status_index: index,
                    value,
                    changed: false,
                    list_version: list.version,
                };
            }
            bits.assign(index, value);
            let encoded = bits.encode()?;
            let credential = self.sign_list(issuer_id, purpose, &encoded).await?;
            let updated = StatusList {
                encoded_list: encoded,
                credential,
                version: list.version + 1,
                updated_at: Timestamp::now(),
                ..list.clone()
            };
            if self.repo.compare_and_swap(&updated, list.version).await? {
                break StatusChange {
                    credential_id: credential_id.clone(),
                    purpose,
                    status_index: index,
                    value,
                    changed: true,
                    list_version: updated.version,
                };
            }
            if attempt >= self.config.max_write_attempts {
                return Err(StatusError::Conflict(format!(
                    "{purpose} list of issuer {issuer_id} changed concurrently {attempt} times"
                )));
            }
            warn!(attempt, version = list.version, "status list version moved; retrying");
        };

        self.update_mirror(issuer_id, credential_id, purpose, value, reason)
            .await?;
        info!(
            index = change.status_index,
            changed = change.changed,
            version = change.list_version,
            "credential status updated"
        );
        Ok(change)
    }

    /// Revoke a credential.
    pub async fn revoke(
        &self,
        issuer_id: &IssuerId,
        credential_id: &CredentialId,
        reason: Option<String>,
    ) -> Result<StatusChange, StatusError> {
        self.set_status(issuer_id, credential_id, StatusPurpose::Revocation, true, reason)
            .await
    }

    /// Clear a credential's revocation bit.
    pub async fn reinstate(
        &self,
        issuer_id: &IssuerId,
        credential_id: &CredentialId,
    ) -> Result<StatusChange, StatusError> {
        self.set_status(issuer_id, credential_id, StatusPurpose::Revocation, false, None)
            .await
    }

    /// Current bits of a credential. A credential never placed on a list
    /// reads as neither revoked nor suspended. Only lists of the issuer the
    /// credential is registered to are read.
    pub async fn status_flags(&self, credential_id: &CredentialId) -> Result<StatusFlags, StatusError> {
        let mut flags = StatusFlags::default();
        let (mappings, _) = self.owned_mappings(credential_id).await?;
        for mapping in mappings {
            let bit = self.read_bit(&mapping).await?;
            match mapping.purpose {
                StatusPurpose::Revocation => flags.revoked = bit,
                StatusPurpose::Suspension => flags.suspended = bit,
            }
        }
        Ok(flags)
    }

    /// Whether the credential's revocation bit is set.
    pub async fn is_revoked(&self, credential_id: &CredentialId) -> Result<bool, StatusError> {
        Ok(self.status_flags(credential_id).await?.revoked)
    }

    /// Status of a credential with its list entries.
    ///
    /// # Errors
    ///
    /// `NotFound` when the credential was never registered or given a status.
    pub async fn status_of(&self, credential_id: &CredentialId) -> Result<CredentialStatusView, StatusError> {
        let (mappings, mirror) = self.owned_mappings(credential_id).await?;
        if mappings.is_empty() && mirror.is_none() {
            return Err(StatusError::NotFound(format!("credential {credential_id}")));
        }

        let mut view = CredentialStatusView {
            credential_id: credential_id.clone(),
            revoked: false,
            suspended: false,
            reason: None,
            status_list: None,
            suspension_list: None,
        };
        for mapping in &mappings {
            let bit = self.read_bit(mapping).await?;
            let entry = StatusListEntry::new(
                &self.list_url(&mapping.issuer_id, mapping.purpose),
                mapping.purpose,
                mapping.status_index,
            );
            match mapping.purpose {
                StatusPurpose::Revocation => {
                    view.revoked = bit;
                    view.status_list = Some(entry);
                }
                StatusPurpose::Suspension => {
                    view.suspended = bit;
                    view.suspension_list = Some(entry);
                }
            }
        }
        if view.revoked || view.suspended {
            view.reason = mirror.and_then(|m| m.reason);
        }
        Ok(view)
    }

    // ─── internals ──────────────────────────────────────────────────────

    fn lock_for(&self, issuer_id: &IssuerId, purpose: StatusPurpose) -> Arc<Mutex<()>> {
        self.locks
            .entry((issuer_id.clone(), purpose))
            .or_default()
            .clone()
    }

    /// Load or create the list. The caller holds the list's lock.
    async fn ensure_list(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<StatusList, StatusError> {
        if let Some(list) = self.repo.find_list(issuer_id, purpose).await? {
            return Ok(list);
        }

        let encoded = BitVector::new(self.config.capacity).encode()?;
        let credential = self.sign_list(issuer_id, purpose, &encoded).await?;
        let now = Timestamp::now();
        let list = StatusList {
            status_list_id: StatusListId::new(),
            issuer_id: issuer_id.clone(),
            purpose,
            capacity: self.config.capacity,
            encoded_list: encoded,
            credential,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        match self.repo.insert_list(&list).await {
            Ok(()) => {
                info!(
                    issuer = %issuer_id,
                    purpose = %purpose,
                    list = %list.status_list_id,
                    capacity = list.capacity,
                    "status list created"
                );
                Ok(list)
            }
            // Another process created it first.
            Err(StoreError::Duplicate(_)) => self
                .repo
                .find_list(issuer_id, purpose)
                .await?
                .ok_or_else(|| StatusError::Conflict(format!("{purpose} list of issuer {issuer_id}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Mappings of the credential that belong to its registered issuer,
    /// with the mirrored row that records that issuer.
    async fn owned_mappings(
        &self,
        credential_id: &CredentialId,
    ) -> Result<(Vec<StatusListIndexMapping>, Option<CredentialStatusRecord>), StatusError> {
        let mut mappings = self.repo.mappings_for(credential_id).await?;
        let mirror = self.repo.credential_status(credential_id).await?;
        let owner = match &mirror {
            Some(record) => Some(record.issuer_id.clone()),
            None => mappings
                .iter()
                .min_by_key(|m| m.created_at)
                .map(|m| m.issuer_id.clone()),
        };
        if let Some(owner) = owner {
            mappings.retain(|m| {
                let owned = m.issuer_id == owner;
                if !owned {
                    warn!(
                        credential = %credential_id,
                        owner = %owner,
                        issuer = %m.issuer_id,
                        "ignoring status mapping of another issuer"
                    );
                }
                owned
            });
        }
        Ok((mappings, mirror))
    }

    /// Bind the credential to the list's issuer and place it on the list.
    /// A credential already bound to another issuer, under any purpose, is
    /// `Forbidden`.
    async fn map_credential(
        &self,
        list: &StatusList,
        credential_id: &CredentialId,
    ) -> Result<StatusListIndexMapping, StatusError> {
        let foreign = || {
            StatusError::Forbidden(format!(
                "credential {credential_id} is registered to another issuer"
            ))
        };
        let owner = self
            .repo
            .claim_credential(&CredentialStatusRecord {
                credential_id: credential_id.clone(),
                issuer_id: list.issuer_id.clone(),
                revoked: false,
                suspended: false,
                reason: None,
                updated_at: Timestamp::now(),
            })
            .await?;
        if owner.issuer_id != list.issuer_id {
            return Err(foreign());
        }
        let existing = self.repo.mappings_for(credential_id).await?;
        if existing.iter().any(|m| m.issuer_id != list.issuer_id) {
            return Err(foreign());
        }

        let proposed = StatusListIndexMapping {
            credential_id: credential_id.clone(),
            status_list_id: list.status_list_id,
            issuer_id: list.issuer_id.clone(),
            purpose: list.purpose,
            status_index: index_for_credential(credential_id.as_str(), list.capacity),
            created_at: Timestamp::now(),
        };
        let stored = self.repo.put_mapping(&proposed).await?;
        if stored.issuer_id != list.issuer_id {
            return Err(foreign());
        }
        if stored.status_list_id != list.status_list_id {
            return Err(StatusError::Corrupted(format!(
                "credential {credential_id} maps to list {} but issuer {} uses {}",
                stored.status_list_id, list.issuer_id, list.status_list_id
            )));
        }
        Ok(stored)
    }

    async fn read_bit(&self, mapping: &StatusListIndexMapping) -> Result<bool, StatusError> {
        let list = self
            .repo
            .get_list(&mapping.status_list_id)
            .await?
            .ok_or_else(|| StatusError::NotFound(format!("status list {}", mapping.status_list_id)))?;
        Ok(self.decode(&list)?.get(mapping.status_index))
    }

    fn decode(&self, list: &StatusList) -> Result<BitVector, StatusError> {
        BitVector::decode(&list.encoded_list, list.capacity).map_err(|e| {
            warn!(list = %list.status_list_id, issuer = %list.issuer_id, error = %e, "status list does not decode");
            e
        })
    }

    async fn sign_list(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
        encoded: &str,
    ) -> Result<Credential, StatusError> {
        let key = self.keys.active_signing_key(issuer_id).await?;
        let url = self.list_url(issuer_id, purpose);
        let document = Credential::from_value(json!({
            "@context": [VC_CONTEXT_V1, STATUS_LIST_CONTEXT],
            "id": url,
            "type": ["VerifiableCredential", STATUS_LIST_CREDENTIAL_TYPE],
            "issuer": issuer_id.as_str(),
            "issuanceDate": Timestamp::now().to_iso8601(),
            "credentialSubject": {
                "id": format!("{url}#list"),
                "type": STATUS_LIST_SUBJECT_TYPE,
                "statusPurpose": purpose.as_str(),
                "encodedList": encoded,
            }
        }))?;
        let format = if key.key_pair.algorithm().cryptosuite().is_some() {
            ProofFormat::DataIntegrity
        } else {
            ProofFormat::Jwt
        };
        Ok(self.signer.sign(
            &document,
            &key.key_pair,
            &SignOptions::new(key.verification_method.clone(), format),
        )?)
    }

    async fn update_mirror(
        &self,
        issuer_id: &IssuerId,
        credential_id: &CredentialId,
        purpose: StatusPurpose,
        value: bool,
        reason: Option<String>,
    ) -> Result<(), StatusError> {
        let mut record = self
            .repo
            .credential_status(credential_id)
            .await?
            .unwrap_or_else(|| CredentialStatusRecord {
                credential_id: credential_id.clone(),
                issuer_id: issuer_id.clone(),
                revoked: false,
                suspended: false,
                reason: None,
                updated_at: Timestamp::now(),
            });
        match purpose {
            StatusPurpose::Revocation => record.revoked = value,
            StatusPurpose::Suspension => record.suspended = value,
        }
        if value {
            record.reason = reason;
        } else if !record.revoked && !record.suspended {
            record.reason = None;
        }
        record.updated_at = Timestamp::now();
        self.repo.upsert_credential_status(&record).await?;
        Ok(())
    }
}

impl std::fmt::Debug for StatusListManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusListManager")
            .field("config", &self.config)
            .field("locks", &self.locks.len())
            .finish()
    }
}

#[async_trait]
impl RevocationCheck for StatusListManager {
    async fn status_flags(&self, credential_id: &CredentialId) -> Result<StatusFlags, BadgeError> {
        StatusListManager::status_flags(self, credential_id)
            .await
            .map_err(BadgeError::from)
    }
}
