//! # Key Persistence
//!
//! [`KeyRepository`] is the storage contract for signing keys. The one
//! compound write is [`KeyRepository::activate()`]: demoting an issuer's
//! active key and inserting its replacement happen atomically, so an issuer
//! is never left with zero (or two) active keys.
//!
//! [`InMemoryKeyRepository`] backs tests, the CLI keyring file, and the API
//! when no database is configured. The Postgres implementation lives in
//! `bdg-api`.

use std::collections::HashMap;

use async_trait::async_trait;
use bdg_core::{IssuerId, KeyId, StoreError, Timestamp};
use parking_lot::RwLock;

use crate::record::SigningKeyRecord;

/// Storage backend for signing keys.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Atomically revoke the issuer's current active key (if any) at
    /// `demoted_at` and insert `record` as the new active key. Returns the
    /// id of the demoted key.
    async fn activate(
        &self,
        record: SigningKeyRecord,
        demoted_at: Timestamp,
    ) -> Result<Option<KeyId>, StoreError>;

    /// Fetch a key by id.
    async fn get(&self, key_id: &KeyId) -> Result<Option<SigningKeyRecord>, StoreError>;

    /// The issuer's active key.
    async fn active_for(&self, issuer_id: &IssuerId) -> Result<Option<SigningKeyRecord>, StoreError>;

    /// All keys of an issuer, oldest first.
    async fn list_for(&self, issuer_id: &IssuerId) -> Result<Vec<SigningKeyRecord>, StoreError>;

    /// Mark a key revoked at `at`. Revoking an already revoked key keeps its
    /// original timestamp. Returns the updated record, or `None` if absent.
    async fn revoke(
        &self,
        key_id: &KeyId,
        at: Timestamp,
    ) -> Result<Option<SigningKeyRecord>, StoreError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ─── In-memory backend ──────────────────────────────────────────────────

/// Thread-safe in-memory key repository.
#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<SigningKeyRecord>,
    by_id: HashMap<KeyId, usize>,
}

impl InMemoryKeyRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository preloaded with `records` (e.g. from a keyring file).
    ///
    /// # Errors
    ///
    /// `StoreError::Duplicate` on repeated key ids, and `StoreError::Corrupt`
    /// if an issuer has more than one active key.
    pub fn from_records(records: Vec<SigningKeyRecord>) -> Result<Self, StoreError> {
        let mut inner = Inner::default();
        let mut active: HashMap<IssuerId, KeyId> = HashMap::new();
        for record in records {
            if inner.by_id.contains_key(&record.key_id) {
                return Err(StoreError::Duplicate(format!("key {}", record.key_id)));
            }
            if !record.revoked {
                if let Some(existing) = active.insert(record.issuer_id.clone(), record.key_id) {
                    return Err(StoreError::Corrupt(format!(
                        "issuer {} has two active keys ({existing}, {})",
                        record.issuer_id, record.key_id
                    )));
                }
            }
            inner.by_id.insert(record.key_id, inner.records.len());
            inner.records.push(record);
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Every record, in insertion order.
    pub fn snapshot(&self) -> Vec<SigningKeyRecord> {
        self.inner.read().records.clone()
    }
}

#[async_trait]
impl KeyRepository for InMemoryKeyRepository {
    async fn activate(
        &self,
        record: SigningKeyRecord,
        demoted_at: Timestamp,
    ) -> Result<Option<KeyId>, StoreError> {
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&record.key_id) {
            return Err(StoreError::Duplicate(format!("key {}", record.key_id)));
        }
        let mut demoted = None;
        for existing in inner.records.iter_mut() {
            if existing.issuer_id == record.issuer_id && !existing.revoked {
                existing.revoked = true;
                existing.revoked_at = Some(demoted_at);
                demoted = Some(existing.key_id);
            }
        }
        let idx = inner.records.len();
        inner.by_id.insert(record.key_id, idx);
        inner.records.push(record);
        Ok(demoted)
    }

    async fn get(&self, key_id: &KeyId) -> Result<Option<SigningKeyRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.by_id.get(key_id).map(|&i| inner.records[i].clone()))
    }

    async fn active_for(&self, issuer_id: &IssuerId) -> Result<Option<SigningKeyRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .iter()
            .find(|r| &r.issuer_id == issuer_id && !r.revoked)
            .cloned())
    }

    async fn list_for(&self, issuer_id: &IssuerId) -> Result<Vec<SigningKeyRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .iter()
            .filter(|r| &r.issuer_id == issuer_id)
            .cloned()
            .collect())
    }

    async fn revoke(
        &self,
        key_id: &KeyId,
        at: Timestamp,
    ) -> Result<Option<SigningKeyRecord>, StoreError> {
        let mut inner = self.inner.write();
        let Some(&idx) = inner.by_id.get(key_id) else {
            return Ok(None);
        };
        let record = &mut inner.records[idx];
        if !record.revoked {
            record.revoked = true;
            record.revoked_at = Some(at);
        }
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdg_crypto::KeyAlgorithm;

    fn record(issuer: &str) -> SigningKeyRecord {
        SigningKeyRecord {
            key_id: KeyId::new(),
            issuer_id: IssuerId::new(issuer).unwrap(),
            algorithm: KeyAlgorithm::Ed25519,
            public_key_multibase: "z".into(),
            private_key_multibase: "u".into(),
            controller: format!("did:web:localhost:issuers:{issuer}"),
            revoked: false,
            revoked_at: None,
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn activate_demotes_previous_active() {
        let repo = InMemoryKeyRepository::new();
        let first = record("I");
        let second = record("I");
        assert_eq!(repo.activate(first.clone(), Timestamp::now()).await.unwrap(), None);
        assert_eq!(
            repo.activate(second.clone(), Timestamp::now()).await.unwrap(),
            Some(first.key_id)
        );

        let active = repo.active_for(&first.issuer_id).await.unwrap().unwrap();
        assert_eq!(active.key_id, second.key_id);
        let old = repo.get(&first.key_id).await.unwrap().unwrap();
        assert!(old.revoked);
        assert!(old.revoked_at.is_some());
    }

    #[tokio::test]
    async fn issuers_are_independent() {
        let repo = InMemoryKeyRepository::new();
        let a = record("A");
        let b = record("B");
        repo.activate(a.clone(), Timestamp::now()).await.unwrap();
        repo.activate(b, Timestamp::now()).await.unwrap();
        assert!(!repo.get(&a.key_id).await.unwrap().unwrap().revoked);
        assert_eq!(repo.list_for(&a.issuer_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_keeps_first_timestamp() {
        let repo = InMemoryKeyRepository::new();
        let r = record("I");
        repo.activate(r.clone(), Timestamp::now()).await.unwrap();
        let t1 = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let t2 = Timestamp::parse("2026-02-01T00:00:00Z").unwrap();
        repo.revoke(&r.key_id, t1).await.unwrap();
        let again = repo.revoke(&r.key_id, t2).await.unwrap().unwrap();
        assert_eq!(again.revoked_at, Some(t1));
        assert!(repo.revoke(&KeyId::new(), t1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let repo = InMemoryKeyRepository::new();
        let r = record("I");
        repo.activate(r.clone(), Timestamp::now()).await.unwrap();
        assert!(matches!(
            repo.activate(r, Timestamp::now()).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn from_records_rejects_two_active_keys() {
        assert!(matches!(
            InMemoryKeyRepository::from_records(vec![record("I"), record("I")]),
            Err(StoreError::Corrupt(_))
        ));
        let repo = InMemoryKeyRepository::from_records(vec![record("I"), record("J")]).unwrap();
        assert_eq!(repo.snapshot().len(), 2);
    }
}
