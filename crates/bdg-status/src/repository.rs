//! # Status List Persistence
//!
//! [`StatusListRepository`] stores the three status tables: lists, index
//! mappings, and the per-credential mirror. List writes are conditional on
//! the version read by the writer ([`StatusListRepository::compare_and_swap()`]),
//! which makes concurrent writers from different processes detect each
//! other instead of losing updates.

use std::collections::HashMap;

use async_trait::async_trait;
use bdg_core::{CredentialId, IssuerId, StatusListId, StoreError};
use parking_lot::RwLock;

use crate::model::{CredentialStatusRecord, StatusList, StatusListIndexMapping, StatusPurpose};

/// Storage backend for status lists.
#[async_trait]
pub trait StatusListRepository: Send + Sync {
    /// The issuer's list for `purpose`.
    async fn find_list(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<Option<StatusList>, StoreError>;

    /// A list by id.
    async fn get_list(&self, id: &StatusListId) -> Result<Option<StatusList>, StoreError>;

    /// Insert a new list. `StoreError::Duplicate` if the issuer already has
    /// one for that purpose.
    async fn insert_list(&self, list: &StatusList) -> Result<(), StoreError>;

    /// Replace `encoded_list`, `credential` and `updated_at` of the stored
    /// list if its version is still `expected_version`; the stored version
    /// becomes `list.version`. Returns `false` when another writer got there
    /// first.
    async fn compare_and_swap(
        &self,
        list: &StatusList,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    /// Record a mapping. If the credential already has one for the same
    /// purpose, that one is returned unchanged.
    async fn put_mapping(
        &self,
        mapping: &StatusListIndexMapping,
    ) -> Result<StatusListIndexMapping, StoreError>;

    /// All mappings of a credential.
    async fn mappings_for(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<StatusListIndexMapping>, StoreError>;

    /// Insert `record` unless the credential already has a mirrored row, and
    /// return the stored row. The first claim binds a credential id to its
    /// issuer for every purpose.
    async fn claim_credential(
        &self,
        record: &CredentialStatusRecord,
    ) -> Result<CredentialStatusRecord, StoreError>;

    /// Insert or replace the mirrored status row. An existing row keeps its
    /// issuer.
    async fn upsert_credential_status(&self, record: &CredentialStatusRecord) -> Result<(), StoreError>;

    /// The mirrored status row.
    async fn credential_status(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<CredentialStatusRecord>, StoreError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ─── In-memory backend ──────────────────────────────────────────────────

/// Thread-safe in-memory status repository.
#[derive(Debug, Default)]
pub struct InMemoryStatusListRepository {
    lists: RwLock<HashMap<StatusListId, StatusList>>,
    mappings: RwLock<HashMap<(CredentialId, StatusPurpose), StatusListIndexMapping>>,
    mirror: RwLock<HashMap<CredentialId, CredentialStatusRecord>>,
}

impl InMemoryStatusListRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusListRepository for InMemoryStatusListRepository {
    async fn find_list(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<Option<StatusList>, StoreError> {
        Ok(self
            .lists
            .read()
            .values()
            .find(|l| &l.issuer_id == issuer_id && l.purpose == purpose)
            .cloned())
    }

    async fn get_list(&self, id: &StatusListId) -> Result<Option<StatusList>, StoreError> {
        Ok(self.lists.read().get(id).cloned())
    }

    async fn insert_list(&self, list: &StatusList) -> Result<(), StoreError> {
        let mut lists = self.lists.write();
        if lists.contains_key(&list.status_list_id)
            || lists
                .values()
                .any(|l| l.issuer_id == list.issuer_id && l.purpose == list.purpose)
        {
            return Err(StoreError::Duplicate(format!(
                "{} list for issuer {}",
                list.purpose, list.issuer_id
            )));
        }
        lists.insert(list.status_list_id, list.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        list: &StatusList,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let mut lists = self.lists.write();
        let Some(stored) = lists.get_mut(&list.status_list_id) else {
            return Err(StoreError::Backend(format!(
                "status list {} does not exist",
                list.status_list_id
            )));
        };
        if stored.version != expected_version {
            return Ok(false);
        }
        stored.encoded_list = list.encoded_list.clone();
        stored.credential = list.credential.clone();
        stored.updated_at = list.updated_at;
        stored.version = list.version;
        Ok(true)
    }

    async fn put_mapping(
        &self,
        mapping: &StatusListIndexMapping,
    ) -> Result<StatusListIndexMapping, StoreError> {
        let mut mappings = self.mappings.write();
        Ok(mappings
            .entry((mapping.credential_id.clone(), mapping.purpose))
            .or_insert_with(|| mapping.clone())
            .clone())
    }

    async fn mappings_for(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<StatusListIndexMapping>, StoreError> {
        let mut found: Vec<_> = self
            .mappings
            .read()
            .values()
            .filter(|m| &m.credential_id == credential_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.purpose);
        Ok(found)
    }

    async fn claim_credential(
        &self,
        record: &CredentialStatusRecord,
    ) -> Result<CredentialStatusRecord, StoreError> {
        Ok(self
            .mirror
            .write()
            .entry(record.credential_id.clone())
            .or_insert_with(|| record.clone())
            .clone())
    }

    async fn upsert_credential_status(&self, record: &CredentialStatusRecord) -> Result<(), StoreError> {
        let mut mirror = self.mirror.write();
        let mut stored = record.clone();
        if let Some(existing) = mirror.get(&record.credential_id) {
            stored.issuer_id = existing.issuer_id.clone();
        }
        mirror.insert(record.credential_id.clone(), stored);
        Ok(())
    }

    async fn credential_status(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<CredentialStatusRecord>, StoreError> {
        Ok(self.mirror.read().get(credential_id).cloned())
    }
}
