//! Status list persistence on `status_lists`, `status_list_indices` and
//! `credential_status`.
//!
//! List writes are `UPDATE ... WHERE status_list_id = $1 AND version = $2`;
//! zero affected rows means another writer won and the caller retries.

use async_trait::async_trait;
use bdg_core::{CredentialId, IssuerId, StatusListId, StoreError, Timestamp};
use bdg_status::{
    CredentialStatusRecord, StatusList, StatusListIndexMapping, StatusListRepository,
    StatusPurpose,
};
use bdg_vc::Credential;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ping, store_error};

const LIST_COLUMNS: &str = "SELECT status_list_id, issuer_id, purpose, capacity, encoded_list, \
     status_list_json, version, created_at, updated_at FROM status_lists";

const MAPPING_COLUMNS: &str = "SELECT credential_id, status_list_id, issuer_id, purpose, \
     status_index, created_at FROM status_list_indices";

/// [`StatusListRepository`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStatusListRepository {
    pool: PgPool,
}

impl PgStatusListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_i32(value: usize, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{what} {value} exceeds INTEGER")))
}

#[async_trait]
impl StatusListRepository for PgStatusListRepository {
    async fn find_list(
        &self,
        issuer_id: &IssuerId,
        purpose: StatusPurpose,
    ) -> Result<Option<StatusList>, StoreError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "{LIST_COLUMNS} WHERE issuer_id = $1 AND purpose = $2"
        ))
        .bind(issuer_id.as_str())
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(ListRow::into_record).transpose()
    }

    async fn get_list(&self, id: &StatusListId) -> Result<Option<StatusList>, StoreError> {
        let row = sqlx::query_as::<_, ListRow>(&format!("{LIST_COLUMNS} WHERE status_list_id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(ListRow::into_record).transpose()
    }

    async fn insert_list(&self, list: &StatusList) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO status_lists (status_list_id, issuer_id, purpose, capacity, encoded_list,
                 status_list_json, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*list.status_list_id.as_uuid())
        .bind(list.issuer_id.as_str())
        .bind(list.purpose.as_str())
        .bind(to_i32(list.capacity, "capacity")?)
        .bind(&list.encoded_list)
        .bind(list.credential.clone().into_value())
        .bind(list.version)
        .bind(*list.created_at.as_datetime())
        .bind(*list.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        list: &StatusList,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE status_lists
             SET encoded_list = $1, status_list_json = $2, version = $3, updated_at = $4
             WHERE status_list_id = $5 AND version = $6",
        )
        .bind(&list.encoded_list)
        .bind(list.credential.clone().into_value())
        .bind(list.version)
        .bind(*list.updated_at.as_datetime())
        .bind(*list.status_list_id.as_uuid())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn put_mapping(
        &self,
        mapping: &StatusListIndexMapping,
    ) -> Result<StatusListIndexMapping, StoreError> {
        sqlx::query(
            "INSERT INTO status_list_indices (mapping_id, credential_id, status_list_id, issuer_id,
                 purpose, status_index, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (credential_id, purpose) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(mapping.credential_id.as_str())
        .bind(*mapping.status_list_id.as_uuid())
        .bind(mapping.issuer_id.as_str())
        .bind(mapping.purpose.as_str())
        .bind(to_i32(mapping.status_index, "status index")?)
        .bind(*mapping.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let row = sqlx::query_as::<_, MappingRow>(&format!(
            "{MAPPING_COLUMNS} WHERE credential_id = $1 AND purpose = $2"
        ))
        .bind(mapping.credential_id.as_str())
        .bind(mapping.purpose.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        row.into_record()
    }

    async fn mappings_for(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<StatusListIndexMapping>, StoreError> {
        let rows = sqlx::query_as::<_, MappingRow>(&format!(
            "{MAPPING_COLUMNS} WHERE credential_id = $1 ORDER BY purpose"
        ))
        .bind(credential_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(MappingRow::into_record).collect()
    }

    async fn claim_credential(
        &self,
        record: &CredentialStatusRecord,
    ) -> Result<CredentialStatusRecord, StoreError> {
        sqlx::query(
            "INSERT INTO credential_status (credential_id, issuer_id, revoked, suspended, reason, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (credential_id) DO NOTHING",
        )
        .bind(record.credential_id.as_str())
        .bind(record.issuer_id.as_str())
        .bind(record.revoked)
        .bind(record.suspended)
        .bind(record.reason.as_deref())
        .bind(*record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        self.credential_status(&record.credential_id)
            .await?
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "credential status {} vanished after insert",
                    record.credential_id
                ))
            })
    }

    async fn upsert_credential_status(&self, record: &CredentialStatusRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO credential_status (credential_id, issuer_id, revoked, suspended, reason, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (credential_id) DO UPDATE SET
                 revoked = EXCLUDED.revoked,
                 suspended = EXCLUDED.suspended,
                 reason = EXCLUDED.reason,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(record.credential_id.as_str())
        .bind(record.issuer_id.as_str())
        .bind(record.revoked)
        .bind(record.suspended)
        .bind(record.reason.as_deref())
        .bind(*record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn credential_status(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<CredentialStatusRecord>, StoreError> {
        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT credential_id, issuer_id, revoked, suspended, reason, updated_at
             FROM credential_status WHERE credential_id = $1",
        )
        .bind(credential_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(StatusRow::into_record).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        ping(&self.pool).await
    }
}

// ─── Row types ──────────────────────────────────────────────────────────

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

#[derive(sqlx::FromRow)]
struct ListRow {
    status_list_id: Uuid,
    issuer_id: String,
    purpose: String,
    capacity: i32,
    encoded_list: String,
    status_list_json: serde_json::Value,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ListRow {
    fn into_record(self) -> Result<StatusList, StoreError> {
        let what = format!("status list {}", self.status_list_id);
        Ok(StatusList {
            status_list_id: StatusListId::from_uuid(self.status_list_id),
            issuer_id: IssuerId::new(self.issuer_id).map_err(|e| corrupt(&what, e))?,
            purpose: self.purpose.parse().map_err(|e| corrupt(&what, e))?,
            capacity: usize::try_from(self.capacity).map_err(|e| corrupt(&what, e))?,
            encoded_list: self.encoded_list,
            credential: Credential::from_value(self.status_list_json)
                .map_err(|e| corrupt(&what, e))?,
            version: self.version,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    credential_id: String,
    status_list_id: Uuid,
    issuer_id: String,
    purpose: String,
    status_index: i32,
    created_at: DateTime<Utc>,
}

impl MappingRow {
    fn into_record(self) -> Result<StatusListIndexMapping, StoreError> {
        let what = format!("status mapping for {}", self.credential_id);
        Ok(StatusListIndexMapping {
            status_list_id: StatusListId::from_uuid(self.status_list_id),
            issuer_id: IssuerId::new(self.issuer_id).map_err(|e| corrupt(&what, e))?,
            purpose: self.purpose.parse().map_err(|e| corrupt(&what, e))?,
            status_index: usize::try_from(self.status_index).map_err(|e| corrupt(&what, e))?,
            created_at: Timestamp::from_utc(self.created_at),
            credential_id: CredentialId::new(self.credential_id).map_err(|e| corrupt(&what, e))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    credential_id: String,
    issuer_id: String,
    revoked: bool,
    suspended: bool,
    reason: Option<String>,
    updated_at: DateTime<Utc>,
}

impl StatusRow {
    fn into_record(self) -> Result<CredentialStatusRecord, StoreError> {
        let what = format!("credential status {}", self.credential_id);
        Ok(CredentialStatusRecord {
            issuer_id: IssuerId::new(self.issuer_id).map_err(|e| corrupt(&what, e))?,
            revoked: self.revoked,
            suspended: self.suspended,
            reason: self.reason,
            updated_at: Timestamp::from_utc(self.updated_at),
            credential_id: CredentialId::new(self.credential_id).map_err(|e| corrupt(&what, e))?,
        })
    }
}
