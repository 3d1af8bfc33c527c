//! Signing key persistence on the `signing_keys` table.
//!
//! Activation (demote the current key, insert the new one) runs in one
//! transaction. The partial unique index on `issuer_id WHERE NOT revoked`
//! rejects a second concurrent activation for the same issuer, which
//! surfaces as `StoreError::Duplicate`.

use async_trait::async_trait;
use bdg_core::{IssuerId, KeyId, StoreError, Timestamp};
use bdg_crypto::KeyAlgorithm;
use bdg_keys::{KeyRepository, SigningKeyRecord};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ping, store_error};

const SELECT_COLUMNS: &str = "SELECT key_id, issuer_id, type AS algorithm, public_key_multibase, \
     private_key_multibase, controller, revoked, revoked_at, created_at FROM signing_keys";

/// [`KeyRepository`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgKeyRepository {
    pool: PgPool,
}

impl PgKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyRepository for PgKeyRepository {
    async fn activate(
        &self,
        record: SigningKeyRecord,
        demoted_at: Timestamp,
    ) -> Result<Option<KeyId>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let demoted: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE signing_keys SET revoked = TRUE, revoked_at = $2
             WHERE issuer_id = $1 AND NOT revoked
             RETURNING key_id",
        )
        .bind(record.issuer_id.as_str())
        .bind(*demoted_at.as_datetime())
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "INSERT INTO signing_keys (key_id, issuer_id, type, public_key_multibase,
                 private_key_multibase, controller, revoked, revoked_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*record.key_id.as_uuid())
        .bind(record.issuer_id.as_str())
        .bind(record.algorithm.as_str())
        .bind(&record.public_key_multibase)
        .bind(&record.private_key_multibase)
        .bind(&record.controller)
        .bind(record.revoked)
        .bind(record.revoked_at.map(|t| *t.as_datetime()))
        .bind(*record.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        Ok(demoted.last().map(|(id,)| KeyId::from_uuid(*id)))
    }

    async fn get(&self, key_id: &KeyId) -> Result<Option<SigningKeyRecord>, StoreError> {
        let row = sqlx::query_as::<_, KeyRow>(&format!("{SELECT_COLUMNS} WHERE key_id = $1"))
            .bind(*key_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(KeyRow::into_record).transpose()
    }

    async fn active_for(&self, issuer_id: &IssuerId) -> Result<Option<SigningKeyRecord>, StoreError> {
        let row = sqlx::query_as::<_, KeyRow>(&format!(
            "{SELECT_COLUMNS} WHERE issuer_id = $1 AND NOT revoked"
        ))
        .bind(issuer_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(KeyRow::into_record).transpose()
    }

    async fn list_for(&self, issuer_id: &IssuerId) -> Result<Vec<SigningKeyRecord>, StoreError> {
        let rows = sqlx::query_as::<_, KeyRow>(&format!(
            "{SELECT_COLUMNS} WHERE issuer_id = $1 ORDER BY created_at, key_id"
        ))
        .bind(issuer_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(KeyRow::into_record).collect()
    }

    async fn revoke(
        &self,
        key_id: &KeyId,
        at: Timestamp,
    ) -> Result<Option<SigningKeyRecord>, StoreError> {
        // COALESCE keeps the first revocation time.
        let row = sqlx::query_as::<_, KeyRow>(
            "UPDATE signing_keys SET revoked = TRUE, revoked_at = COALESCE(revoked_at, $2)
             WHERE key_id = $1
             RETURNING key_id, issuer_id, type AS algorithm, public_key_multibase,
                 private_key_multibase, controller, revoked, revoked_at, created_at",
        )
        .bind(*key_id.as_uuid())
        .bind(*at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(KeyRow::into_record).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        ping(&self.pool).await
    }
}

#[derive(sqlx::FromRow)]
struct KeyRow {
    key_id: Uuid,
    issuer_id: String,
    algorithm: String,
    public_key_multibase: String,
    private_key_multibase: String,
    controller: String,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl KeyRow {
    fn into_record(self) -> Result<SigningKeyRecord, StoreError> {
        let algorithm: KeyAlgorithm = self.algorithm.parse().map_err(|_| {
            StoreError::Corrupt(format!(
                "signing key {} has unknown algorithm {:?}",
                self.key_id, self.algorithm
            ))
        })?;
        let issuer_id = IssuerId::new(self.issuer_id)
            .map_err(|e| StoreError::Corrupt(format!("signing key {}: {e}", self.key_id)))?;
        Ok(SigningKeyRecord {
            key_id: KeyId::from_uuid(self.key_id),
            issuer_id,
            algorithm,
            public_key_multibase: self.public_key_multibase,
            private_key_multibase: self.private_key_multibase,
            controller: self.controller,
            revoked: self.revoked,
            revoked_at: self.revoked_at.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
