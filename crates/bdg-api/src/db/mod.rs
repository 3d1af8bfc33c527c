//! # Database Persistence Layer
//!
//! Postgres implementations of the key and status-list repositories via
//! SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set, keys, status
//! lists, index mappings and the mirrored credential status are persisted to
//! PostgreSQL. When absent, the service runs on the in-memory repositories
//! and state does not survive a restart.

pub mod keys;
pub mod status_lists;

use bdg_core::StoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Secret;

pub use keys::PgKeyRepository;
pub use status_lists::PgStatusListRepository;

/// Connect and run migrations.
///
/// Returns `None` when no URL is configured (in-memory mode).
pub async fn init_pool(database_url: Option<&Secret>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set; running in in-memory mode. \
             Keys and status lists will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url.expose())
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Classify a SQLx error. Unique-constraint violations become
/// `StoreError::Duplicate`.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(db_err.message().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

/// `SELECT 1` against the pool.
pub(crate) async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(store_error)
}
