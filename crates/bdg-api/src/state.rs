//! # Application State
//!
//! [`AppState`] wires the service together: one [`KeyStore`], one
//! [`StatusListManager`], the signer and the verifier, all sharing one
//! [`CryptoProvider`]. Repositories are Postgres-backed when a pool is
//! given and in-memory otherwise.

use std::sync::Arc;

use axum::extract::FromRef;
use bdg_crypto::{CryptoError, CryptoProvider, KeySealer, OsCryptoProvider};
use bdg_keys::{InMemoryKeyRepository, KeyRepository, KeyStore};
use bdg_status::{InMemoryStatusListRepository, StatusListManager, StatusListRepository};
use bdg_vc::{CredentialSigner, CredentialVerifier};
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::db::{PgKeyRepository, PgStatusListRepository};
use crate::middleware::metrics::ApiMetrics;

/// Failure while assembling the service.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("invalid key-encryption key: {0}")]
    KeyEncryptionKey(#[from] CryptoError),

    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Sealed keys written to the database would not open after a restart.
    #[error("BADGE_KEY_ENCRYPTION_KEY must be set when DATABASE_URL is set")]
    EphemeralKeyWithDatabase,
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub auth: AuthConfig,
    pub keys: Arc<KeyStore>,
    pub status: Arc<StatusListManager>,
    pub signer: CredentialSigner,
    pub verifier: CredentialVerifier,
    pub metrics: ApiMetrics,
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Production state using the OS random source.
    pub fn new(config: ApiConfig, db_pool: Option<PgPool>) -> Result<Self, StateError> {
        Self::with_provider(config, db_pool, Arc::new(OsCryptoProvider))
    }

    /// State with an injected crypto provider.
    pub fn with_provider(
        config: ApiConfig,
        db_pool: Option<PgPool>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Result<Self, StateError> {
        let metrics = ApiMetrics::try_new()?;

        let sealer = match &config.key_encryption_key {
            Some(hex) => KeySealer::from_hex(hex.expose(), provider.clone())?,
            None if db_pool.is_some() => return Err(StateError::EphemeralKeyWithDatabase),
            None => {
                tracing::warn!(
                    "BADGE_KEY_ENCRYPTION_KEY not set; sealing private keys with an ephemeral key. \
                     Generated keys are unusable after restart."
                );
                metrics.key_encryption_ephemeral().set(1.0);
                KeySealer::ephemeral(provider.clone())
            }
        };

        if config.auth_token.is_none() {
            tracing::warn!(
                "BADGE_AUTH_TOKEN not set; issuer-authenticated routes accept every caller"
            );
        }

        let (key_repo, status_repo): (Arc<dyn KeyRepository>, Arc<dyn StatusListRepository>) =
            match &db_pool {
                Some(pool) => (
                    Arc::new(PgKeyRepository::new(pool.clone())),
                    Arc::new(PgStatusListRepository::new(pool.clone())),
                ),
                None => (
                    Arc::new(InMemoryKeyRepository::new()),
                    Arc::new(InMemoryStatusListRepository::new()),
                ),
            };

        let keys = Arc::new(KeyStore::new(
            key_repo,
            Arc::new(sealer),
            provider.clone(),
            config.key_store_config(),
        ));
        let signer = CredentialSigner::new(provider.clone());
        let status = Arc::new(StatusListManager::new(
            status_repo,
            keys.clone(),
            signer.clone(),
            config.status_list_config(),
        ));
        let verifier =
            CredentialVerifier::new(keys.clone(), provider).with_status_check(status.clone());

        Ok(Self {
            auth: AuthConfig {
                token: config.auth_token.clone(),
            },
            config: Arc::new(config),
            keys,
            status,
            signer,
            verifier,
            metrics,
            db_pool,
        })
    }

    /// Whether the backing stores answer.
    pub async fn is_ready(&self) -> bool {
        let keys = self.keys.repository().health_check().await;
        let status = self.status.repository().health_check().await;
        match (keys, status) {
            (Ok(()), Ok(())) => true,
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "readiness check failed");
                false
            }
        }
    }
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("persistent", &self.db_pool.is_some())
            .finish_non_exhaustive()
    }
}
