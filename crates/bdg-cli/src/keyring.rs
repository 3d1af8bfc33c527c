//! # Keyring File
//!
//! A keyring is a JSON document holding the controller prefix and every
//! [`SigningKeyRecord`] ever generated into it, revoked keys included. It is
//! loaded into an [`InMemoryKeyRepository`] behind a [`KeyStore`], so the CLI
//! runs the same key lifecycle as the server, and written back after a
//! mutation.
//!
//! ## Security Invariant
//!
//! The file never holds plaintext private keys: `privateKeyMultibase` is
//! sealed with the key-encryption key and bound to its key id.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bdg_crypto::KeySealer;
use bdg_keys::{
    InMemoryKeyRepository, KeyStore, KeyStoreConfig, SigningKeyRecord, DEFAULT_CONTROLLER_PREFIX,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::CliContext;

/// Environment variable holding the hex key-encryption key.
pub const KEK_ENV: &str = "BADGE_KEY_ENCRYPTION_KEY";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyringFile {
    controller_prefix: String,
    #[serde(default)]
    keys: Vec<SigningKeyRecord>,
}

/// An open keyring.
pub struct Keyring {
    path: PathBuf,
    controller_prefix: String,
    repo: Arc<InMemoryKeyRepository>,
    store: Arc<KeyStore>,
}

impl Keyring {
    /// Load the keyring named by `ctx`, or start an empty one if the file
    /// does not exist yet.
    ///
    /// Without a key-encryption key the keyring opens with an ephemeral
    /// sealer: public operations work, signing does not.
    pub fn open(ctx: &CliContext) -> Result<Self> {
        let file = if ctx.keyring.exists() {
            let text = fs::read_to_string(&ctx.keyring)
                .with_context(|| format!("failed to read keyring {}", ctx.keyring.display()))?;
            let file: KeyringFile = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a keyring file", ctx.keyring.display()))?;
            if let Some(prefix) = &ctx.controller_prefix {
                if prefix != &file.controller_prefix {
                    bail!(
                        "keyring uses controller prefix {:?}, not {:?}",
                        file.controller_prefix,
                        prefix
                    );
                }
            }
            file
        } else {
            KeyringFile {
                controller_prefix: ctx
                    .controller_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTROLLER_PREFIX.to_string()),
                keys: Vec::new(),
            }
        };

        let sealer = match &ctx.kek {
            Some(hex) => KeySealer::from_hex(hex, ctx.provider.clone())
                .context("invalid key-encryption key")?,
            None => KeySealer::ephemeral(ctx.provider.clone()),
        };
        let repo = Arc::new(
            InMemoryKeyRepository::from_records(file.keys)
                .with_context(|| format!("keyring {} is inconsistent", ctx.keyring.display()))?,
        );
        let store = Arc::new(KeyStore::new(
            repo.clone(),
            Arc::new(sealer),
            ctx.provider.clone(),
            KeyStoreConfig {
                controller_prefix: file.controller_prefix.clone(),
            },
        ));
        tracing::debug!(path = %ctx.keyring.display(), keys = repo.snapshot().len(), "keyring loaded");

        Ok(Self {
            path: ctx.keyring.clone(),
            controller_prefix: file.controller_prefix,
            repo,
            store,
        })
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    /// Write the keyring back, replacing the file atomically.
    pub fn save(&self) -> Result<()> {
        let file = KeyringFile {
            controller_prefix: self.controller_prefix.clone(),
            keys: self.repo.snapshot(),
        };
        let text = serde_json::to_string_pretty(&file).context("failed to serialize keyring")?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace keyring {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "keyring saved");
        Ok(())
    }
}

/// Fail unless a key-encryption key was supplied.
pub fn require_kek(ctx: &CliContext) -> Result<()> {
    if ctx.kek.is_none() {
        bail!("this command needs the key-encryption key: set {KEK_ENV} or pass --kek-file");
    }
    Ok(())
}

/// Key-encryption key from `kek_file` if given, else from the environment.
pub fn load_kek(kek_file: Option<&Path>) -> Result<Option<Zeroizing<String>>> {
    let raw = match kek_file {
        Some(path) => Zeroizing::new(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read key-encryption key {}", path.display()))?,
        ),
        None => match std::env::var(KEK_ENV) {
            Ok(value) => Zeroizing::new(value),
            Err(_) => return Ok(None),
        },
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(Zeroizing::new(trimmed.to_string())))
}
