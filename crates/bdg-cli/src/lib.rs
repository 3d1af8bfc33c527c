//! # bdg-cli: Operator Tooling for the Badge Trust Core
//!
//! Provides the `bdg` command-line interface.
//!
//! ## Subcommands
//!
//! - `bdg keys generate|rotate|revoke|list|kek`: issuer keys in a keyring file.
//! - `bdg sign`: sign a credential offline with a keyring key.
//! - `bdg verify`: verify a credential (or bare JWT) against the keyring.
//! - `bdg status index|decode`: bit index derivation and list inspection.
//!
//! The keyring is a JSON file of [`bdg_keys::SigningKeyRecord`]s. Private
//! keys in it are sealed with the key-encryption key from
//! `BADGE_KEY_ENCRYPTION_KEY` or `--kek-file`, the same key the API server
//! uses, so a keyring can seed a server's key table.

pub mod credential;
pub mod keyring;
pub mod keys;
pub mod status;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bdg_crypto::CryptoProvider;
use zeroize::Zeroizing;

/// Options shared by every subcommand.
pub struct CliContext {
    /// Keyring file.
    pub keyring: PathBuf,
    /// Hex key-encryption key, when one was supplied.
    pub kek: Option<Zeroizing<String>>,
    /// Controller prefix for a keyring created by this invocation.
    pub controller_prefix: Option<String>,
    pub provider: Arc<dyn CryptoProvider>,
}

impl std::fmt::Debug for CliContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliContext")
            .field("keyring", &self.keyring)
            .field("kek", &self.kek.as_ref().map(|_| "<redacted>"))
            .field("controller_prefix", &self.controller_prefix)
            .finish_non_exhaustive()
    }
}

/// Read a file, or standard input for `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read standard input")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
