//! # Keys Subcommand
//!
//! Issuer key lifecycle against the keyring file. Output is the public
//! verification-method document(s) as JSON.

use std::io::Write;

use anyhow::{Context, Result};
use bdg_core::{IssuerId, KeyId};
use bdg_crypto::KeyAlgorithm;
use clap::{Args, Subcommand};

use crate::keyring::{require_kek, Keyring};
use crate::CliContext;

/// Arguments for the `bdg keys` subcommand.
#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommand,
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Generate a key and make it the issuer's active key.
    Generate {
        #[arg(long)]
        issuer: String,
        /// Ed25519, RS256 or ES256.
        #[arg(long, default_value = "Ed25519")]
        algorithm: String,
    },

    /// Replace the issuer's active key. The algorithm defaults to the
    /// previous key's.
    Rotate {
        #[arg(long)]
        issuer: String,
        #[arg(long)]
        algorithm: Option<String>,
    },

    /// Retire a key without generating a replacement.
    Revoke {
        #[arg(value_name = "KEY_ID")]
        key_id: String,
    },

    /// List an issuer's keys, oldest first.
    List {
        #[arg(long)]
        issuer: String,
    },

    /// Print a fresh random key-encryption key (64 hex chars).
    Kek,
}

/// Execute the keys subcommand.
pub async fn run_keys(args: &KeysArgs, ctx: &CliContext, out: &mut dyn Write) -> Result<u8> {
    match &args.command {
        KeysCommand::Generate { issuer, algorithm } => {
            require_kek(ctx)?;
            let issuer = IssuerId::new(issuer.as_str())?;
            let algorithm: KeyAlgorithm = algorithm.parse()?;
            let keyring = Keyring::open(ctx)?;
            let record = keyring.store().generate_key(&issuer, algorithm).await?;
            keyring.save()?;
            print_json(out, &record.to_verification_method())?;
        }
        KeysCommand::Rotate { issuer, algorithm } => {
            require_kek(ctx)?;
            let issuer = IssuerId::new(issuer.as_str())?;
            let algorithm = algorithm
                .as_deref()
                .map(str::parse::<KeyAlgorithm>)
                .transpose()?;
            let keyring = Keyring::open(ctx)?;
            let record = keyring.store().rotate_key(&issuer, algorithm).await?;
            keyring.save()?;
            print_json(out, &record.to_verification_method())?;
        }
        KeysCommand::Revoke { key_id } => {
            let key_id: KeyId = key_id.parse()?;
            let keyring = Keyring::open(ctx)?;
            let record = keyring.store().revoke_key(&key_id).await?;
            keyring.save()?;
            print_json(out, &record.to_verification_method())?;
        }
        KeysCommand::List { issuer } => {
            let issuer = IssuerId::new(issuer.as_str())?;
            let keyring = Keyring::open(ctx)?;
            let keys = keyring.store().list_keys(&issuer).await?;
            print_json(out, &keys)?;
        }
        KeysCommand::Kek => {
            let mut key = zeroize::Zeroizing::new([0u8; 32]);
            ctx.provider.fill_random(&mut key[..]);
            let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "{hex}")?;
        }
    }
    Ok(0)
}

pub(crate) fn print_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    writeln!(out, "{text}")?;
    Ok(())
}
