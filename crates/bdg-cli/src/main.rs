//! # bdg CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bdg_cli::credential::{run_sign, run_verify, SignArgs, VerifyArgs};
use bdg_cli::keyring::load_kek;
use bdg_cli::keys::{run_keys, KeysArgs};
use bdg_cli::status::{run_status, StatusArgs};
use bdg_cli::CliContext;
use bdg_crypto::OsCryptoProvider;

/// Badge trust core CLI.
///
/// Manages issuer keys in a keyring file, signs and verifies credentials
/// offline, and inspects StatusList2021 lists.
#[derive(Parser, Debug)]
#[command(name = "bdg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Keyring file.
    #[arg(long, global = true, default_value = "keyring.json")]
    keyring: PathBuf,

    /// File holding the hex key-encryption key. Defaults to
    /// BADGE_KEY_ENCRYPTION_KEY.
    #[arg(long, global = true)]
    kek_file: Option<PathBuf>,

    /// Controller DID prefix for a new keyring.
    #[arg(long, global = true)]
    controller_prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issuer key generation, rotation, revocation and listing.
    Keys(KeysArgs),

    /// Sign a credential with a keyring key.
    Sign(SignArgs),

    /// Verify a signed credential or bare JWT against the keyring.
    Verify(VerifyArgs),

    /// Status list index derivation and decoding.
    Status(StatusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let Cli {
        keyring,
        kek_file,
        controller_prefix,
        command,
        ..
    } = cli;
    let result = runtime.block_on(async move {
        let ctx = CliContext {
            keyring,
            kek: load_kek(kek_file.as_deref())?,
            controller_prefix,
            provider: Arc::new(OsCryptoProvider),
        };
        let mut stdout = std::io::stdout().lock();
        match command {
            Commands::Keys(args) => run_keys(&args, &ctx, &mut stdout).await,
            Commands::Sign(args) => run_sign(&args, &ctx, &mut stdout).await,
            Commands::Verify(args) => run_verify(&args, &ctx, &mut stdout).await,
            Commands::Status(args) => run_status(&args, &mut stdout),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
