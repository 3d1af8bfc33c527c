//! # Sign and Verify Subcommands
//!
//! Offline issuance and verification with keyring keys. Nothing here touches
//! a status list: `bdg sign` embeds no `credentialStatus` and `bdg verify`
//! checks proof, key binding and validity window only.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use bdg_core::{IssuerId, KeyId};
use bdg_vc::{
    credential_from_jwt, Credential, CredentialSigner, CredentialVerifier, Proof, ProofFormat,
    ProofKind, SignOptions,
};
use clap::{Args, ValueEnum};

use crate::keyring::{require_kek, Keyring};
use crate::keys::print_json;
use crate::{read_input, CliContext};

/// Proof encoding.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// `DataIntegrityProof` (Ed25519 and ES256 only).
    Ld,
    /// `JwtProof2020`.
    Jwt,
}

/// Arguments for `bdg sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Issuer whose key signs.
    #[arg(long)]
    pub issuer: String,
    #[arg(long, value_enum, default_value_t = Format::Ld)]
    pub format: Format,
    /// Sign with this key instead of the active one.
    #[arg(long)]
    pub key_id: Option<String>,
    /// Print only the compact JWS (with `--format jwt`).
    #[arg(long)]
    pub compact: bool,
    /// Unsigned credential JSON, or `-` for standard input.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for `bdg verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Require this proof encoding.
    #[arg(long, value_enum)]
    pub format: Option<Format>,
    /// Signed credential JSON or a bare JWT, or `-` for standard input.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Execute `bdg sign`.
pub async fn run_sign(args: &SignArgs, ctx: &CliContext, out: &mut dyn Write) -> Result<u8> {
    require_kek(ctx)?;
    let issuer_id = IssuerId::new(args.issuer.as_str())?;
    let document = Credential::from_value(serde_json::from_str(&read_input(&args.file)?)?)?;

    let keyring = Keyring::open(ctx)?;
    let store = keyring.store();
    match document.issuer() {
        Some(issuer) if issuer == issuer_id || issuer.as_str() == store.controller_for(&issuer_id) => {}
        Some(issuer) => bail!("credential issuer {issuer} does not match --issuer {issuer_id}"),
        None => bail!("credential has no issuer"),
    }

    let key = match &args.key_id {
        Some(raw) => {
            let key_id: KeyId = raw.parse()?;
            let key = store.unlock(&key_id).await?;
            if key.issuer_id != issuer_id {
                bail!("key {key_id} belongs to issuer {}", key.issuer_id);
            }
            key
        }
        None => store.active_signing_key(&issuer_id).await?,
    };

    let format = match args.format {
        Format::Ld => ProofFormat::DataIntegrity,
        Format::Jwt => ProofFormat::Jwt,
    };
    let signer = CredentialSigner::new(ctx.provider.clone());
    let signed = signer.sign(
        &document,
        &key.key_pair,
        &SignOptions::new(key.verification_method.clone(), format),
    )?;
    tracing::info!(key_id = %key.key_id, "credential signed");

    match signed.proof()? {
        Some(Proof::Jwt(proof)) if args.compact => writeln!(out, "{}", proof.jwt)?,
        _ => print_json(out, &signed.into_value())?,
    }
    Ok(0)
}

/// Execute `bdg verify`. Exit code 0 when verified, 1 otherwise.
pub async fn run_verify(args: &VerifyArgs, ctx: &CliContext, out: &mut dyn Write) -> Result<u8> {
    let input = read_input(&args.file)?;
    let input = input.trim();
    let credential = if input.starts_with('{') {
        Credential::from_value(serde_json::from_str(input)?)?
    } else {
        credential_from_jwt(input)?
    };

    let keyring = Keyring::open(ctx)?;
    let verifier = CredentialVerifier::new(keyring.store().clone(), ctx.provider.clone());
    let result = match args.format {
        Some(Format::Ld) => verifier.verify_expecting(&credential, ProofKind::DataIntegrity).await,
        Some(Format::Jwt) => verifier.verify_expecting(&credential, ProofKind::Jwt).await,
        None => verifier.verify(&credential).await,
    };
    print_json(out, &result)?;
    Ok(if result.verified { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::tests::{context, TEST_KEK};
    use crate::keys::{run_keys, KeysArgs, KeysCommand};
    use serde_json::{json, Value};
    use std::path::Path;

    async fn setup(dir: &Path, algorithm: &str) -> CliContext {
        let ctx = context(dir, Some(TEST_KEK));
        let mut sink: Vec<u8> = Vec::new();
        run_keys(
            &KeysArgs {
                command: KeysCommand::Generate {
                    issuer: "acme".into(),
                    algorithm: algorithm.into(),
                },
            },
            &ctx,
            &mut sink,
        )
        .await
        .unwrap();
        ctx
    }

    fn write_badge(dir: &Path, issuer: &str) -> PathBuf {
        let path = dir.join("badge.json");
        let badge = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": "urn:uuid:cli-1",
            "type": ["VerifiableCredential", "OpenBadgeCredential"],
            "issuer": issuer,
            "issuanceDate": "2024-01-01T00:00:00Z",
            "credentialSubject": {"id": "did:example:learner"}
        });
        std::fs::write(&path, badge.to_string()).unwrap();
        path
    }

    async fn sign(ctx: &CliContext, file: PathBuf, format: Format, compact: bool) -> String {
        let mut out: Vec<u8> = Vec::new();
        let args = SignArgs {
            issuer: "acme".into(),
            format,
            key_id: None,
            compact,
            file,
        };
        run_sign(&args, ctx, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    async fn verify(ctx: &CliContext, file: PathBuf, format: Option<Format>) -> (u8, Value) {
        let mut out: Vec<u8> = Vec::new();
        let code = run_verify(&VerifyArgs { format, file }, ctx, &mut out)
            .await
            .unwrap();
        (code, serde_json::from_slice(&out).unwrap())
    }

    #[tokio::test]
    async fn sign_then_verify_ld() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), "Ed25519").await;
        let badge = write_badge(dir.path(), "acme");

        let signed = sign(&ctx, badge, Format::Ld, false).await;
        let signed_path = dir.path().join("signed.json");
        std::fs::write(&signed_path, &signed).unwrap();

        let (code, result) = verify(&ctx, signed_path.clone(), None).await;
        assert_eq!(code, 0, "{result}");
        assert_eq!(result["verified"], true);
        assert_eq!(result["status"], "notChecked");

        let (code, _) = verify(&ctx, signed_path, Some(Format::Jwt)).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn compact_jwt_verifies_as_bare_token() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), "ES256").await;
        let badge = write_badge(dir.path(), "did:web:localhost:issuers:acme");

        let jwt = sign(&ctx, badge, Format::Jwt, true).await;
        assert_eq!(jwt.trim().split('.').count(), 3);
        let jwt_path = dir.path().join("badge.jwt");
        std::fs::write(&jwt_path, &jwt).unwrap();

        let (code, result) = verify(&ctx, jwt_path, Some(Format::Jwt)).await;
        assert_eq!(code, 0, "{result}");
    }

    #[tokio::test]
    async fn issuer_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), "Ed25519").await;
        let badge = write_badge(dir.path(), "globex");
        let args = SignArgs {
            issuer: "acme".into(),
            format: Format::Ld,
            key_id: None,
            compact: false,
            file: badge,
        };
        let err = run_sign(&args, &ctx, &mut Vec::<u8>::new()).await.unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[tokio::test]
    async fn tampered_credential_exit_code_1() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), "Ed25519").await;
        let badge = write_badge(dir.path(), "acme");
        let signed = sign(&ctx, badge, Format::Ld, false).await;

        let mut value: Value = serde_json::from_str(&signed).unwrap();
        value["credentialSubject"]["id"] = json!("did:example:someone-else");
        let path = dir.path().join("tampered.json");
        std::fs::write(&path, value.to_string()).unwrap();

        let (code, result) = verify(&ctx, path, None).await;
        assert_eq!(code, 1);
        assert_eq!(result["verified"], false);
    }
}
