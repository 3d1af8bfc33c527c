//! # Status Subcommand
//!
//! `bdg status index` derives a credential's bit index; `bdg status decode`
//! inspects a published StatusList2021 credential (or a bare `encodedList`).

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bdg_status::{index_for_credential, BitVector, DEFAULT_CAPACITY};
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use crate::keys::print_json;
use crate::read_input;

/// Largest list `decode` will inflate, in bits.
pub const MAX_DECODE_BITS: usize = 1 << 24;

/// Arguments for the `bdg status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(subcommand)]
    pub command: StatusCommand,
}

/// Status subcommands.
#[derive(Subcommand, Debug)]
pub enum StatusCommand {
    /// Print the bit index of a credential id.
    Index {
        #[arg(value_name = "CREDENTIAL_ID")]
        credential_id: String,
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,
    },

    /// Decode a status list credential and print its set bits.
    Decode {
        /// List credential JSON or bare `encodedList`, or `-` for stdin.
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only report this bit.
        #[arg(long)]
        index: Option<usize>,
    },
}

/// Execute the status subcommand.
pub fn run_status(args: &StatusArgs, out: &mut dyn Write) -> Result<u8> {
    match &args.command {
        StatusCommand::Index {
            credential_id,
            capacity,
        } => {
            if *capacity == 0 {
                bail!("capacity must be positive");
            }
            let index = index_for_credential(credential_id, *capacity);
            print_json(
                out,
                &json!({
                    "credentialId": credential_id,
                    "capacity": capacity,
                    "statusListIndex": index,
                }),
            )?;
        }
        StatusCommand::Decode { file, index } => {
            let input = read_input(file)?;
            let (encoded, purpose) = encoded_list(input.trim())?;
            let bits = BitVector::decode_unsized(&encoded, MAX_DECODE_BITS)
                .context("encodedList does not decode")?;
            let report = match index {
                Some(i) if *i >= bits.capacity() => {
                    bail!("index {i} is outside a list of {} bits", bits.capacity())
                }
                Some(i) => json!({"index": i, "set": bits.get(*i)}),
                None => json!({
                    "statusPurpose": purpose,
                    "capacity": bits.capacity(),
                    "setCount": bits.count_ones(),
                    "set": bits.ones().collect::<Vec<_>>(),
                }),
            };
            print_json(out, &report)?;
        }
    }
    Ok(0)
}

/// The `encodedList` and purpose of a list credential, or the input itself
/// when it is not JSON.
fn encoded_list(input: &str) -> Result<(String, Option<String>)> {
    if !input.starts_with('{') {
        return Ok((input.to_string(), None));
    }
    let value: Value = serde_json::from_str(input).context("invalid JSON")?;
    let subject = &value["credentialSubject"];
    let Some(encoded) = subject["encodedList"].as_str() else {
        bail!("credentialSubject.encodedList missing");
    };
    let purpose = subject["statusPurpose"].as_str().map(str::to_string);
    Ok((encoded.to_string(), purpose))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(command: StatusCommand) -> Result<Value> {
        let mut out: Vec<u8> = Vec::new();
        run_status(&StatusArgs { command }, &mut out)?;
        Ok(serde_json::from_slice(&out)?)
    }

    #[test]
    fn index_matches_library() {
        let report = run(StatusCommand::Index {
            credential_id: "urn:uuid:abc".into(),
            capacity: DEFAULT_CAPACITY,
        })
        .unwrap();
        assert_eq!(report["statusListIndex"], 7156);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(run(StatusCommand::Index {
            credential_id: "x".into(),
            capacity: 0,
        })
        .is_err());
    }

    #[test]
    fn decode_list_credential() {
        let mut bits = BitVector::new(DEFAULT_CAPACITY);
        bits.set(3);
        bits.set(7156);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        let credential = json!({
            "type": ["VerifiableCredential", "StatusList2021Credential"],
            "credentialSubject": {
                "type": "StatusList2021",
                "statusPurpose": "revocation",
                "encodedList": bits.encode().unwrap(),
            }
        });
        std::fs::write(&path, credential.to_string()).unwrap();

        let report = run(StatusCommand::Decode {
            file: path.clone(),
            index: None,
        })
        .unwrap();
        assert_eq!(report["statusPurpose"], "revocation");
        assert_eq!(report["capacity"], DEFAULT_CAPACITY);
        assert_eq!(report["set"], json!([3, 7156]));

        let report = run(StatusCommand::Decode {
            file: path.clone(),
            index: Some(4),
        })
        .unwrap();
        assert_eq!(report["set"], false);

        assert!(run(StatusCommand::Decode {
            file: path,
            index: Some(DEFAULT_CAPACITY),
        })
        .is_err());
    }

    #[test]
    fn decode_bare_encoded_list() {
        let mut bits = BitVector::new(64);
        bits.set(10);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, format!("{}\n", bits.encode().unwrap())).unwrap();

        let report = run(StatusCommand::Decode { file: path, index: None }).unwrap();
        assert_eq!(report["set"], json!([10]));
        assert_eq!(report["statusPurpose"], Value::Null);
    }

    #[test]
    fn missing_encoded_list_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"credentialSubject":{}}"#).unwrap();
        assert!(run(StatusCommand::Decode { file: path, index: None }).is_err());
    }
}
