//! # Credential Documents
//!
//! [`Credential`] wraps a JSON object. The claim payload is open-ended
//! (achievements, results, evidence, ...), so the envelope is not mapped to a
//! fixed struct: the signer must return every field it was given untouched,
//! and the verifier must cover every field it receives.
//!
//! ## Security Invariants
//!
//! - [`Credential::signing_input()`] removes `proof` and canonicalizes the
//!   remainder through [`CanonicalBytes::from_value()`]. Signer and verifier
//!   both call it, so mutating any leaf of the document changes the bytes.
//! - Out-of-band status (revoked flag, reason) is never written into the
//!   document.

use bdg_core::{CanonicalBytes, CredentialId, IssuerId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VcError;
use crate::proof::Proof;

/// The `@context` every credential issued here starts with.
pub const VC_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";

/// A (possibly signed) verifiable credential document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(Map<String, Value>);

impl Credential {
    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, VcError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(VcError::InvalidDocument(format!(
                "credential must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Wrap a JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Access the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwrap into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Read a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a top-level field. Doing this on a signed credential invalidates
    /// its proof.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Mutable access to a nested value by JSON pointer (RFC 6901, with
    /// `~1` and `~0` escapes).
    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        let path = pointer.strip_prefix('/')?;
        let (first, rest) = match path.split_once('/') {
            Some((first, rest)) => (first, format!("/{rest}")),
            None => (path, String::new()),
        };
        let head = self.0.get_mut(&first.replace("~1", "/").replace("~0", "~"))?;
        if rest.is_empty() {
            Some(head)
        } else {
            head.pointer_mut(&rest)
        }
    }

    /// The credential `id`, if present and a non-empty string.
    pub fn id(&self) -> Option<CredentialId> {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| CredentialId::new(s).ok())
    }

    /// The issuer id. `issuer` may be a string or an object with an `id`.
    pub fn issuer(&self) -> Option<IssuerId> {
        let issuer = self.0.get("issuer")?;
        let s = match issuer {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => obj.get("id")?.as_str()?,
            _ => return None,
        };
        IssuerId::new(s).ok()
    }

    /// Whether a `proof` member is present at all.
    pub fn has_proof(&self) -> bool {
        self.0.contains_key("proof")
    }

    /// Parse the attached proof.
    ///
    /// Returns `Ok(None)` when there is no proof. A proof array is rejected:
    /// exactly one proof is carried per credential.
    pub fn proof(&self) -> Result<Option<Proof>, VcError> {
        match self.0.get("proof") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(_)) => Err(VcError::InvalidProof(
                "multiple proofs are not supported".into(),
            )),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| VcError::InvalidProof(e.to_string())),
        }
    }

    /// Copy of this credential with any proof removed.
    pub fn without_proof(&self) -> Self {
        let mut map = self.0.clone();
        map.remove("proof");
        Self(map)
    }

    /// Copy of this credential with `proof` set.
    pub fn with_proof(&self, proof: &Proof) -> Result<Self, VcError> {
        let mut map = self.0.clone();
        map.insert("proof".into(), serde_json::to_value(proof)?);
        Ok(Self(map))
    }

    /// The bytes a proof on this credential is computed over: the document
    /// without `proof`, canonicalized.
    pub fn signing_input(&self) -> Result<CanonicalBytes, VcError> {
        let body = self.without_proof();
        Ok(CanonicalBytes::from_value(body.into_value())?)
    }

    /// End of the validity period: `expirationDate` (VC 1.1) or
    /// `validUntil` (VC 2.0).
    pub fn expires_at(&self) -> Result<Option<Timestamp>, VcError> {
        self.date_field(&["expirationDate", "validUntil"])
    }

    /// Start of the validity period: `validFrom` (VC 2.0) or
    /// `issuanceDate` (VC 1.1).
    pub fn valid_from(&self) -> Result<Option<Timestamp>, VcError> {
        self.date_field(&["validFrom", "issuanceDate"])
    }

    fn date_field(&self, names: &[&str]) -> Result<Option<Timestamp>, VcError> {
        for name in names {
            if let Some(value) = self.0.get(*name) {
                let s = value.as_str().ok_or_else(|| {
                    VcError::InvalidDocument(format!("{name} must be a string"))
                })?;
                return Timestamp::parse_lenient(s)
                    .map(Some)
                    .map_err(|e| VcError::InvalidDocument(format!("{name}: {e}")));
            }
        }
        Ok(None)
    }
}

impl TryFrom<Value> for Credential {
    type Error = VcError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
