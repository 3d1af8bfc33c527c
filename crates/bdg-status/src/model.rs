//! Status list records and the JSON shapes published to relying parties.

use std::fmt;
use std::str::FromStr;

use bdg_core::{CredentialId, IssuerId, StatusListId, Timestamp};
use bdg_vc::Credential;
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// `@context` entry for StatusList2021 credentials.
pub const STATUS_LIST_CONTEXT: &str = "https://w3id.org/vc/status-list/2021/v1";
/// Credential type of a published list.
pub const STATUS_LIST_CREDENTIAL_TYPE: &str = "StatusList2021Credential";
/// `credentialSubject.type` of a published list.
pub const STATUS_LIST_SUBJECT_TYPE: &str = "StatusList2021";
/// `credentialStatus.type` embedded in issued credentials.
pub const STATUS_LIST_ENTRY_TYPE: &str = "StatusList2021Entry";

/// What a set bit means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPurpose {
    /// Permanent.
    Revocation,
    /// Reversible hold.
    Suspension,
}

impl StatusPurpose {
    pub const ALL: [StatusPurpose; 2] = [StatusPurpose::Revocation, StatusPurpose::Suspension];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revocation => "revocation",
            Self::Suspension => "suspension",
        }
    }
}

impl fmt::Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusPurpose {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revocation" => Ok(Self::Revocation),
            "suspension" => Ok(Self::Suspension),
            other => Err(StatusError::Validation(format!(
                "unknown status purpose {other:?}; expected revocation or suspension"
            ))),
        }
    }
}

/// A persisted status list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusList {
    pub status_list_id: StatusListId,
    pub issuer_id: IssuerId,
    pub purpose: StatusPurpose,
    /// Fixed at creation.
    pub capacity: usize,
    /// Current `encodedList`.
    pub encoded_list: String,
    /// The signed list credential carrying `encoded_list`.
    pub credential: Credential,
    /// Optimistic-concurrency version, bumped on every write.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Persisted link from a credential to its bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListIndexMapping {
    pub credential_id: CredentialId,
    pub status_list_id: StatusListId,
    pub issuer_id: IssuerId,
    pub purpose: StatusPurpose,
    pub status_index: usize,
    pub created_at: Timestamp,
}

/// Mirrored per-credential status, kept for fast lookup and audit.
///
/// The status list bit wins when the two disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatusRecord {
    pub credential_id: CredentialId,
    pub issuer_id: IssuerId,
    pub revoked: bool,
    pub suspended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updated_at: Timestamp,
}

/// `credentialStatus` object embedded in issued credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListEntry {
    /// `{statusListCredential}#{statusListIndex}`.
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub status_purpose: StatusPurpose,
    /// Decimal string, as StatusList2021 requires.
    pub status_list_index: String,
    pub status_list_credential: String,
}

impl StatusListEntry {
    pub fn new(list_url: &str, purpose: StatusPurpose, index: usize) -> Self {
        Self {
            id: format!("{list_url}#{index}"),
            entry_type: STATUS_LIST_ENTRY_TYPE.to_string(),
            status_purpose: purpose,
            status_list_index: index.to_string(),
            status_list_credential: list_url.to_string(),
        }
    }
}

/// Answer to "what is the status of this credential".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatusView {
    pub credential_id: CredentialId,
    pub revoked: bool,
    pub suspended: bool,
    pub reason: Option<String>,
    /// Revocation entry, when the credential is on a revocation list.
    pub status_list: Option<StatusListEntry>,
    /// Suspension entry, when the credential is on a suspension list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_list: Option<StatusListEntry>,
}

/// Result of a status write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub credential_id: CredentialId,
    pub purpose: StatusPurpose,
    pub status_index: usize,
    pub value: bool,
    /// Whether the bit actually flipped.
    pub changed: bool,
    /// List version after the write.
    pub list_version: i64,
}
