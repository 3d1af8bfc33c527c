//! # Domain Identity Newtypes
//!
//! Wrappers for the identifiers that flow between the key store, the signer
//! and the status subsystem. You cannot pass an `IssuerId` where a
//! `CredentialId` is expected.
//!
//! Issuer and credential ids are opaque strings chosen by the caller (a DID,
//! a URL, `urn:uuid:...`). Key and status-list ids are generated here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BadgeError;

/// Identifier of an issuing organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerId(String);

/// Identifier of a credential, usually a URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

/// Identifier of a signing key. Appears as the fragment of a verification
/// method id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

/// Identifier of a status list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusListId(Uuid);

macro_rules! string_id {
    ($ty:ident, $what:literal) => {
        impl $ty {
            /// Wrap a caller-supplied identifier.
            ///
            /// # Errors
            ///
            /// `BadgeError::Validation` if the identifier is empty or only
            /// whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, BadgeError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(BadgeError::Validation(format!("{} must not be empty", $what)));
                }
                Ok(Self(value))
            }

            /// Access the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = BadgeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

macro_rules! uuid_id {
    ($ty:ident, $what:literal) => {
        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = BadgeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| BadgeError::Validation(format!("invalid {} {s:?}: {e}", $what)))
            }
        }
    };
}

string_id!(IssuerId, "issuer id");
string_id!(CredentialId, "credential id");
uuid_id!(KeyId, "key id");
uuid_id!(StatusListId, "status list id");
