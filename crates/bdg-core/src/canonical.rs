//! # Canonical Serialization: JCS Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for the
//! bytes a credential proof is computed over.
//!
//! ## Security Invariant
//!
//! `CanonicalBytes` has a private inner field. The only constructors are
//! [`CanonicalBytes::new()`] and [`CanonicalBytes::from_value()`], both of
//! which serialize through RFC 8785 (JSON Canonicalization Scheme): object
//! keys sorted by UTF-16 code units, compact separators, ES6 number
//! formatting. Two documents that are equal as JSON values always produce
//! identical bytes, regardless of the field order they were built with.
//!
//! Any function that signs or verifies must accept `&CanonicalBytes`, and the
//! only way to obtain one is through this module. Swapping in a stricter
//! graph canonicalization (RDF dataset canonicalization) means replacing the
//! body of `from_value`; the signer and verifier contracts do not change.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - Object keys are sorted; separators are compact.
/// - Output is valid UTF-8 and valid JSON.
/// - The inner `Vec<u8>` is private, so downstream code cannot forge it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-built JSON value.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the canonical bytes as a string slice.
    ///
    /// Infallible in practice: JCS output is always UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
