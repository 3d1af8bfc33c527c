//! # bdg-core: Foundational Types for the Badge Trust Core
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other crate builds on:
//!
//! 1. **`CanonicalBytes` newtype.** All signing and verification input flows
//!    through `CanonicalBytes::new()`. Signer and verifier never serialize a
//!    credential themselves, so the bytes that were signed and the bytes that
//!    are verified come from the same function.
//!
//! 2. **Identifier newtypes.** `IssuerId`, `KeyId`, `CredentialId` and
//!    `StatusListId` are distinct types; an issuer id cannot be passed where a
//!    credential id is expected.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with a `Z` suffix and
//!    seconds precision, so proof `created` values canonicalize identically.
//!
//! 4. **One error taxonomy.** `BadgeError` carries the service-level error
//!    classes; crate-local errors convert into it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `bdg-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use error::{BadgeError, CanonicalizationError, StoreError};
pub use identity::{CredentialId, IssuerId, KeyId, StatusListId};
pub use temporal::Timestamp;
