//! # bdg-status: Credential Status Lists
//!
//! Revocation and suspension without per-credential calls by relying
//! parties: each issuer publishes one signed StatusList2021 credential per
//! purpose, carrying a gzip-compressed bitstring.
//!
//! - [`BitVector`]: the fixed-capacity bit array and its `encodedList` form.
//! - [`index_for_credential`]: deterministic bit position of a credential.
//! - [`StatusListRepository`]: lists, index mappings, mirrored status rows;
//!   [`InMemoryStatusListRepository`] for in-process use.
//! - [`StatusListManager`]: get-or-create, register, set status, and the
//!   [`RevocationCheck`](bdg_vc::RevocationCheck) used by the verifier.

pub mod bitvector;
pub mod error;
pub mod index;
pub mod manager;
pub mod model;
pub mod repository;

pub use bitvector::BitVector;
pub use error::StatusError;
pub use index::{index_for_credential, stable_hash, DEFAULT_CAPACITY};
pub use manager::{StatusListConfig, StatusListManager};
pub use model::{
    CredentialStatusRecord, CredentialStatusView, StatusChange, StatusList, StatusListEntry,
    StatusListIndexMapping, StatusPurpose, STATUS_LIST_CONTEXT, STATUS_LIST_CREDENTIAL_TYPE,
    STATUS_LIST_ENTRY_TYPE, STATUS_LIST_SUBJECT_TYPE,
};
pub use repository::{InMemoryStatusListRepository, StatusListRepository};
