//! # bdg-keys: Issuer Signing Keys
//!
//! - [`SigningKeyRecord`]: the persisted key, private half sealed.
//! - [`KeyRepository`]: storage contract with an atomic demote-and-insert;
//!   [`InMemoryKeyRepository`] is the in-process backend.
//! - [`KeyStore`]: generation, rotation, revocation, unlocking for signing,
//!   and [`VerificationKeyResolver`](bdg_vc::VerificationKeyResolver).
//!
//! ## Security Invariants
//!
//! - An issuer has at most one active key.
//! - Keys are never deleted; revoked keys verify but never sign.
//! - Resolution is by verification method, never by "current key".

pub mod error;
pub mod record;
pub mod repository;
pub mod store;

pub use error::KeyStoreError;
pub use record::{
    parse_verification_method, verification_method_id, KeyStatus, SigningKeyRecord,
    VerificationMethod, VERIFICATION_METHOD_TYPE,
};
pub use repository::{InMemoryKeyRepository, KeyRepository};
pub use store::{KeyStore, KeyStoreConfig, UnlockedKey, DEFAULT_CONTROLLER_PREFIX};
