//! # bdg-crypto: Signature Primitives for the Badge Trust Core
//!
//! - **Algorithms**: Ed25519, RS256 and ES256, with an explicit mapping from
//!   the internal enum to primitive names, JWS `alg` headers and Data
//!   Integrity cryptosuites ([`KeyAlgorithm`]).
//! - **Keys**: [`KeyPair`] and [`PublicKey`] enums dispatching to
//!   `ed25519-dalek`, `rsa` and `p256`.
//! - **Multibase keys**: base58btc with multicodec prefixes.
//! - **Sealing**: AES-256-GCM encryption of private keys at rest
//!   ([`KeySealer`]).
//! - **Providers**: the injectable [`CryptoProvider`] trait with OS and
//!   seeded implementations.
//!
//! Everything that is signed is a [`SigningInput`], and every
//! `SigningInput` is built from `CanonicalBytes`.

pub mod algorithm;
pub mod error;
pub mod keys;
pub mod multikey;
pub mod provider;
pub mod sealing;
pub mod signing_input;

// Re-export primary types.
pub use algorithm::KeyAlgorithm;
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKey, Signature};
pub use provider::{CryptoProvider, OsCryptoProvider, SeededCryptoProvider};
pub use sealing::KeySealer;
pub use signing_input::{base64url_decode, base64url_encode, SigningInput};
