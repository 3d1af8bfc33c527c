//! JWS compact serialization for `JwtProof2020`.
//!
//! The protected header is `{"alg", "kid", "typ":"JWT"}` and is itself
//! canonicalized before encoding. The payload segment is the base64url of
//! the credential's canonical signing bytes, so a verifier can recompute it
//! from the credential and compare segment to segment.

use bdg_core::CanonicalBytes;
use bdg_crypto::{base64url_decode, base64url_encode, KeyAlgorithm, Signature, SigningInput};
use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::VcError;
use crate::proof::{JwtProof, Proof};

/// Protected header of a credential JWS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// JWS `alg` name.
    pub alg: String,
    /// Verification method id of the signing key.
    pub kid: String,
    /// Always `JWT`.
    #[serde(default = "default_typ")]
    pub typ: String,
}

fn default_typ() -> String {
    "JWT".to_string()
}

impl JwsHeader {
    /// Header for a key of `algorithm` identified by `kid`.
    pub fn new(algorithm: KeyAlgorithm, kid: impl Into<String>) -> Self {
        Self {
            alg: algorithm.jwt_alg().to_string(),
            kid: kid.into(),
            typ: default_typ(),
        }
    }

    /// Internal algorithm named by `alg`.
    pub fn algorithm(&self) -> Result<KeyAlgorithm, VcError> {
        Ok(KeyAlgorithm::from_jwt_alg(&self.alg)?)
    }

    /// Encoded protected-header segment.
    pub fn encode(&self) -> Result<String, VcError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(base64url_encode(canonical.as_bytes()))
    }
}

/// A compact JWS split into its parts.
#[derive(Debug, Clone)]
pub struct CompactJws<'a> {
    /// Decoded protected header.
    pub header: JwsHeader,
    /// Header segment exactly as it appears in the token.
    pub header_segment: &'a str,
    /// Payload segment exactly as it appears in the token.
    pub payload_segment: &'a str,
    /// Decoded signature.
    pub signature: Signature,
}

impl<'a> CompactJws<'a> {
    /// Split and decode `header.payload.signature`.
    pub fn parse(token: &'a str) -> Result<Self, VcError> {
        let mut parts = token.split('.');
        let (Some(header_segment), Some(payload_segment), Some(sig_segment), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VcError::MalformedJws("expected three segments".into()));
        };

        let header_bytes = base64url_decode(header_segment)
            .map_err(|e| VcError::MalformedJws(format!("header: {e}")))?;
        let header: JwsHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| VcError::MalformedJws(format!("header JSON: {e}")))?;
        let signature = base64url_decode(sig_segment)
            .map_err(|e| VcError::MalformedJws(format!("signature: {e}")))?;

        Ok(Self {
            header,
            header_segment,
            payload_segment,
            signature: Signature::from_bytes(signature),
        })
    }

    /// Whether the payload segment encodes exactly `payload`.
    pub fn payload_matches(&self, payload: &CanonicalBytes) -> bool {
        self.payload_segment == base64url_encode(payload.as_bytes())
    }

    /// Signing input over the token's header segment and `payload`.
    pub fn signing_input(&self, payload: &CanonicalBytes) -> SigningInput {
        SigningInput::jws(self.header_segment, payload)
    }
}

/// Join an encoded header, the canonical payload and a signature into a
/// compact token.
pub fn assemble(header_segment: &str, payload: &CanonicalBytes, signature: &Signature) -> String {
    format!(
        "{header_segment}.{}.{}",
        base64url_encode(payload.as_bytes()),
        base64url_encode(signature.as_bytes())
    )
}

/// Rebuild the credential a bare JWT carries: the payload becomes the
/// document and the token is attached as its `JwtProof2020`.
pub fn credential_from_jwt(token: &str) -> Result<Credential, VcError> {
    let jws = CompactJws::parse(token)?;
    let payload = base64url_decode(jws.payload_segment)
        .map_err(|e| VcError::MalformedJws(format!("payload: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| VcError::MalformedJws(format!("payload JSON: {e}")))?;
    let credential = Credential::from_value(value)?;
    if credential.has_proof() {
        return Err(VcError::MalformedJws("payload must not carry a proof".into()));
    }
    credential.with_proof(&Proof::Jwt(JwtProof {
        jwt: token.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_canonical_json() {
        let header = JwsHeader::new(KeyAlgorithm::Ed25519, "did:web:x#k1");
        let decoded = base64url_decode(&header.encode().unwrap()).unwrap();
        assert_eq!(
            std::str::from_utf8(&decoded).unwrap(),
            r#"{"alg":"EdDSA","kid":"did:web:x#k1","typ":"JWT"}"#
        );
    }

    #[test]
    fn parse_roundtrip() {
        let header = JwsHeader::new(KeyAlgorithm::Es256, "kid-1");
        let seg = header.encode().unwrap();
        let payload = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let token = assemble(&seg, &payload, &Signature::from_bytes(vec![1, 2, 3]));

        let jws = CompactJws::parse(&token).unwrap();
        assert_eq!(jws.header, header);
        assert_eq!(jws.header.algorithm().unwrap(), KeyAlgorithm::Es256);
        assert!(jws.payload_matches(&payload));
        assert_eq!(jws.signature.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn payload_mismatch_detected() {
        let seg = JwsHeader::new(KeyAlgorithm::Ed25519, "k").encode().unwrap();
        let a = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let b = CanonicalBytes::new(&serde_json::json!({"a": 2})).unwrap();
        let token = assemble(&seg, &a, &Signature::from_bytes(vec![0]));
        assert!(!CompactJws::parse(&token).unwrap().payload_matches(&b));
    }

    #[test]
    fn wrong_segment_count_rejected() {
        assert!(matches!(CompactJws::parse("a.b"), Err(VcError::MalformedJws(_))));
        assert!(CompactJws::parse("a.b.c.d").is_err());
    }

    #[test]
    fn unknown_alg_rejected() {
        let header = JwsHeader {
            alg: "none".into(),
            kid: "k".into(),
            typ: "JWT".into(),
        };
        assert!(header.algorithm().is_err());
    }

    #[test]
    fn bare_jwt_becomes_credential_with_proof() {
        let seg = JwsHeader::new(KeyAlgorithm::Ed25519, "did:web:x#k1").encode().unwrap();
        let payload = CanonicalBytes::new(&serde_json::json!({"id": "urn:uuid:1", "issuer": "did:web:x"})).unwrap();
        let token = assemble(&seg, &payload, &Signature::from_bytes(vec![7]));

        let credential = credential_from_jwt(&token).unwrap();
        assert_eq!(credential.id().unwrap().as_str(), "urn:uuid:1");
        match credential.proof().unwrap() {
            Some(Proof::Jwt(proof)) => assert_eq!(proof.jwt, token),
            other => panic!("unexpected proof {other:?}"),
        }
    }

    #[test]
    fn bare_jwt_with_non_object_payload_rejected() {
        let seg = JwsHeader::new(KeyAlgorithm::Ed25519, "k").encode().unwrap();
        let payload = CanonicalBytes::new(&serde_json::json!([1, 2])).unwrap();
        let token = assemble(&seg, &payload, &Signature::from_bytes(vec![0]));
        assert!(credential_from_jwt(&token).is_err());
        assert!(credential_from_jwt("not-a-jwt").is_err());
    }
}
