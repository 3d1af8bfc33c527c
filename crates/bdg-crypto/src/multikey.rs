//! Multibase public-key encoding.
//!
//! A public key is rendered as `multibase(base58btc, varint(codec) || key)`.
//! The multicodec prefix makes the text self-describing: the algorithm is
//! recovered from it when a key is parsed back.

use multibase::Base;

use crate::algorithm::KeyAlgorithm;
use crate::error::CryptoError;

/// `ed25519-pub` (0xed) as an unsigned varint.
const ED25519_PUB: [u8; 2] = [0xed, 0x01];
/// `p256-pub` (0x1200) as an unsigned varint.
const P256_PUB: [u8; 2] = [0x80, 0x24];
/// `rsa-pub` (0x1205) as an unsigned varint.
const RSA_PUB: [u8; 2] = [0x85, 0x24];

fn codec_prefix(algorithm: KeyAlgorithm) -> [u8; 2] {
    match algorithm {
        KeyAlgorithm::Ed25519 => ED25519_PUB,
        KeyAlgorithm::Es256 => P256_PUB,
        KeyAlgorithm::Rs256 => RSA_PUB,
    }
}

/// Encode raw public-key bytes with the algorithm's multicodec prefix.
pub fn encode_public(algorithm: KeyAlgorithm, key: &[u8]) -> String {
    let mut buf = Vec::with_capacity(key.len() + 2);
    buf.extend_from_slice(&codec_prefix(algorithm));
    buf.extend_from_slice(key);
    multibase::encode(Base::Base58Btc, buf)
}

/// Decode a multibase public key into its algorithm and raw bytes.
pub fn decode_public(s: &str) -> Result<(KeyAlgorithm, Vec<u8>), CryptoError> {
    let (base, bytes) = multibase::decode(s)
        .map_err(|e| CryptoError::Encoding(format!("invalid multibase: {e}")))?;
    if base != Base::Base58Btc {
        return Err(CryptoError::Encoding(format!(
            "public keys must be base58btc, got {base:?}"
        )));
    }
    if bytes.len() < 2 {
        return Err(CryptoError::Encoding("multikey too short".into()));
    }
    let (prefix, key) = bytes.split_at(2);
    let algorithm = KeyAlgorithm::ALL
        .into_iter()
        .find(|alg| codec_prefix(*alg) == prefix)
        .ok_or_else(|| {
            CryptoError::UnsupportedAlgorithm(format!(
                "multicodec prefix {:02x}{:02x}",
                prefix[0], prefix[1]
            ))
        })?;
    Ok((algorithm, key.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_selects_algorithm() {
        let encoded = encode_public(KeyAlgorithm::Es256, &[2u8; 33]);
        let (alg, bytes) = decode_public(&encoded).unwrap();
        assert_eq!(alg, KeyAlgorithm::Es256);
        assert_eq!(bytes, vec![2u8; 33]);
    }

    #[test]
    fn unknown_prefix_rejected() {
        let encoded = multibase::encode(Base::Base58Btc, [0xe7, 0x01, 1, 2, 3]);
        assert!(matches!(
            decode_public(&encoded),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn non_base58_rejected() {
        let encoded = multibase::encode(Base::Base64Url, [0xed, 0x01, 1, 2, 3]);
        assert!(matches!(decode_public(&encoded), Err(CryptoError::Encoding(_))));
    }

    #[test]
    fn garbage_rejected() {
        assert!(decode_public("").is_err());
        assert!(decode_public("z").is_err());
    }
}
