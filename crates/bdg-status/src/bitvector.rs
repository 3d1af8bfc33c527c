//! # Bit Vector
//!
//! Fixed-capacity bit array behind every status list. Bit 0 is the left-most
//! (most significant) bit of the first byte, so the byte form is the
//! StatusList2021 bitstring as published.
//!
//! Transport form (`encodedList`): bytes, gzip, base64url without padding.
//!
//! Out-of-range indices never panic: `get` reads them as unset and
//! `set`/`clear` return `false` without touching anything.

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::StatusError;

const WORD_BITS: usize = 32;

/// Fixed-capacity bit array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u32>,
    capacity: usize,
}

impl BitVector {
    /// All-zero vector of `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    /// Number of bits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value of bit `index`; `false` when out of range.
    pub fn get(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        self.words[index / WORD_BITS] & mask(index) != 0
    }

    /// Set bit `index`. Returns `false` if out of range.
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        self.words[index / WORD_BITS] |= mask(index);
        true
    }

    /// Clear bit `index`. Returns `false` if out of range.
    pub fn clear(&mut self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        self.words[index / WORD_BITS] &= !mask(index);
        true
    }

    /// Set bit `index` to `value`. Returns `false` if out of range.
    pub fn assign(&mut self, index: usize, value: bool) -> bool {
        if value {
            self.set(index)
        } else {
            self.clear(index)
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(move |&i| self.get(i))
    }

    /// Byte form, `ceil(capacity / 8)` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_be_bytes()).collect();
        bytes.truncate(self.capacity.div_ceil(8));
        bytes
    }

    /// Inverse of [`to_bytes()`](Self::to_bytes). Bits past `capacity` in
    /// the last byte are ignored.
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<Self, StatusError> {
        let expected = capacity.div_ceil(8);
        if bytes.len() != expected {
            return Err(StatusError::Corrupted(format!(
                "bitstring is {} bytes, expected {expected} for capacity {capacity}",
                bytes.len()
            )));
        }
        let mut v = Self::new(capacity);
        for (i, chunk) in bytes.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            v.words[i] = u32::from_be_bytes(word);
        }
        let tail = capacity % WORD_BITS;
        if tail != 0 {
            if let Some(last) = v.words.last_mut() {
                *last &= u32::MAX << (WORD_BITS - tail);
            }
        }
        Ok(v)
    }

    /// The `encodedList` text.
    pub fn encode(&self) -> Result<String, StatusError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&self.to_bytes())
            .map_err(|e| StatusError::Encoding(format!("gzip failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| StatusError::Encoding(format!("gzip failed: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(compressed))
    }

    /// Decode an `encodedList` of known capacity.
    pub fn decode(encoded: &str, capacity: usize) -> Result<Self, StatusError> {
        let bytes = inflate(encoded, capacity.div_ceil(8) + 1)?;
        Self::from_bytes(&bytes, capacity)
    }

    /// Decode an `encodedList`, taking the capacity from its length.
    /// At most `max_capacity` bits are accepted.
    pub fn decode_unsized(encoded: &str, max_capacity: usize) -> Result<Self, StatusError> {
        let bytes = inflate(encoded, max_capacity.div_ceil(8) + 1)?;
        if bytes.len() * 8 > max_capacity {
            return Err(StatusError::Corrupted(format!(
                "bitstring exceeds {max_capacity} bits"
            )));
        }
        Self::from_bytes(&bytes, bytes.len() * 8)
    }
}

fn mask(index: usize) -> u32 {
    1u32 << (WORD_BITS - 1 - index % WORD_BITS)
}

// Decompression is capped so a hostile list cannot inflate without bound.
fn inflate(encoded: &str, limit: usize) -> Result<Vec<u8>, StatusError> {
    let compressed = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| StatusError::Corrupted(format!("encodedList is not base64url: {e}")))?;
    let mut bytes = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .take(limit as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| StatusError::Corrupted(format!("encodedList is not gzip: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_vector_is_empty() {
        let v = BitVector::new(16384);
        assert_eq!(v.capacity(), 16384);
        assert_eq!(v.count_ones(), 0);
        assert_eq!(v.to_bytes().len(), 2048);
    }

    #[test]
    fn set_get_clear() {
        let mut v = BitVector::new(100);
        assert!(v.set(0));
        assert!(v.set(99));
        assert!(v.get(0) && v.get(99) && !v.get(50));
        assert!(v.clear(0));
        assert!(!v.get(0));
        assert_eq!(v.ones().collect::<Vec<_>>(), vec![99]);
    }

    #[test]
    fn out_of_range_is_noop() {
        let mut v = BitVector::new(8);
        assert!(!v.set(8));
        assert!(!v.clear(1000));
        assert!(!v.get(8));
        assert_eq!(v, BitVector::new(8));
    }

    #[test]
    fn bit_zero_is_leftmost() {
        let mut v = BitVector::new(16);
        v.set(0);
        v.set(9);
        assert_eq!(v.to_bytes(), vec![0b1000_0000, 0b0100_0000]);
    }

    #[test]
    fn encode_decode() {
        let mut v = BitVector::new(16384);
        v.set(42);
        v.set(16383);
        let encoded = v.encode().unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(BitVector::decode(&encoded, 16384).unwrap(), v);
        assert_ne!(encoded, BitVector::new(16384).encode().unwrap());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(BitVector::decode("!!!", 16), Err(StatusError::Corrupted(_))));
        let not_gzip = URL_SAFE_NO_PAD.encode(b"plain bytes");
        assert!(matches!(BitVector::decode(&not_gzip, 16), Err(StatusError::Corrupted(_))));
    }

    #[test]
    fn decode_rejects_wrong_capacity() {
        let encoded = BitVector::new(64).encode().unwrap();
        assert!(matches!(BitVector::decode(&encoded, 128), Err(StatusError::Corrupted(_))));
        assert!(matches!(BitVector::decode(&encoded, 32), Err(StatusError::Corrupted(_))));
    }

    #[test]
    fn decode_unsized_infers_capacity() {
        let mut v = BitVector::new(1024);
        v.set(7);
        let decoded = BitVector::decode_unsized(&v.encode().unwrap(), 1 << 20).unwrap();
        assert_eq!(decoded.capacity(), 1024);
        assert!(decoded.get(7));
        assert!(BitVector::decode_unsized(&v.encode().unwrap(), 512).is_err());
    }

    #[test]
    fn unaligned_capacity_masks_tail() {
        let v = BitVector::from_bytes(&[0xff, 0xff], 12).unwrap();
        assert_eq!(v.count_ones(), 12);
        assert!(!v.get(12));
    }
}
