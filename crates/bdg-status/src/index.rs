//! # Bit Index Derivation
//!
//! A credential's position in a status list is derived from its id, not
//! allocated: `index_for_credential(id, capacity)` is a pure function, stable
//! across processes and releases. The hash is the 31-multiplier string hash
//! over UTF-16 code units with 32-bit wrapping arithmetic, reduced by absolute
//! value modulo the capacity.
//!
//! Distinct ids may share an index. With 16384 bits the chance of some
//! collision passes one half at about 150 credentials on one list. A
//! collision means revoking one credential also reports the other as
//! revoked; the persisted index mapping records both so the overlap is
//! auditable.

/// Capacity of newly created lists.
pub const DEFAULT_CAPACITY: usize = 16384;

/// Stable 32-bit hash of `id`.
pub fn stable_hash(id: &str) -> i32 {
    id.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Bit index of `credential_id` in a list of `capacity` bits.
///
/// `capacity` must be non-zero; a zero capacity yields index 0.
pub fn index_for_credential(credential_id: &str, capacity: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    stable_hash(credential_id).unsigned_abs() as usize % capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 97 * 31 + 98);
        // Overflow wraps.
        assert_eq!(stable_hash("urn:uuid:abc"), -1_056_676_852);
        assert_eq!(index_for_credential("urn:uuid:abc", DEFAULT_CAPACITY), 7156);
        assert_eq!(index_for_credential("c1", DEFAULT_CAPACITY), 3118);
    }

    #[test]
    fn min_hash_does_not_overflow_abs() {
        // unsigned_abs(i32::MIN) is 2^31.
        assert_eq!((i32::MIN).unsigned_abs() as usize % DEFAULT_CAPACITY, 0);
    }

    #[test]
    fn non_ascii_uses_utf16_units() {
        // U+1F600 is a surrogate pair.
        let h = stable_hash("\u{1F600}");
        assert_eq!(h, 1_772_899);
    }

    #[test]
    fn zero_capacity() {
        assert_eq!(index_for_credential("x", 0), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn index_in_range_and_stable(id in ".{0,64}", capacity in 1usize..100_000) {
            let a = index_for_credential(&id, capacity);
            prop_assert!(a < capacity);
            prop_assert_eq!(a, index_for_credential(&id.clone(), capacity));
        }
    }
}
