//! crates/delta/src/varint.rs
//!
//! LSB-first base-128 integers, as used by the delta header.
//!
//! Non-terminal bytes carry seven value bits with the high bit set; the
//! first byte with a clear high bit terminates the integer. The first byte
//! is the least significant group. Decoding rejects truncated input and any
//! encoding that would overflow 64 bits.

use crate::error::{DeltaError, DeltaResult};

/// Longest legal encoding of a 64-bit value.
const MAX_ENCODED_LEN: usize = u64::BITS.div_ceil(7) as usize;

/// Appends the base-128 encoding of `value` to `out`.
pub fn encode_base128(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Number of bytes [`encode_base128`] emits for `value`.
#[must_use]
pub fn encoded_len(value: u64) -> usize {
    let bits = u64::BITS - value.leading_zeros();
    (bits.div_ceil(7) as usize).max(1)
}

/// Decodes a base-128 integer from the front of `bytes`.
///
/// Returns the value together with the remaining slice.
///
/// # Errors
///
/// [`DeltaError::SourceBad`] when the input ends before the terminator or
/// when the encoding does not fit a `u64`.
pub fn decode_base128(bytes: &[u8]) -> DeltaResult<(u64, &[u8])> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (used, &byte) in bytes.iter().enumerate() {
        if used >= MAX_ENCODED_LEN {
            return Err(DeltaError::SourceBad);
        }
        let group = u64::from(byte & 0x7f);
        if shift >= u64::BITS || (shift > 0 && group >> (u64::BITS - shift) != 0) {
            return Err(DeltaError::SourceBad);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &bytes[used + 1..]));
        }
        shift += 7;
    }
    Err(DeltaError::SourceBad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_matches_known_examples() {
        let cases: [(u64, &[u8]); 7] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (16_383, &[0xff, 0x7f]),
            (16_384, &[0x80, 0x80, 0x01]),
            ((1 << 31) - 1, &[0xff, 0xff, 0xff, 0xff, 0x07]),
        ];

        for (value, expected) in cases {
            let mut encoded = Vec::new();
            encode_base128(value, &mut encoded);
            assert_eq!(encoded, expected, "encoding of {value}");
            assert_eq!(encoded.len(), encoded_len(value));

            let (decoded, rest) = decode_base128(&encoded).expect("decode succeeds");
            assert_eq!(decoded, value);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn encoded_len_is_ceil_bits_over_seven() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(127), 1);
        assert_eq!(encoded_len(128), 2);
        assert_eq!(encoded_len(16_383), 2);
        assert_eq!(encoded_len(16_384), 3);
        assert_eq!(encoded_len((1 << 31) - 1), 5);
        assert_eq!(encoded_len(u64::MAX), 10);
    }

    #[test]
    fn decode_leaves_the_remainder() {
        let mut encoded = Vec::new();
        encode_base128(300, &mut encoded);
        encoded.extend_from_slice(b"tail");

        let (value, rest) = decode_base128(&encoded).expect("decode succeeds");
        assert_eq!(value, 300);
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert_eq!(decode_base128(&[]), Err(DeltaError::SourceBad));
        assert_eq!(decode_base128(&[0x80]), Err(DeltaError::SourceBad));
        assert_eq!(decode_base128(&[0xff, 0x80, 0x80]), Err(DeltaError::SourceBad));
    }

    #[test]
    fn decode_rejects_overlong_encodings() {
        // Eleven bytes can never be a valid u64.
        let overlong = [0x80u8; 10]
            .iter()
            .copied()
            .chain(std::iter::once(0x01))
            .collect::<Vec<_>>();
        assert_eq!(decode_base128(&overlong), Err(DeltaError::SourceBad));
    }

    #[test]
    fn decode_rejects_bit_overflow_in_final_group() {
        // Ten bytes are allowed, but the tenth may only contribute one bit.
        let mut encoded = vec![0x80u8; 9];
        encoded.push(0x02);
        assert_eq!(decode_base128(&encoded), Err(DeltaError::SourceBad));

        let mut max = vec![0xffu8; 9];
        max.push(0x01);
        let (value, rest) = decode_base128(&max).expect("u64::MAX decodes");
        assert_eq!(value, u64::MAX);
        assert!(rest.is_empty());
    }

    proptest! {
        #[test]
        fn round_trips_arbitrary_values(value in any::<u64>()) {
            let mut encoded = Vec::new();
            encode_base128(value, &mut encoded);
            prop_assert_eq!(encoded.len(), encoded_len(value));

            let (decoded, rest) = decode_base128(&encoded).expect("decode succeeds");
            prop_assert_eq!(decoded, value);
            prop_assert!(rest.is_empty());
        }

        #[test]
        fn round_trips_sequences(values in prop::collection::vec(any::<u64>(), 1..16)) {
            let mut encoded = Vec::new();
            for value in &values {
                encode_base128(*value, &mut encoded);
            }

            let mut rest = encoded.as_slice();
            for expected in &values {
                let (decoded, tail) = decode_base128(rest).expect("decode succeeds");
                prop_assert_eq!(decoded, *expected);
                rest = tail;
            }
            prop_assert!(rest.is_empty());
        }
    }
}
