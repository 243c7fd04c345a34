//! crates/match/src/scan.rs
//!
//! Walks an existing delta and reports where its insert payloads live.
//!
//! When a delta buffer becomes a source, only the literal bytes it carries
//! are new data; copy instructions re-reference ranges that are already
//! indexed, and the command bytes themselves are control noise. The
//! scanner enumerates `(offset, len)` payload regions relative to the
//! start of the delta buffer so the indexer can sample just those.

use delta::{decode_base128, decode_instruction, DeltaResult, Instruction};

/// Returns the insert payload regions of `delta_bytes` in stream order.
///
/// The header's declared sizes play no role in indexing and are skipped
/// without validation against any source.
///
/// # Errors
///
/// [`delta::DeltaError::SourceBad`] if the buffer is not a well-formed
/// instruction stream.
pub(crate) fn insert_regions(delta_bytes: &[u8]) -> DeltaResult<Vec<(usize, usize)>> {
    let (_, rest) = decode_base128(delta_bytes)?;
    let (_, mut rest) = decode_base128(rest)?;

    let mut regions = Vec::new();
    while !rest.is_empty() {
        let cmd_offset = delta_bytes.len() - rest.len();
        let (instruction, tail) = decode_instruction(rest)?;
        if let Instruction::Insert(payload) = instruction {
            regions.push((cmd_offset + 1, payload.len()));
        }
        rest = tail;
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta::{encode_base128, encode_copy, encode_insert, DeltaError};

    #[test]
    fn reports_each_payload_with_its_buffer_offset() {
        let mut delta = Vec::new();
        encode_base128(300, &mut delta); // two header bytes
        encode_base128(40, &mut delta); // one header byte
        encode_copy(0x20, 16, &mut delta); // three bytes, no region
        encode_insert(b"first payload", &mut delta);
        encode_copy(0x40, 8, &mut delta);
        encode_insert(b"tail", &mut delta);

        let regions = insert_regions(&delta).expect("scan succeeds");
        assert_eq!(regions, [(7, 13), (24, 4)]);
        for (start, len) in regions {
            assert_eq!(delta[start - 1] as usize, len);
        }
    }

    #[test]
    fn copy_only_delta_has_no_regions() {
        let mut delta = Vec::new();
        encode_base128(64, &mut delta);
        encode_base128(64, &mut delta);
        encode_copy(0, 64, &mut delta);
        assert!(insert_regions(&delta).expect("scan succeeds").is_empty());
    }

    #[test]
    fn malformed_streams_are_rejected() {
        assert_eq!(insert_regions(&[]), Err(DeltaError::SourceBad));
        // reserved opcode after a valid header
        assert_eq!(insert_regions(&[0x10, 0x10, 0x00]), Err(DeltaError::SourceBad));
        // insert longer than the remaining buffer
        assert_eq!(insert_regions(&[0x10, 0x10, 0x7f, b'x']), Err(DeltaError::SourceBad));
    }
}
