//! crates/delta/src/apply.rs
//!
//! Reconstruction of a target buffer from a source and a delta.
//!
//! The applier trusts nothing in the delta: header sizes are validated
//! against the supplied source, every copy is bounds-checked with widened
//! arithmetic, inserts may not run past the end of the delta, and the walk
//! must finish with the output exactly full and the delta exactly consumed.
//! A corrupt delta can therefore fail the call but never read or write out
//! of bounds.

use tracing::debug;

use crate::error::{DeltaError, DeltaResult};
use crate::instruction::{decode_instruction, Instruction};
use crate::varint::decode_base128;

/// Smallest byte count any well-formed delta can have.
pub const DELTA_SIZE_MIN: usize = 3;

/// Applies `delta` to `source`, returning the reconstructed target.
///
/// The delta's declared source size must equal `source.len()`; for an index
/// built from several sources the caller passes the concatenated aggregate.
///
/// # Errors
///
/// [`DeltaError::SourceBad`] for any malformed delta (short buffer, header
/// mismatch, reserved opcode, out-of-bounds copy, truncated insert, or a
/// stream that does not produce exactly the declared target), and
/// [`DeltaError::OutOfMemory`] if the output cannot be allocated.
pub fn apply_delta(source: &[u8], delta: &[u8]) -> DeltaResult<Vec<u8>> {
    if delta.len() < DELTA_SIZE_MIN {
        return Err(DeltaError::SourceBad);
    }

    let (declared_source, rest) = decode_base128(delta)?;
    if declared_source != source.len() as u64 {
        return Err(DeltaError::SourceBad);
    }
    let (declared_target, mut rest) = decode_base128(rest)?;
    let target_len = usize::try_from(declared_target).map_err(|_| DeltaError::SourceBad)?;

    let mut output = Vec::new();
    output
        .try_reserve_exact(target_len)
        .map_err(|_| DeltaError::OutOfMemory)?;

    while !rest.is_empty() {
        let (instruction, tail) = decode_instruction(rest)?;
        let remaining = target_len - output.len();
        match instruction {
            Instruction::Copy { offset, size } => {
                let end = u64::from(offset) + u64::from(size);
                if end > source.len() as u64 || size as usize > remaining {
                    return Err(DeltaError::SourceBad);
                }
                output.extend_from_slice(&source[offset as usize..end as usize]);
            }
            Instruction::Insert(payload) => {
                if payload.len() > remaining {
                    return Err(DeltaError::SourceBad);
                }
                output.extend_from_slice(payload);
            }
        }
        rest = tail;
    }

    if output.len() != target_len {
        return Err(DeltaError::SourceBad);
    }

    debug!(
        source_len = source.len(),
        delta_len = delta.len(),
        target_len,
        "applied delta"
    );
    Ok(output)
}

/// Applies a delta that is embedded inside its own source buffer.
///
/// Group-compressed streams store each delta after the bytes it was encoded
/// against, so the delta at `source[delta_start..delta_end]` applies to the
/// prefix `source[..delta_start]`.
///
/// # Errors
///
/// [`DeltaError::SourceBad`] when the range does not lie inside `source`,
/// plus everything [`apply_delta`] reports.
pub fn apply_delta_to_source(
    source: &[u8],
    delta_start: usize,
    delta_end: usize,
) -> DeltaResult<Vec<u8>> {
    if delta_start > delta_end || delta_end > source.len() {
        return Err(DeltaError::SourceBad);
    }
    apply_delta(&source[..delta_start], &source[delta_start..delta_end])
}
