//! crates/match/src/encoder.rs
//!
//! Greedy match-and-emit delta encoder.
//!
//! The encoder walks the target with a rolling window hash, asks the index
//! for candidates at each position, verifies them byte for byte, and takes
//! the longest extension it can find. Matched ranges become copy
//! instructions; everything else accumulates in a pending literal buffer
//! that is flushed as insert instructions. Matches extend backwards into
//! the pending literals, which recovers the bytes the window had to pass
//! over before the match became visible.

use rabin::{RabinWindow, RABIN_WINDOW};
use tracing::debug;

use delta::{
    encode_base128, encode_copy, encode_insert, DeltaError, DeltaResult, MAX_COPY_SIZE,
    MAX_INSERT_SIZE,
};

use crate::index::DeltaIndex;

/// Matches shorter than this cost more as a copy than as literals.
const MIN_MATCH: usize = 4;

/// Stop scanning a bucket once a match at least this long is found.
const GOOD_ENOUGH: usize = 4096;

/// A verified match against the aggregate source space.
struct Match {
    /// Aggregate offset of the first copied byte, after backward extension.
    start: u64,
    /// Bytes recovered from the pending literal buffer.
    back: usize,
    /// Bytes matched from the cursor forwards, window included.
    forward: usize,
}

pub(crate) fn encode(
    index: &DeltaIndex<'_>,
    target: &[u8],
    max_delta_size: usize,
) -> DeltaResult<Vec<u8>> {
    if index.source_count() == 0 {
        return Err(DeltaError::IndexNeeded);
    }
    if target.is_empty() {
        return Err(DeltaError::BufferEmpty);
    }

    let mut out = Vec::new();
    out.try_reserve(target.len() / 4 + 16)
        .map_err(|_| DeltaError::OutOfMemory)?;
    encode_base128(index.total_source_bytes(), &mut out);
    encode_base128(target.len() as u64, &mut out);
    check_size(&out, max_delta_size)?;

    let mut copies = 0usize;
    let mut inserts = 0usize;

    let mut window: Option<RabinWindow> = None;
    let mut pending_start = 0usize;
    let mut pos = 0usize;

    while pos < target.len() {
        let best = if target.len() - pos >= RABIN_WINDOW {
            let hash = match &window {
                Some(rolled) => rolled.hash(),
                None => {
                    let seeded = RabinWindow::new(&target[pos..]);
                    let hash = seeded.hash();
                    window = Some(seeded);
                    hash
                }
            };
            find_best(index, target, pos, pos - pending_start, hash)
        } else {
            None
        };

        match best {
            Some(found) if found.back + found.forward >= MIN_MATCH => {
                // literals not swallowed by the backward extension
                flush_pending(
                    &target[pending_start..pos - found.back],
                    &mut out,
                    &mut inserts,
                    max_delta_size,
                )?;
                emit_copies(&found, &mut out, &mut copies, max_delta_size)?;
                pos += found.forward;
                pending_start = pos;
                window = None;
            }
            _ => {
                pos += 1;
                if pos - pending_start == MAX_INSERT_SIZE {
                    flush_pending(
                        &target[pending_start..pos],
                        &mut out,
                        &mut inserts,
                        max_delta_size,
                    )?;
                    pending_start = pos;
                }
                if pos + RABIN_WINDOW <= target.len() {
                    if let Some(rolled) = window.as_mut() {
                        rolled.roll(target[pos + RABIN_WINDOW - 1]);
                    }
                } else {
                    window = None;
                }
            }
        }
    }
    flush_pending(&target[pending_start..], &mut out, &mut inserts, max_delta_size)?;

    debug!(
        target_len = target.len(),
        delta_len = out.len(),
        copies,
        inserts,
        "encoded delta"
    );
    Ok(out)
}

/// Scans the bucket for `hash` and returns the best verified match.
///
/// Candidates arrive in aggregate order and only a strictly longer
/// extension replaces the current best, so equal-length matches resolve to
/// the earliest aggregate offset and the result is deterministic.
fn find_best(
    index: &DeltaIndex<'_>,
    target: &[u8],
    pos: usize,
    max_back: usize,
    hash: u32,
) -> Option<Match> {
    let window = &target[pos..pos + RABIN_WINDOW];
    let mut best: Option<Match> = None;
    let mut best_len = 0usize;

    for entry in index.candidates(hash) {
        if entry.hash != hash {
            continue;
        }
        let source = index.source(entry.source);
        let offset = entry.offset as usize;
        let bytes = source.bytes;
        if &bytes[offset..offset + RABIN_WINDOW] != window {
            continue;
        }

        // the wire format caps copy offsets at 32 bits
        let window_start = source.agg_offset + offset as u64;
        if window_start > u64::from(u32::MAX) {
            continue;
        }

        let mut forward = RABIN_WINDOW
            + common_prefix(&bytes[offset + RABIN_WINDOW..], &target[pos + RABIN_WINDOW..]);
        let back = common_suffix(&bytes[..offset], &target[..pos], max_back);

        let start = window_start - back as u64;
        let available = (u64::from(u32::MAX) + 1 - start) as usize;
        forward = forward.min(available - back);

        let total = back + forward;
        if total > best_len {
            best_len = total;
            best = Some(Match {
                start,
                back,
                forward,
            });
            if total >= GOOD_ENOUGH {
                break;
            }
        }
    }
    best
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[u8], b: &[u8], limit: usize) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take(limit)
        .take_while(|(x, y)| x == y)
        .count()
}

/// Emits the matched range as copies, splitting at the per-copy size cap.
fn emit_copies(
    found: &Match,
    out: &mut Vec<u8>,
    copies: &mut usize,
    max_delta_size: usize,
) -> DeltaResult<()> {
    let mut start = found.start;
    let mut remaining = found.back + found.forward;
    while remaining > 0 {
        let chunk = remaining.min(MAX_COPY_SIZE);
        encode_copy(start as u32, chunk as u32, out);
        check_size(out, max_delta_size)?;
        *copies += 1;
        start += chunk as u64;
        remaining -= chunk;
    }
    Ok(())
}

/// Flushes pending literals as insert instructions of at most 127 bytes.
fn flush_pending(
    pending: &[u8],
    out: &mut Vec<u8>,
    inserts: &mut usize,
    max_delta_size: usize,
) -> DeltaResult<()> {
    for chunk in pending.chunks(MAX_INSERT_SIZE) {
        encode_insert(chunk, out);
        check_size(out, max_delta_size)?;
        *inserts += 1;
    }
    Ok(())
}

fn check_size(out: &[u8], max_delta_size: usize) -> DeltaResult<()> {
    if max_delta_size > 0 && out.len() > max_delta_size {
        return Err(DeltaError::SizeTooBig);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_counts_shared_lead() {
        assert_eq!(common_prefix(b"abcdef", b"abcxef"), 3);
        assert_eq!(common_prefix(b"abc", b"abcdef"), 3);
        assert_eq!(common_prefix(b"", b"abc"), 0);
    }

    #[test]
    fn common_suffix_respects_the_limit() {
        assert_eq!(common_suffix(b"xxabc", b"yyabc", 16), 3);
        assert_eq!(common_suffix(b"xxabc", b"yyabc", 2), 2);
        assert_eq!(common_suffix(b"abc", b"", 16), 0);
    }
}
