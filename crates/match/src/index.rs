//! crates/match/src/index.rs
//!
//! Multi-source Rabin match index.
//!
//! The index samples window-start positions from every source added to it
//! and stores them in a packed entry arena grouped by hash bucket. Sources
//! are borrowed, never copied; an entry names its source by number and its
//! window by the offset inside that source, so the arena stays valid when
//! more sources arrive. Every addition rebuilds the bucket view, which
//! keeps the structure a pure function of the sources added so far and
//! leaves nothing to mutate lazily during encoding.

use std::fmt;
use std::mem::size_of;

use rabin::{rabin_hash, RABIN_WINDOW};
use tracing::{debug, trace};

use delta::{DeltaError, DeltaResult};

use crate::encoder;
use crate::scan;

/// Cap on bucket chain length after pruning.
pub const HASH_LIMIT: usize = 64;

const MIN_TABLE_SIZE: usize = 1 << 4;
const MAX_TABLE_SIZE: usize = 1 << 24;

/// One borrowed source buffer and its position in the aggregate space.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Source<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) agg_offset: u64,
}

/// One sampled window position.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry {
    pub(crate) hash: u32,
    pub(crate) source: u16,
    pub(crate) offset: u32,
}

/// Summary of one live index entry, for diagnostics and tests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntrySummary {
    /// Position of the entry's window in the aggregate source space.
    pub aggregate_offset: u64,
    /// Rabin hash of the window at that position.
    pub hash: u32,
}

/// Match index over one or more source buffers.
///
/// Sources accumulate in addition order and every copy offset the encoder
/// emits refers to the concatenation of all of them (plus any bytes skipped
/// via `unadded_bytes`). The index borrows the source bytes, so they must
/// outlive it and stay unmodified.
///
/// # Examples
///
/// ```
/// use matching::{apply_delta, DeltaIndex};
///
/// let base = b"the quick brown fox jumps over the lazy dog";
/// let mut index = DeltaIndex::new();
/// index.add_source(base, 0)?;
///
/// let target = b"the quick brown fox hops over the lazy dog";
/// let delta = index.make_delta(target, 0)?;
/// assert_eq!(apply_delta(base, &delta)?, target);
/// # Ok::<(), matching::DeltaError>(())
/// ```
pub struct DeltaIndex<'a> {
    sources: Vec<Source<'a>>,
    /// Retained samples in aggregate order, never pruned.
    entries: Vec<Entry>,
    /// Bucket-grouped, pruned view rebuilt on every addition.
    packed: Vec<Entry>,
    /// `table_size + 1` offsets into `packed`.
    buckets: Vec<u32>,
    hash_mask: u32,
    total_source_bytes: u64,
    max_bytes_to_index: Option<usize>,
}

impl<'a> DeltaIndex<'a> {
    /// Creates an empty index with unbounded sampling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            entries: Vec::new(),
            packed: Vec::new(),
            buckets: vec![0; MIN_TABLE_SIZE + 1],
            hash_mask: (MIN_TABLE_SIZE - 1) as u32,
            total_source_bytes: 0,
            max_bytes_to_index: None,
        }
    }

    /// Creates an empty index that samples at most `cap / RABIN_WINDOW`
    /// positions per source, trading match accuracy for peak memory.
    #[must_use]
    pub fn with_max_bytes_to_index(cap: usize) -> Self {
        let mut index = Self::new();
        index.max_bytes_to_index = Some(cap.max(RABIN_WINDOW));
        index
    }

    /// Adds a plain source buffer to the index.
    ///
    /// `unadded_bytes` advances the aggregate cursor over bytes that sit
    /// between the end of the previous source and this one without being
    /// indexed themselves.
    ///
    /// # Errors
    ///
    /// [`DeltaError::SourceEmpty`] if the buffer is empty, or shorter than
    /// one window while the index holds nothing else to match against;
    /// [`DeltaError::OutOfMemory`] if the entry arena cannot grow. The
    /// index is unchanged on error.
    pub fn add_source(&mut self, bytes: &'a [u8], unadded_bytes: usize) -> DeltaResult<()> {
        if bytes.is_empty() || (bytes.len() < RABIN_WINDOW && self.entries.is_empty()) {
            return Err(DeltaError::SourceEmpty);
        }
        let source = self.next_source_id()?;
        let mut fresh = Vec::new();
        if bytes.len() >= RABIN_WINDOW {
            sample_backwards(bytes, source, self.stride_for(bytes.len()), &mut fresh)?;
        }
        self.commit(bytes, fresh, unadded_bytes)
    }

    /// Adds a previously produced delta buffer as a source.
    ///
    /// Only the delta's insert payloads are indexed; copy instructions and
    /// their argument bytes re-reference already indexed data and are
    /// skipped. The whole buffer still occupies its full span of aggregate
    /// space, exactly as it would inside a group-compressed stream.
    ///
    /// # Errors
    ///
    /// [`DeltaError::SourceBad`] if the buffer is not a well-formed delta,
    /// [`DeltaError::SourceEmpty`] if it is empty, and
    /// [`DeltaError::OutOfMemory`] on allocation failure. The index is
    /// unchanged on error.
    pub fn add_delta_source(&mut self, bytes: &'a [u8], unadded_bytes: usize) -> DeltaResult<()> {
        if bytes.is_empty() {
            return Err(DeltaError::SourceEmpty);
        }
        let regions = scan::insert_regions(bytes)?;
        let source = self.next_source_id()?;

        let mut fresh = Vec::new();
        for (start, len) in regions {
            let mut prev_hash = None;
            let mut pos = 0;
            while pos + RABIN_WINDOW <= len && start + pos <= u32::MAX as usize {
                let hash = rabin_hash(&bytes[start + pos..]);
                if prev_hash != Some(hash) {
                    fresh.try_reserve(1).map_err(|_| DeltaError::OutOfMemory)?;
                    fresh.push(Entry {
                        hash,
                        source,
                        offset: (start + pos) as u32,
                    });
                    prev_hash = Some(hash);
                }
                pos += RABIN_WINDOW;
            }
        }
        self.commit(bytes, fresh, unadded_bytes)
    }

    /// Encodes `target` against everything indexed so far.
    ///
    /// A `max_delta_size` of zero means unlimited; otherwise the encoder
    /// fails with [`DeltaError::SizeTooBig`] as soon as the output grows
    /// past the limit, returning no partial delta.
    ///
    /// # Errors
    ///
    /// [`DeltaError::IndexNeeded`] when no source has been added,
    /// [`DeltaError::BufferEmpty`] for an empty target,
    /// [`DeltaError::SizeTooBig`] as above, and
    /// [`DeltaError::OutOfMemory`] on allocation failure.
    pub fn make_delta(&self, target: &[u8], max_delta_size: usize) -> DeltaResult<Vec<u8>> {
        encoder::encode(self, target, max_delta_size)
    }

    /// Number of sources added so far.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Total aggregate size: source bytes plus every `unadded_bytes` gap.
    ///
    /// This is the source size the encoder writes into delta headers, so it
    /// also tells the caller how long the concatenated aggregate handed to
    /// the decoder must be.
    #[must_use]
    pub fn total_source_bytes(&self) -> u64 {
        self.total_source_bytes
    }

    /// Number of live entries after bucket pruning.
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.packed.len()
    }

    /// Memory footprint of the index structures in bytes.
    ///
    /// Covers the bucket array, both entry arenas, and the source
    /// descriptors; the borrowed source bytes are not owned and not
    /// counted.
    #[must_use]
    pub fn sizeof(&self) -> usize {
        size_of::<Self>()
            + self.sources.capacity() * size_of::<Source<'_>>()
            + (self.entries.capacity() + self.packed.capacity()) * size_of::<Entry>()
            + self.buckets.capacity() * size_of::<u32>()
    }

    /// Iterates the live entries as `(aggregate offset, hash)` summaries.
    pub fn entries(&self) -> impl Iterator<Item = EntrySummary> + '_ {
        self.packed.iter().map(|entry| EntrySummary {
            aggregate_offset: self.sources[entry.source as usize].agg_offset
                + u64::from(entry.offset),
            hash: entry.hash,
        })
    }

    pub(crate) fn candidates(&self, hash: u32) -> &[Entry] {
        let bucket = (hash & self.hash_mask) as usize;
        let start = self.buckets[bucket] as usize;
        let end = self.buckets[bucket + 1] as usize;
        &self.packed[start..end]
    }

    pub(crate) fn source(&self, id: u16) -> &Source<'a> {
        &self.sources[id as usize]
    }

    fn next_source_id(&self) -> DeltaResult<u16> {
        u16::try_from(self.sources.len()).map_err(|_| DeltaError::OutOfMemory)
    }

    fn stride_for(&self, len: usize) -> usize {
        match self.max_bytes_to_index {
            None => RABIN_WINDOW,
            Some(cap) => {
                let max_samples = (cap / RABIN_WINDOW).max(1);
                len.div_ceil(max_samples).div_ceil(RABIN_WINDOW).max(1) * RABIN_WINDOW
            }
        }
    }

    fn commit(
        &mut self,
        bytes: &'a [u8],
        fresh: Vec<Entry>,
        unadded_bytes: usize,
    ) -> DeltaResult<()> {
        let prev_sources = self.sources.len();
        let prev_entries = self.entries.len();
        let prev_total = self.total_source_bytes;

        let agg_offset = self.total_source_bytes + unadded_bytes as u64;
        if self.sources.try_reserve(1).is_err() || self.entries.try_reserve(fresh.len()).is_err() {
            return Err(DeltaError::OutOfMemory);
        }
        self.sources.push(Source { bytes, agg_offset });
        self.entries.extend(fresh);
        self.total_source_bytes = agg_offset + bytes.len() as u64;

        if let Err(error) = self.rebuild() {
            // leave the index exactly as it was before the call
            self.sources.truncate(prev_sources);
            self.entries.truncate(prev_entries);
            self.total_source_bytes = prev_total;
            return Err(error);
        }

        debug!(
            sources = self.sources.len(),
            entries = self.packed.len(),
            total_source_bytes = self.total_source_bytes,
            "indexed source"
        );
        Ok(())
    }

    /// Rebuilds the packed bucket view from the retained entry list.
    ///
    /// The old `packed`/`buckets` arrays stay in place until the new ones
    /// are complete, so a failure part way through leaves a usable index.
    fn rebuild(&mut self) -> DeltaResult<()> {
        let table_size = table_size(self.entries.len());
        let mask = (table_size - 1) as u32;

        let mut staged = Vec::new();
        staged
            .try_reserve_exact(self.entries.len())
            .map_err(|_| DeltaError::OutOfMemory)?;
        staged.extend_from_slice(&self.entries);
        // stable: entries stay in aggregate order inside each bucket
        staged.sort_by_key(|entry| entry.hash & mask);

        let mut packed = Vec::new();
        packed
            .try_reserve_exact(staged.len())
            .map_err(|_| DeltaError::OutOfMemory)?;
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(table_size + 1)
            .map_err(|_| DeltaError::OutOfMemory)?;
        buckets.push(0);

        let mut start = 0;
        for bucket in 0..table_size as u32 {
            let mut end = start;
            while end < staged.len() && staged[end].hash & mask == bucket {
                end += 1;
            }
            let chain = &staged[start..end];
            if chain.len() <= HASH_LIMIT {
                packed.extend_from_slice(chain);
            } else {
                trace!(bucket, len = chain.len(), "clipping bucket chain");
                self.prune_bucket(chain, &mut packed);
            }
            buckets.push(packed.len() as u32);
            start = end;
        }

        self.packed = packed;
        self.buckets = buckets;
        self.hash_mask = mask;
        Ok(())
    }

    /// Keeps the [`HASH_LIMIT`] lowest-entropy entries of an overfull chain.
    ///
    /// Overfull buckets are dominated by runs of common bytes; entries past
    /// the cap add encode time without finding meaningfully better matches.
    /// Ties fall to the earlier aggregate position, and the survivors go
    /// back in aggregate order.
    fn prune_bucket(&self, chain: &[Entry], packed: &mut Vec<Entry>) {
        let mut scored: Vec<(u8, usize)> = chain
            .iter()
            .enumerate()
            .map(|(position, entry)| (window_entropy(self.window_of(entry)), position))
            .collect();
        scored.sort_by_key(|&(score, position)| (score, position));
        scored.truncate(HASH_LIMIT);
        scored.sort_by_key(|&(_, position)| position);
        packed.extend(scored.iter().map(|&(_, position)| chain[position]));
    }

    pub(crate) fn window_of(&self, entry: &Entry) -> &'a [u8] {
        let source = &self.sources[entry.source as usize];
        &source.bytes[entry.offset as usize..]
    }
}

impl Default for DeltaIndex<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeltaIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeltaIndex({}, {})",
            self.sources.len(),
            self.total_source_bytes
        )
    }
}

/// Samples window-start positions walking backwards through `bytes`.
///
/// Walking backwards collapses a run of identical consecutive hashes onto
/// its lowest position, and the final order puts earlier positions first,
/// which is what makes bucket tie-breaking favour them.
fn sample_backwards(
    bytes: &[u8],
    source: u16,
    stride: usize,
    out: &mut Vec<Entry>,
) -> DeltaResult<()> {
    // the wire format caps copy offsets at 32 bits
    let indexable = bytes.len().min(u32::MAX as usize);
    out.try_reserve((indexable - RABIN_WINDOW) / stride + 1)
        .map_err(|_| DeltaError::OutOfMemory)?;

    let mut pos = indexable - RABIN_WINDOW;
    let mut prev_hash = None;
    loop {
        let hash = rabin_hash(&bytes[pos..]);
        if prev_hash == Some(hash) {
            // keep the lowest of consecutive identical windows
            if let Some(last) = out.last_mut() {
                last.offset = pos as u32;
            }
        } else {
            out.push(Entry {
                hash,
                source,
                offset: pos as u32,
            });
            prev_hash = Some(hash);
        }
        if pos < stride {
            break;
        }
        pos -= stride;
    }
    out.reverse();
    Ok(())
}

/// Largest power of two at most `entry_count`, clamped to the table bounds.
fn table_size(entry_count: usize) -> usize {
    let mut size = MIN_TABLE_SIZE;
    while size < MAX_TABLE_SIZE && size << 1 <= entry_count {
        size <<= 1;
    }
    size
}

/// Number of distinct byte values in the entry's window.
fn window_entropy(window: &[u8]) -> u8 {
    let mut seen = [false; 256];
    let mut distinct = 0u8;
    for &byte in &window[..RABIN_WINDOW] {
        if !seen[byte as usize] {
            seen[byte as usize] = true;
            distinct += 1;
        }
    }
    distinct
}
