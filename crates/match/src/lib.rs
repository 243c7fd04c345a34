#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Match indexing and delta generation for pack-style binary deltas.
//!
//! This crate provides the compression side of the delta engine:
//! - [`DeltaIndex`] indexes one or more source buffers (plain bytes or
//!   previously produced deltas) under a Rabin rolling hash
//! - [`DeltaIndex::make_delta`] encodes a target against everything indexed
//! - [`make_delta`] and [`apply_delta`] are the one-shot façade for the
//!   common single-source case
//!
//! # Design
//!
//! The encoder reuses the rolling hash from the `rabin` crate and the wire
//! format from the `delta` crate. Sources are borrowed slices that must
//! outlive the index; copy instructions refer to the concatenation of all
//! indexed sources in addition order.
//!
//! # See also
//!
//! - [`delta`] crate for the byte format and the verifying applier

mod encoder;
mod index;
mod scan;

pub use delta::{
    apply_delta, apply_delta_to_source, decode_instruction, DeltaError, DeltaResult, Instruction,
};
pub use index::{DeltaIndex, EntrySummary, HASH_LIMIT};

/// Builds a delta turning `source` into `target`, if a useful one exists.
///
/// Returns `None` when the source is too small to index, the target is
/// empty, or the delta would be no smaller than storing the target
/// verbatim - the caller's cue to do exactly that.
///
/// # Examples
///
/// ```
/// use matching::{apply_delta, make_delta};
///
/// let source = b"a buffer with enough content to be worth indexing";
/// let mut target = source.to_vec();
/// target.extend_from_slice(b", extended");
///
/// let delta = make_delta(source, &target).expect("compressible");
/// assert!(delta.len() < target.len());
/// assert_eq!(apply_delta(source, &delta).expect("well-formed"), target);
/// ```
#[must_use]
pub fn make_delta(source: &[u8], target: &[u8]) -> Option<Vec<u8>> {
    let mut index = DeltaIndex::new();
    index.add_source(source, 0).ok()?;
    index.make_delta(target, target.len()).ok()
}
