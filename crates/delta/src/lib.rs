#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Pack-style binary delta wire format.
//!
//! A delta is a byte stream that rebuilds a *target* buffer from a *source*
//! buffer: two LSB-first base-128 varints declare the expected source and
//! target sizes, followed by copy instructions referencing source ranges and
//! insert instructions carrying literal bytes. This crate owns the format
//! itself - the varint codec, the instruction codec, and the verifying
//! applier - while match indexing and encoding live in the `matching` crate.
//!
//! # Design
//!
//! Decoding never trusts its input: all failure modes collapse into the flat
//! [`DeltaError`] taxonomy and a corrupt delta can never cause reads or
//! writes outside the supplied buffers.
//!
//! # See also
//!
//! - The `matching` crate for building deltas in this format.

mod apply;
mod error;
mod instruction;
mod varint;

pub use apply::{apply_delta, apply_delta_to_source, DELTA_SIZE_MIN};
pub use error::{DeltaError, DeltaResult};
pub use instruction::{
    decode_instruction, encode_copy, encode_insert, Instruction, MAX_COPY_SIZE, MAX_INSERT_SIZE,
};
pub use varint::{decode_base128, encode_base128, encoded_len};
