#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Rabin rolling hash over fixed 16-byte windows.
//!
//! The crate exposes the polynomial fingerprint used by pack-style binary
//! delta encoders to locate candidate matches: [`rabin_hash`] hashes one
//! window from scratch, and [`RabinWindow`] slides a window across a buffer
//! one byte at a time in O(1) per step. Both produce identical values for
//! identical windows, which is the property the match index relies on when
//! it seeds hashes in the source and rolls them across the target.

mod tables;

use tables::{T, U};

/// Width in bytes of the hashed window.
pub const RABIN_WINDOW: usize = 16;

/// Right shift selecting the table index from the current hash value.
const RABIN_SHIFT: u32 = 23;

/// Feeds one byte into the fingerprint.
///
/// The table lookup stays in bounds because `T` clears bit 31 whenever the
/// shift would set it, so `hash >> RABIN_SHIFT` never exceeds 255.
#[inline]
fn push(hash: u32, byte: u8) -> u32 {
    ((hash << 8) | u32::from(byte)) ^ T[(hash >> RABIN_SHIFT) as usize]
}

/// Computes the Rabin hash of the first [`RABIN_WINDOW`] bytes of `data`.
///
/// # Panics
///
/// Panics if `data` is shorter than [`RABIN_WINDOW`].
#[must_use]
pub fn rabin_hash(data: &[u8]) -> u32 {
    let mut hash = 0u32;
    for &byte in &data[..RABIN_WINDOW] {
        hash = push(hash, byte);
    }
    hash
}

/// A 16-byte window sliding across a buffer, with its hash kept current.
///
/// Rolling cancels the outgoing byte immediately before the incoming byte is
/// pushed, so after any number of [`roll`](Self::roll) calls the value equals
/// [`rabin_hash`] of the bytes currently in the window.
///
/// # Examples
///
/// ```
/// use rabin::{rabin_hash, RabinWindow, RABIN_WINDOW};
///
/// let data = b"the window rolls one byte at a time";
/// let mut window = RabinWindow::new(&data[..RABIN_WINDOW]);
/// window.roll(data[RABIN_WINDOW]);
/// assert_eq!(window.hash(), rabin_hash(&data[1..]));
/// ```
#[derive(Clone, Debug)]
pub struct RabinWindow {
    window: [u8; RABIN_WINDOW],
    pos: usize,
    hash: u32,
}

impl RabinWindow {
    /// Seeds a window from the first [`RABIN_WINDOW`] bytes of `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `seed` is shorter than [`RABIN_WINDOW`].
    #[must_use]
    pub fn new(seed: &[u8]) -> Self {
        let mut window = [0u8; RABIN_WINDOW];
        window.copy_from_slice(&seed[..RABIN_WINDOW]);
        Self {
            window,
            pos: 0,
            hash: rabin_hash(&window),
        }
    }

    /// Slides the window forward by one byte.
    ///
    /// The oldest byte leaves the window and `incoming` enters it.
    pub fn roll(&mut self, incoming: u8) {
        let outgoing = self.window[self.pos];
        self.hash = push(self.hash ^ U[outgoing as usize], incoming);
        self.window[self.pos] = incoming;
        self.pos = (self.pos + 1) % RABIN_WINDOW;
    }

    /// Returns the hash of the bytes currently in the window.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }
}
