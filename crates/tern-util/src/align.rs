//! Alignment Utilities
//!
//! Word constants and alignment arithmetic for the runtime.

use static_assertions::{const_assert, const_assert_eq};

/// Size of a machine word in bytes.
pub const WORD_BYTES: usize = std::mem::size_of::<usize>();

/// Size of a machine word in bits.
pub const WORD_BITS: usize = WORD_BYTES * 8;

// The heap stores addresses in object slots and tags their low bits, so a
// word must be able to hold a pointer and must be a power of two.
const_assert_eq!(WORD_BYTES, std::mem::size_of::<*const u8>());
const_assert!(WORD_BYTES.is_power_of_two());

/// Convert a word count to bytes.
#[inline]
pub fn words_to_bytes(words: usize) -> usize {
    words * WORD_BYTES
}

/// Convert a byte count to words, rounding up.
///
/// # Examples
/// ```
/// use tern_util::align::bytes_to_words;
/// assert_eq!(bytes_to_words(0), 0);
/// assert_eq!(bytes_to_words(1), 1);
/// assert_eq!(bytes_to_words(8 * 3), 3);
/// ```
#[inline]
pub fn bytes_to_words(bytes: usize) -> usize {
    (bytes + WORD_BYTES - 1) / WORD_BYTES
}

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// # Examples
    /// ```
    /// use tern_util::Alignment;
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// ```
    pub fn align_up(value: usize, alignment: usize) -> usize {
        (value + alignment - 1) & !(alignment - 1)
    }

    /// Align value down to boundary
    pub fn align_down(value: usize, alignment: usize) -> usize {
        value & !(alignment - 1)
    }

    /// Check if value is aligned
    pub fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }

    /// Get alignment padding needed
    pub fn padding(value: usize, alignment: usize) -> usize {
        Self::align_up(value, alignment) - value
    }

    /// Default object alignment (one word)
    pub const DEFAULT: usize = WORD_BYTES;

    /// Cache line alignment (64 bytes)
    pub const CACHE_LINE: usize = 64;

    /// Page alignment (4KB)
    pub const PAGE: usize = 4096;
}
