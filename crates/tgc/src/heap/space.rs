//! Space - Mapped Bump Segments
//!
//! A `Space` is one contiguous anonymous mapping with a word-granular bump
//! cursor: the unit of memory the collector owns. The nursery is two of
//! these, the tenured generation one (replaced wholesale on a Major pass).
//! The immortal region is the odd one out: memory the runtime supplies
//! pre-populated, which the collector walks but never moves or frees.
//!
//! All object traffic goes through raw word reads/writes against `usize`
//! addresses; the safe wrappers here are the only place those pointers are
//! formed.

use memmap2::MmapMut;

use tern_util::align::{words_to_bytes, Alignment, WORD_BYTES};

use crate::error::Result;
use crate::system::System;

/// Read the word at `addr`.
///
/// # Safety
/// `addr` must be word-aligned and inside a live mapping or registered
/// region.
#[inline]
pub(crate) unsafe fn read_word(addr: usize) -> usize {
    debug_assert!(Alignment::is_aligned(addr, WORD_BYTES));
    (addr as *const usize).read()
}

/// Write `value` to the word at `addr`.
///
/// # Safety
/// Same as [`read_word`], plus the word must be writable.
#[inline]
pub(crate) unsafe fn write_word(addr: usize, value: usize) {
    debug_assert!(Alignment::is_aligned(addr, WORD_BYTES));
    (addr as *mut usize).write(value);
}

/// Zero `count` words starting at `addr`.
///
/// # Safety
/// The whole range must be writable.
#[inline]
pub(crate) unsafe fn zero_words(addr: usize, count: usize) {
    std::ptr::write_bytes(addr as *mut u8, 0, words_to_bytes(count));
}

/// One mapped segment with a bump cursor.
pub(crate) struct Space {
    map: MmapMut,
    base: usize,
    capacity_words: usize,
    cursor_words: usize,
    name: &'static str,
}

impl Space {
    /// Map a zeroed segment of `capacity_words` through the platform seam.
    pub fn map(system: &dyn System, capacity_words: usize, name: &'static str) -> Result<Self> {
        let mut map = system.map(words_to_bytes(capacity_words))?;
        let base = map.as_mut_ptr() as usize;
        debug_assert!(Alignment::is_aligned(base, WORD_BYTES));
        log::debug!(
            "mapped {} segment: {} words at {:#x}",
            name,
            capacity_words,
            base
        );
        Ok(Self {
            map,
            base,
            capacity_words,
            cursor_words: 0,
            name,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn capacity_words(&self) -> usize {
        self.capacity_words
    }

    pub fn cursor_words(&self) -> usize {
        self.cursor_words
    }

    pub fn free_words(&self) -> usize {
        self.capacity_words - self.cursor_words
    }

    pub fn bytes(&self) -> usize {
        self.map.len()
    }

    /// Whether `addr` falls anywhere in the mapped range.
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + words_to_bytes(self.capacity_words)
    }

    /// Whether `addr` falls in the allocated (below-cursor) range. Objects
    /// only ever live here; the gap above the cursor is unreachable by a
    /// well-behaved client.
    pub fn contains_allocated(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + words_to_bytes(self.cursor_words)
    }

    /// Word offset of `addr` from the segment base.
    pub fn offset_of(&self, addr: usize) -> usize {
        debug_assert!(self.contains(addr));
        (addr - self.base) / WORD_BYTES
    }

    /// Address of the word at `word_offset`.
    pub fn address_at(&self, word_offset: usize) -> usize {
        debug_assert!(word_offset <= self.capacity_words);
        self.base + words_to_bytes(word_offset)
    }

    /// Bump-allocate `size_words`, or `None` when the segment is full.
    ///
    /// The returned block is not zeroed; callers that hand memory to the
    /// client zero it first.
    pub fn allocate(&mut self, size_words: usize) -> Option<usize> {
        debug_assert!(size_words > 0);
        let new_cursor = self.cursor_words.checked_add(size_words)?;
        if new_cursor > self.capacity_words {
            return None;
        }
        let addr = self.base + words_to_bytes(self.cursor_words);
        self.cursor_words = new_cursor;
        Some(addr)
    }

    /// Burn one word as a pad marker at the cursor, so linear walkers can
    /// step over the gap it represents. Silently does nothing when the
    /// segment is full.
    pub fn pad(&mut self) {
        if let Some(addr) = self.allocate(1) {
            unsafe { write_word(addr, crate::heap::forward::PAD_WORD) };
        }
    }

    /// Forget all allocations. The bytes stay mapped (and stale) until
    /// overwritten by new allocations.
    pub fn reset(&mut self) {
        self.cursor_words = 0;
    }
}

/// The runtime-supplied permanent region.
///
/// Never moved, never freed, walked linearly every pass: its objects are
/// permanent roots whose fields may point into the moving spaces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImmortalRegion {
    start: usize,
    size_words: usize,
}

impl ImmortalRegion {
    pub fn new(start: usize, size_words: usize) -> Self {
        debug_assert!(Alignment::is_aligned(start, WORD_BYTES));
        debug_assert!(size_words > 0);
        Self { start, size_words }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn size_words(&self) -> usize {
        self.size_words
    }

    pub fn end(&self) -> usize {
        self.start + words_to_bytes(self.size_words)
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end()
    }
}
