//! Zone - Bump Arena Scratch Memory
//!
//! A `Zone` is the runtime's unit of scratch memory: a bump arena with an
//! optional byte budget, handed around as an [`Allocator`]. Individual
//! `free` calls only adjust accounting; the bytes come back when the zone is
//! reset or dropped. Typical use is one zone per phase (class resolution,
//! collector bookkeeping, native-call marshalling) reset at phase end.

use std::alloc::Layout;
use std::ptr::NonNull;

use bumpalo::Bump;

use crate::align::Alignment;
use crate::alloc::{exhausted, Allocator};

/// Bump arena with allocation accounting and an optional hard budget.
pub struct Zone {
    bump: Bump,
    limit: Option<usize>,
    allocated: usize,
}

impl Zone {
    /// Create an unbounded zone.
    pub fn new() -> Self {
        Self {
            bump: Bump::new(),
            limit: None,
            allocated: 0,
        }
    }

    /// Create a zone that refuses to exceed `limit_bytes` of live
    /// allocations.
    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            bump: Bump::new(),
            limit: Some(limit_bytes),
            allocated: 0,
        }
    }

    /// Bytes currently accounted as live in this zone.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Bytes still available under the budget, if one was set.
    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|l| l.saturating_sub(self.allocated))
    }

    /// Reclaim everything allocated from this zone.
    ///
    /// All pointers previously handed out become dangling.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.allocated = 0;
    }

    /// Allocate `size` bytes at the given alignment, or `None` when the
    /// zone's limit would be exceeded or the layout is invalid.
    pub fn try_allocate_aligned(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return Some(NonNull::dangling());
        }
        if let Some(limit) = self.limit {
            if self.allocated.checked_add(size)? > limit {
                return None;
            }
        }
        let layout = Layout::from_size_align(size, alignment).ok()?;
        let ptr = self.bump.try_alloc_layout(layout).ok()?;
        self.allocated += size;
        Some(ptr)
    }
}

impl Default for Zone {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for Zone {
    fn try_allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.try_allocate_aligned(size, Alignment::DEFAULT)
    }

    fn allocate(&mut self, size: usize, alignment: usize) -> NonNull<u8> {
        match self.try_allocate_aligned(size, alignment) {
            Some(ptr) => ptr,
            None => exhausted(size),
        }
    }

    fn free(&mut self, _ptr: NonNull<u8>, size: usize) {
        // Bytes return on reset; only the budget accounting moves now.
        self.allocated = self.allocated.saturating_sub(size);
    }
}
