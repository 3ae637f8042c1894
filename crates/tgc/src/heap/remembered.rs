//! Remembered Set
//!
//! Slots in tenured, immortal, or pinned memory that may hold nursery
//! addresses. A nursery-only pass treats these slots as roots instead of
//! tracing the old generation; the write barrier (`Heap::mark`) is how they
//! get here. The set holds byte addresses of individual slots, deduplicated,
//! in insertion order.

use indexmap::IndexSet;

use tern_util::align::WORD_BYTES;

#[derive(Default)]
pub(crate) struct RememberedSet {
    slots: IndexSet<usize>,
    recorded: u64,
}

impl RememberedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, slot_address: usize) {
        if self.slots.insert(slot_address) {
            self.recorded += 1;
        }
    }

    /// Record `count` consecutive word slots starting at `base_address`.
    pub fn record_range(&mut self, base_address: usize, count: usize) {
        for index in 0..count {
            match base_address.checked_add(index * WORD_BYTES) {
                Some(slot) => self.record(slot),
                None => {
                    debug_assert!(false, "remembered slot address overflow");
                    return;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lifetime insertions, duplicates excluded.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Take the current slots for processing, leaving the set empty so the
    /// pass can re-record the ones that still matter.
    pub fn take_slots(&mut self) -> IndexSet<usize> {
        std::mem::take(&mut self.slots)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Drop every slot that falls inside one of the given address ranges,
    /// expressed as (start byte address, size in words).
    pub fn purge_ranges(&mut self, ranges: &[(usize, usize)]) {
        if ranges.is_empty() {
            return;
        }
        self.slots.retain(|slot| {
            !ranges
                .iter()
                .any(|&(start, words)| *slot >= start && *slot < start + words * WORD_BYTES)
        });
    }
}
