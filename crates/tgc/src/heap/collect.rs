//! Collection Pass Engine
//!
//! One stop-the-world pass, minor or major. The shape is a breadth-first
//! copy: roots are evacuated first, then a scan cursor chases the copy
//! cursor through each destination until no front has work left. Three
//! fronts feed each other and are drained to a joint fixpoint:
//!
//!   - the nursery to-space, scanned linearly behind its bump cursor
//!   - the tenured destination (this pass's promotions, or the whole
//!     replacement segment on a major pass)
//!   - a queue of pinned objects touched for the first time this pass
//!
//! Slot updates happen in place through the client's walk callback, so by
//! the time the fixpoint is reached every live slot holds a current
//! address and every moved object left a forwarding record behind.

use std::rc::Rc;

use tern_util::align::{words_to_bytes, WORD_BYTES};

use crate::client::{Client, Visitor, Walker};
use crate::error::{fatal, HeapError, Result};
use crate::heap::fixie::FixieTouch;
use crate::heap::forward;
use crate::heap::space::{read_word, write_word, Space};
use crate::heap::{CollectionKind, Heap};

/// State for one pass. Created by [`Heap::collect`] and discarded when the
/// pass completes; everything durable lives on the heap itself.
pub(super) struct Pass<'h> {
    heap: &'h mut Heap,
    client: Rc<dyn Client>,
    kind: CollectionKind,
    /// Replacement tenured segment, mapped only for a major pass.
    next_tenured: Option<Space>,
    /// Scan cursor (word offset) in the nursery to-space.
    to_scan: usize,
    /// Scan cursor (word offset) in the tenured destination.
    tenured_scan: usize,
    /// Pinned objects touched this pass and not yet walked.
    fixie_queue: Vec<usize>,
    pub roots_visited: usize,
    pub copied_words: usize,
    pub promoted_words: usize,
    pub fixies_marked: usize,
}

impl<'h> Pass<'h> {
    pub fn new(heap: &'h mut Heap, client: Rc<dyn Client>, kind: CollectionKind) -> Self {
        Self {
            heap,
            client,
            kind,
            next_tenured: None,
            to_scan: 0,
            tenured_scan: 0,
            fixie_queue: Vec::new(),
            roots_visited: 0,
            copied_words: 0,
            promoted_words: 0,
            fixies_marked: 0,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.begin()?;
        self.visit_roots();
        self.walk_immortal();
        self.process_remembered();
        self.scan();
        self.heap.post_visit();
        self.reclaim();
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        // The segment retired by the previous major pass was kept only so
        // stale addresses stayed resolvable until now.
        self.heap.retired_tenured = None;
        self.heap.nursery.begin_pass();
        self.heap.fixies.begin_pass();
        self.tenured_scan = self.heap.tenured.cursor_words();
        if self.kind == CollectionKind::Major {
            let capacity = self.heap.tenured.capacity_words();
            let replacement = Space::map(self.heap.system.as_ref(), capacity, "tenured")?;
            self.next_tenured = Some(replacement);
            self.tenured_scan = 0;
            // A full pass sees every old-to-young edge itself and rebuilds
            // the set from scratch.
            self.heap.remembered.clear();
        }
        // Immortal fixies are permanent roots.
        for address in self.heap.fixies.immortal_addresses() {
            self.touch_fixie(address);
        }
        Ok(())
    }

    fn visit_roots(&mut self) {
        let client = self.client.clone();
        let mut visitor = RootVisitor { pass: self };
        client.visit_roots(&mut visitor);
    }

    /// The immortal region never moves, but its fields can point anywhere,
    /// so every pass walks it end to end.
    fn walk_immortal(&mut self) {
        let Some(region) = self.heap.immortal else {
            return;
        };
        let mut cursor = region.start();
        let end = region.end();
        while cursor < end {
            if unsafe { read_word(cursor) } == forward::PAD_WORD {
                cursor += WORD_BYTES;
                continue;
            }
            let size = self.client.size_in_words(cursor);
            if size == 0 {
                self.contract_violation(cursor, "immortal object reports zero size");
            }
            self.walk_fields(cursor, false);
            cursor += words_to_bytes(size);
        }
    }

    /// Treat remembered old-to-young slots as roots. Slots that no longer
    /// point into the nursery drop out of the set here.
    fn process_remembered(&mut self) {
        if self.kind == CollectionKind::Major {
            debug_assert!(self.heap.remembered.is_empty());
            return;
        }
        let slots = self.heap.remembered.take_slots();
        for slot in slots {
            let value = unsafe { read_word(slot) };
            if value == 0 {
                continue;
            }
            let current = self.evacuate(value);
            if current != value {
                unsafe { write_word(slot, current) };
            }
            if self.heap.nursery.contains(current) {
                self.heap.remembered.record(slot);
            }
        }
    }

    /// Drain all three scan fronts to a joint fixpoint. Walking any object
    /// can feed any front, so the outer loop runs until a full round makes
    /// no progress.
    fn scan(&mut self) {
        loop {
            let mut progress = false;
            while self.to_scan < self.heap.nursery.inactive_space().cursor_words() {
                let address = self.heap.nursery.inactive_space().address_at(self.to_scan);
                self.to_scan += self.scan_object(address, false);
                progress = true;
            }
            while self.tenured_scan < self.tenured_frontier() {
                let address = self.tenured_destination_address(self.tenured_scan);
                self.tenured_scan += self.scan_object(address, true);
                progress = true;
            }
            while let Some(address) = self.fixie_queue.pop() {
                self.scan_fixie(address);
                progress = true;
            }
            if !progress {
                break;
            }
        }
    }

    fn reclaim(&mut self) {
        if let Some(next) = self.next_tenured.take() {
            let old = std::mem::replace(&mut self.heap.tenured, next);
            // Keep the old segment mapped until the next pass begins, so
            // stale addresses can still be followed and classified.
            self.heap.retired_tenured = Some(old);
        }
        self.heap.nursery.end_pass();
    }

    /// Resolve `addr` to its current location, copying the object if this
    /// pass moves it. Every path through here returns an address that is
    /// final for this pass.
    fn evacuate(&mut self, addr: usize) -> usize {
        debug_assert!(addr != 0);
        if let Some(region) = &self.heap.immortal {
            if region.contains(addr) {
                return addr;
            }
        }
        if self.client.is_fixed(addr) {
            self.touch_fixie(addr);
            return addr;
        }
        // Already evacuated to this pass's destinations.
        if self.heap.nursery.inactive_space().contains_allocated(addr) {
            return addr;
        }
        if let Some(next) = &self.next_tenured {
            if next.contains_allocated(addr) {
                return addr;
            }
        }
        if self.heap.nursery.active_space().contains_allocated(addr) {
            return self.copy_from_nursery(addr);
        }
        if self.heap.tenured.contains_allocated(addr) {
            return match self.kind {
                // The tenured generation is stable during a nursery pass.
                CollectionKind::Minor => addr,
                CollectionKind::Major => self.copy_from_tenured(addr),
            };
        }
        self.contract_violation(addr, "address outside any managed space")
    }

    fn copy_from_nursery(&mut self, addr: usize) -> usize {
        if let Some(target) = unsafe { forward::forwarding_target(addr) } {
            return target;
        }
        let age = self.heap.nursery.age_of(addr).saturating_add(1);
        let copied = self.copy_size(addr);
        let mut destination = None;
        if age < self.heap.config.tenure_threshold {
            destination = self.heap.nursery.allocate_to(copied);
            if let Some(dst) = destination {
                self.heap.nursery.set_to_age(dst, age);
            }
        }
        // Old enough, or the to-space is out of room: promote.
        let (dst, promoted) = match destination {
            Some(dst) => (dst, false),
            None => (self.allocate_tenured(copied), true),
        };
        self.client.copy(addr, dst);
        unsafe { forward::install(addr, dst) };
        if promoted {
            self.promoted_words += copied;
        } else {
            self.copied_words += copied;
        }
        dst
    }

    fn copy_from_tenured(&mut self, addr: usize) -> usize {
        if let Some(target) = unsafe { forward::forwarding_target(addr) } {
            return target;
        }
        let copied = self.copy_size(addr);
        let dst = self.allocate_tenured(copied);
        self.client.copy(addr, dst);
        unsafe { forward::install(addr, dst) };
        self.copied_words += copied;
        dst
    }

    /// Allocate in this pass's tenured destination. Survivors must fit;
    /// running out mid-pass is unrecoverable.
    fn allocate_tenured(&mut self, size_words: usize) -> usize {
        let space = self
            .next_tenured
            .as_mut()
            .unwrap_or(&mut self.heap.tenured);
        let available = space.free_words();
        match space.allocate(size_words) {
            Some(dst) => dst,
            None => fatal(&HeapError::OutOfMemory {
                requested_words: size_words,
                available_words: available,
            }),
        }
    }

    fn touch_fixie(&mut self, address: usize) {
        let is_major = self.kind == CollectionKind::Major;
        match self.heap.fixies.touch(address, is_major) {
            Some(FixieTouch::Walk) => {
                self.fixies_marked += 1;
                self.fixie_queue.push(address);
            }
            Some(FixieTouch::Skip) => {
                self.fixies_marked += 1;
            }
            Some(FixieTouch::Seen) => {}
            None => self.contract_violation(address, "pinned address has no fixie record"),
        }
    }

    fn scan_object(&mut self, addr: usize, holder_tenured: bool) -> usize {
        let size = self.client.size_in_words(addr);
        if size == 0 {
            self.contract_violation(addr, "object reports zero size");
        }
        self.walk_fields(addr, holder_tenured);
        size
    }

    fn scan_fixie(&mut self, addr: usize) {
        let holder_tenured = self
            .heap
            .fixies
            .get(addr)
            .map_or(false, |f| f.tenured || f.immortal);
        self.walk_fields(addr, holder_tenured);
    }

    fn walk_fields(&mut self, addr: usize, holder_tenured: bool) {
        let client = self.client.clone();
        let mut walker = ScanWalker {
            pass: self,
            base: addr,
            holder_tenured,
        };
        client.walk(addr, &mut walker);
    }

    /// Copy reservation for an object, taken from the client with the
    /// zero-size contract checked.
    fn copy_size(&mut self, addr: usize) -> usize {
        debug_assert!(self.client.size_in_words(addr) > 0);
        let copied = self.client.copied_size_in_words(addr);
        if copied == 0 {
            self.contract_violation(addr, "object reports zero copied size");
        }
        copied
    }

    fn tenured_frontier(&self) -> usize {
        match &self.next_tenured {
            Some(next) => next.cursor_words(),
            None => self.heap.tenured.cursor_words(),
        }
    }

    fn tenured_destination_address(&self, word_offset: usize) -> usize {
        match &self.next_tenured {
            Some(next) => next.address_at(word_offset),
            None => self.heap.tenured.address_at(word_offset),
        }
    }

    /// The client broke the traversal contract. There is no way to finish
    /// the pass with the object graph half-moved.
    #[cold]
    fn contract_violation(&self, address: usize, detail: &str) -> ! {
        fatal(&HeapError::ClientContract {
            address,
            detail: detail.to_string(),
        })
    }
}

/// Rewrites root slots through [`Pass::evacuate`].
struct RootVisitor<'p, 'h> {
    pass: &'p mut Pass<'h>,
}

impl Visitor for RootVisitor<'_, '_> {
    fn visit(&mut self, slot: &mut usize) {
        self.pass.roots_visited += 1;
        let value = *slot;
        if value != 0 {
            *slot = self.pass.evacuate(value);
        }
    }
}

/// Rewrites object field slots during the scan phase. When the holder is
/// tenured memory and the updated slot still points into the nursery, the
/// slot is recorded so the next nursery pass finds it without tracing the
/// old generation.
struct ScanWalker<'p, 'h> {
    pass: &'p mut Pass<'h>,
    base: usize,
    holder_tenured: bool,
}

impl Walker for ScanWalker<'_, '_> {
    fn visit(&mut self, word_offset: usize) -> bool {
        let slot = self.base + words_to_bytes(word_offset);
        let value = unsafe { read_word(slot) };
        if value == 0 {
            return true;
        }
        let current = self.pass.evacuate(value);
        if current != value {
            unsafe { write_word(slot, current) };
        }
        if self.holder_tenured && self.pass.heap.nursery.contains(current) {
            self.pass.heap.remembered.record(slot);
        }
        true
    }
}
