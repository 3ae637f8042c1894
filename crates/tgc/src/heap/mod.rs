//! Heap Module - Generational Copying Collector
//!
//! The heap owns three kinds of managed memory and one registry:
//!
//!   - a nursery of two semispaces, where everything is born
//!   - a tenured segment for objects that survived enough passes,
//!     evacuated wholesale on a major pass
//!   - an optional immortal region the runtime registers, walked but
//!     never moved or reclaimed
//!   - a registry of fixies: pinned allocations carved from caller
//!     memory, traced in place
//!
//! Everything is stop-the-world. The runtime decides when to collect
//! (usually from its allocation slow path), hands over its roots through
//! the [`Client`] protocol, and by the time [`Heap::collect`] returns,
//! every root slot holds a current address. Stale addresses the runtime
//! squirreled away elsewhere can be brought current with [`Heap::follow`]
//! and classified with [`Heap::status`] until the next pass begins.
//!
//! A single word budget covers the active nursery semispace, the tenured
//! segment, fixed allocations, and collector scratch. The immortal region
//! is the runtime's memory and is not charged.

mod collect;
mod fixie;
mod forward;
mod nursery;
mod remembered;
mod space;

pub use self::forward::PAD_WORD;

use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;

use tern_util::align::{bytes_to_words, words_to_bytes, Alignment, WORD_BYTES};
use tern_util::{Allocator, Zone};

use crate::client::{Client, Walker};
use crate::config::HeapConfig;
use crate::error::{fatal, HeapError, Result};
use crate::logging::{log_event, HeapEvent};
use crate::stats::{HeapStats, PassSummary};
use crate::system::System;

use self::collect::Pass;
use self::fixie::FixieSet;
use self::nursery::Nursery;
use self::remembered::RememberedSet;
use self::space::{zero_words, ImmortalRegion, Space};

/// Which generations a pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    /// Nursery only; the tenured generation is treated as stable.
    Minor,
    /// The whole heap: nursery and tenured, with the remembered set
    /// rebuilt from what the pass actually sees.
    Major,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Minor => write!(f, "minor"),
            CollectionKind::Major => write!(f, "major"),
        }
    }
}

/// Classification of an address against the most recent pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The null reference, or an address the collector does not manage.
    Null,
    /// A live young object, at its current address.
    Reachable,
    /// The last pass found no path to this object.
    Unreachable,
    /// Lives in tenured, immortal, or tenured-pinned memory.
    Tenured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeapState {
    Idle,
    Collecting,
}

/// The collector. One per runtime instance; not thread-safe, matching the
/// stop-the-world design.
pub struct Heap {
    config: HeapConfig,
    system: Arc<dyn System>,
    client: Option<Rc<dyn Client>>,
    nursery: Nursery,
    tenured: Space,
    /// Tenured segment replaced by the last major pass, kept mapped until
    /// the next pass so stale addresses stay resolvable.
    retired_tenured: Option<Space>,
    immortal: Option<ImmortalRegion>,
    fixies: FixieSet,
    remembered: RememberedSet,
    scratch: Zone,
    scratch_words: usize,
    limit_words: usize,
    state: HeapState,
    active_kind: Option<CollectionKind>,
    last_kind: Option<CollectionKind>,
    post_visited: bool,
    /// Anything happened since the last pass that could change what a
    /// pass would find.
    dirty: bool,
    pass_count: u64,
    stats: HeapStats,
}

/// Build a heap with the default configuration and the given budget.
pub fn make_heap(system: Arc<dyn System>, limit_in_bytes: usize) -> Result<Heap> {
    Heap::with_config(
        system,
        HeapConfig {
            limit_bytes: limit_in_bytes,
            ..HeapConfig::default()
        },
    )
}

impl Heap {
    pub fn with_config(system: Arc<dyn System>, config: HeapConfig) -> Result<Self> {
        config.validate()?;
        let semispace_words = config.semispace_words();
        let limit_words = config.limit_words();
        // Page rounding can push an explicit semispace size past what the
        // budget can hold.
        if semispace_words.saturating_mul(2) > limit_words {
            return Err(HeapError::Configuration(format!(
                "two semispaces of {semispace_words} words exceed the {limit_words} word budget"
            )));
        }
        let nursery = Nursery::new(system.as_ref(), semispace_words)?;
        let tenured = Space::map(system.as_ref(), limit_words, "tenured")?;
        if config.verbose {
            log_event(HeapEvent::Init {
                limit_words,
                semispace_words,
            });
        }
        log::info!(
            "collector ready: {} word budget, {} word semispaces",
            limit_words,
            semispace_words
        );
        Ok(Self {
            config,
            system,
            client: None,
            nursery,
            tenured,
            retired_tenured: None,
            immortal: None,
            fixies: FixieSet::new(),
            remembered: RememberedSet::new(),
            scratch: Zone::new(),
            scratch_words: 0,
            limit_words,
            state: HeapState::Idle,
            active_kind: None,
            last_kind: None,
            post_visited: false,
            dirty: false,
            pass_count: 0,
            stats: HeapStats::default(),
        })
    }

    /// Wire the runtime's side of the traversal protocol. Must happen
    /// before the first collection.
    pub fn set_client(&mut self, client: Rc<dyn Client>) {
        debug_assert!(self.client.is_none(), "client wired twice");
        self.client = Some(client);
    }

    /// Register the runtime's permanent region. Its objects are walked
    /// every pass but never move; the memory is not charged against the
    /// budget. The region must be densely packed client objects, with
    /// [`PAD_WORD`] filling any alignment gaps.
    pub fn set_immortal_heap(&mut self, start: usize, size_in_words: usize) {
        debug_assert_eq!(self.state, HeapState::Idle);
        debug_assert!(self.immortal.is_none(), "immortal region registered twice");
        debug_assert!(Alignment::is_aligned(start, WORD_BYTES));
        self.immortal = Some(ImmortalRegion::new(start, size_in_words));
        self.dirty = true;
        if self.config.verbose {
            log_event(HeapEvent::ImmortalRegistered {
                size_words: size_in_words,
            });
        }
        log::debug!("immortal region registered: {size_in_words} words at {start:#x}");
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// The overall word budget.
    pub fn limit(&self) -> usize {
        self.limit_words
    }

    /// Words of budget not currently occupied.
    pub fn remaining(&self) -> usize {
        self.limit_words.saturating_sub(self.occupied_words())
    }

    /// Whether an allocation of `pending_words` would overrun either the
    /// nursery or the overall budget.
    pub fn limit_exceeded(&self, pending_words: usize) -> bool {
        self.nursery.free_words() < pending_words || self.budget_exceeded(pending_words)
    }

    /// Allocate a young object. The returned words are zeroed.
    ///
    /// Does not collect on failure; the runtime's allocation slow path
    /// decides when and how to collect.
    pub fn allocate(&mut self, size_in_words: usize) -> Result<usize> {
        if self.state != HeapState::Idle {
            return Err(HeapError::InvalidState {
                expected: "idle heap".into(),
                actual: "collection in progress".into(),
            });
        }
        if size_in_words == 0 {
            return Err(HeapError::InvalidState {
                expected: "allocation of at least one word".into(),
                actual: "zero words".into(),
            });
        }
        if self.budget_exceeded(size_in_words) {
            return Err(self.allocation_failure(size_in_words));
        }
        match self.nursery.allocate(size_in_words) {
            Some(address) => {
                // The semispace may hold stale bytes from two passes ago.
                unsafe { zero_words(address, size_in_words) };
                self.dirty = true;
                Ok(address)
            }
            None => Err(self.allocation_failure(size_in_words)),
        }
    }

    /// Budget charge for a pinned object with `size_in_words` of payload.
    pub fn fixed_footprint(&self, size_in_words: usize) -> usize {
        size_in_words
    }

    /// Carve a pinned object out of `allocator`'s memory and register it
    /// for in-place tracing. The words are zeroed. The caller's allocator
    /// owns the bytes; the collector only ever forgets its record.
    pub fn allocate_fixed(
        &mut self,
        allocator: &mut dyn Allocator,
        size_in_words: usize,
    ) -> Result<usize> {
        self.allocate_fixed_inner(allocator, size_in_words, false)
    }

    /// Like [`Heap::allocate_fixed`], but the object is treated as a
    /// permanent root and never charged against the budget.
    pub fn allocate_immortal_fixed(
        &mut self,
        allocator: &mut dyn Allocator,
        size_in_words: usize,
    ) -> Result<usize> {
        self.allocate_fixed_inner(allocator, size_in_words, true)
    }

    fn allocate_fixed_inner(
        &mut self,
        allocator: &mut dyn Allocator,
        size_in_words: usize,
        immortal: bool,
    ) -> Result<usize> {
        if self.state != HeapState::Idle {
            return Err(HeapError::InvalidState {
                expected: "idle heap".into(),
                actual: "collection in progress".into(),
            });
        }
        if size_in_words == 0 {
            return Err(HeapError::InvalidState {
                expected: "allocation of at least one word".into(),
                actual: "zero words".into(),
            });
        }
        let footprint = self.fixed_footprint(size_in_words);
        if !immortal && self.budget_exceeded(footprint) {
            return Err(self.allocation_failure(footprint));
        }
        let bytes = words_to_bytes(size_in_words);
        let ptr = allocator
            .try_allocate(bytes)
            .ok_or(HeapError::OutOfMemory {
                requested_words: size_in_words,
                available_words: self.remaining(),
            })?;
        let address = ptr.as_ptr() as usize;
        debug_assert!(Alignment::is_aligned(address, WORD_BYTES));
        unsafe { zero_words(address, size_in_words) };
        self.fixies.insert(address, size_in_words, immortal);
        self.stats.fixies_allocated += 1;
        self.dirty = true;
        Ok(address)
    }

    /// Write barrier: record that `count` slots of the object at `p`,
    /// starting `word_offset` words in, may now hold nursery addresses.
    ///
    /// Only matters when `p` lives outside the nursery; young holders are
    /// traced every pass anyway and are ignored here.
    pub fn mark(&mut self, p: usize, word_offset: usize, count: usize) {
        debug_assert_eq!(self.state, HeapState::Idle, "mark during a pass");
        if p == 0 || count == 0 {
            return;
        }
        if self.nursery.contains(p) {
            return;
        }
        debug_assert!(
            self.tenured.contains_allocated(p)
                || self.fixies.contains(p)
                || self.immortal.map_or(false, |r| r.contains(p)),
            "mark on unmanaged holder {p:#x}"
        );
        let Some(base) = p.checked_add(words_to_bytes(word_offset)) else {
            return;
        };
        self.remembered.record_range(base, count);
        self.dirty = true;
    }

    /// Reserve one pad word in the segment holding `p`, so a later copy of
    /// the object can grow by a word without overrunning the segment.
    /// Linear walkers skip the marker.
    pub fn pad(&mut self, p: usize) {
        if p == 0 {
            return;
        }
        if self.nursery.active_space().contains_allocated(p) {
            self.nursery.active_space_mut().pad();
            self.dirty = true;
        } else if self.tenured.contains_allocated(p) {
            self.tenured.pad();
            self.dirty = true;
        }
        // Fixed and immortal memory has no bump cursor to pad.
    }

    /// Resolve `p` through any chain of forwarding records to its current
    /// address. Identity for null, unmanaged, and unmoved addresses.
    pub fn follow(&self, p: usize) -> usize {
        if p == 0 {
            return 0;
        }
        let mut current = p;
        while self.forwardable(current) {
            match unsafe { forward::forwarding_target(current) } {
                Some(target) if target != 0 => current = target,
                _ => break,
            }
        }
        current
    }

    /// Classify `p` against the most recent pass.
    ///
    /// Forwarded addresses answer with the status of their target, so a
    /// stale address held across a pass still classifies correctly until
    /// the next pass begins.
    pub fn status(&self, p: usize) -> Status {
        if p == 0 || !Alignment::is_aligned(p, WORD_BYTES) {
            return Status::Null;
        }
        if let Some(region) = &self.immortal {
            if region.contains(p) {
                return Status::Tenured;
            }
        }
        if let Some(record) = self.fixies.get(p) {
            return if record.dead {
                Status::Unreachable
            } else if record.immortal || record.tenured {
                Status::Tenured
            } else {
                Status::Reachable
            };
        }
        if self.tenured.contains_allocated(p) {
            return Status::Tenured;
        }
        if let Some(retired) = &self.retired_tenured {
            if retired.contains_allocated(p) {
                return self.forwarded_status(p);
            }
        }
        if self.nursery.active_space().contains_allocated(p) {
            return Status::Reachable;
        }
        if self.nursery.inactive_space().contains_allocated(p) {
            return self.forwarded_status(p);
        }
        Status::Null
    }

    /// Run a collection now. `footprint_words` plus
    /// `pending_allocation_words` is the postcondition: at least that much
    /// budget must be free afterwards, or the process aborts.
    ///
    /// A minor request escalates to major up front when the budget or the
    /// tenured headroom says a nursery pass cannot help, and after the
    /// fact when the postcondition still fails.
    pub fn collect(
        &mut self,
        kind: CollectionKind,
        footprint_words: usize,
        pending_allocation_words: usize,
    ) {
        if let Err(err) = self.try_collect(kind, footprint_words, pending_allocation_words) {
            fatal(&err);
        }
    }

    /// [`Heap::collect`] with the failure surfaced instead of aborting.
    pub fn try_collect(
        &mut self,
        requested: CollectionKind,
        footprint_words: usize,
        pending_allocation_words: usize,
    ) -> Result<()> {
        if self.state == HeapState::Collecting {
            return Err(HeapError::InvalidState {
                expected: "idle heap".into(),
                actual: "re-entrant collect".into(),
            });
        }
        if self.client.is_none() {
            return Err(HeapError::InvalidState {
                expected: "client wired before collect".into(),
                actual: "no client".into(),
            });
        }
        let target = footprint_words
            .checked_add(pending_allocation_words)
            .ok_or(HeapError::OutOfMemory {
                requested_words: usize::MAX,
                available_words: self.remaining(),
            })?;

        // Nothing changed since the last pass and the postcondition
        // already holds: revalidate and return.
        if !self.dirty
            && self.covered_by_last(requested)
            && self.remaining() >= target
            && !self.limit_exceeded(pending_allocation_words)
        {
            self.stats.noop_collects += 1;
            log::debug!(
                "collect revalidated without a pass: {} words remain",
                self.remaining()
            );
            return Ok(());
        }

        let mut kind = requested;
        let mut escalated = false;
        if kind == CollectionKind::Minor && self.must_escalate(pending_allocation_words) {
            kind = CollectionKind::Major;
            escalated = true;
        }
        self.run_pass(kind, escalated, "requested")?;
        if self.remaining() < target && kind == CollectionKind::Minor {
            // The nursery pass freed too little; take the whole heap.
            escalated = true;
            self.run_pass(CollectionKind::Major, escalated, "postcondition")?;
        }
        if self.remaining() < target {
            return Err(HeapError::OutOfMemory {
                requested_words: target,
                available_words: self.remaining(),
            });
        }
        Ok(())
    }

    /// End-of-pass bookkeeping: fixie verdicts are settled here. Runs once
    /// per pass; the engine calls it after the scan fixpoint, and a second
    /// call in the same pass does nothing.
    pub fn post_visit(&mut self) {
        debug_assert_eq!(self.state, HeapState::Collecting, "post_visit outside a pass");
        if self.state != HeapState::Collecting || self.post_visited {
            return;
        }
        self.post_visited = true;
        let is_major = self.active_kind == Some(CollectionKind::Major);
        let outcome = self
            .fixies
            .sweep(self.config.fixie_threshold(), is_major);
        // A fixie that tenured this pass may hold nursery references that
        // never went through the write barrier. Remember all of its slots;
        // the next nursery pass drops the ones that turn out to be old.
        if let Some(client) = self.client.clone() {
            for address in &outcome.newly_tenured {
                let mut recorder = SlotRecorder {
                    base: *address,
                    remembered: &mut self.remembered,
                };
                client.walk(*address, &mut recorder);
            }
        }
        if outcome.marked > 0 || !outcome.newly_tenured.is_empty() || outcome.died > 0 {
            log::debug!(
                "fixie sweep: {} marked, {} tenured, {} died",
                outcome.marked,
                outcome.newly_tenured.len(),
                outcome.died
            );
        }
    }

    /// Forget every transient fixie record. The caller's allocators own
    /// the bytes and are free to reuse them once this returns; immortal
    /// fixies keep their records.
    pub fn dispose_fixies(&mut self) {
        debug_assert_eq!(self.state, HeapState::Idle, "dispose_fixies during a pass");
        let disposed = self.fixies.dispose_transient();
        if disposed.count == 0 {
            return;
        }
        // Remembered slots inside the disposed objects must not be read
        // by a later pass.
        self.remembered.purge_ranges(&disposed.ranges);
        self.stats.fixies_disposed += disposed.count as u64;
        self.dirty = true;
        if self.config.verbose {
            log_event(HeapEvent::FixiesDisposed {
                count: disposed.count,
                words: disposed.words,
            });
        }
        log::debug!(
            "disposed {} fixed allocations ({} words)",
            disposed.count,
            disposed.words
        );
    }

    /// Tear the heap down. Consuming the heap makes use-after-dispose a
    /// compile error; all mappings and records are released here.
    pub fn dispose(self) {}

    fn run_pass(&mut self, kind: CollectionKind, escalated: bool, reason: &str) -> Result<()> {
        let client = self.client.clone().ok_or_else(|| HeapError::InvalidState {
            expected: "client wired before collect".into(),
            actual: "no client".into(),
        })?;
        let pass = self.pass_count + 1;
        if self.config.verbose {
            log_event(HeapEvent::PassStart {
                pass,
                kind: kind.to_string(),
                reason: reason.to_string(),
            });
        }
        let occupied_before = self.occupied_words();
        let started = self.system.now();
        self.state = HeapState::Collecting;
        self.active_kind = Some(kind);
        self.post_visited = false;

        let mut engine = Pass::new(self, client, kind);
        let run = engine.run();
        let roots_visited = engine.roots_visited;
        let copied_words = engine.copied_words;
        let promoted_words = engine.promoted_words;
        let fixies_marked = engine.fixies_marked;
        drop(engine);

        self.state = HeapState::Idle;
        self.active_kind = None;
        run?;

        let duration = self.system.now().duration_since(started);
        self.last_kind = Some(kind);
        self.dirty = false;
        self.pass_count = pass;
        let occupied_after = self.occupied_words();
        let reclaimed_words = occupied_before.saturating_sub(occupied_after);
        let summary = PassSummary {
            pass,
            kind,
            escalated,
            roots_visited,
            copied_words,
            promoted_words,
            reclaimed_words,
            fixies_marked,
            duration,
        };
        self.stats.record_pass(&summary);
        if self.config.verbose {
            log_event(HeapEvent::PassEnd {
                pass,
                kind: kind.to_string(),
                duration_ms: duration.as_secs_f64() * 1000.0,
                copied_words,
                promoted_words,
                reclaimed_words,
            });
            log_event(HeapEvent::Occupancy {
                occupied_words: occupied_after,
                limit_words: self.limit_words,
                utilization: if self.limit_words > 0 {
                    occupied_after as f64 / self.limit_words as f64 * 100.0
                } else {
                    0.0
                },
            });
        }
        log::debug!(
            "pass {pass} ({kind}) complete: {copied_words} copied, {promoted_words} promoted, {reclaimed_words} reclaimed"
        );
        Ok(())
    }

    /// Active nursery semispace, tenured segment, fixed allocations, and
    /// scratch. The immortal region is the runtime's memory, not ours.
    fn occupied_words(&self) -> usize {
        self.nursery.active_space().cursor_words()
            + self.tenured.cursor_words()
            + self.fixies.footprint_words()
            + self.scratch_words
    }

    fn budget_exceeded(&self, pending_words: usize) -> bool {
        self.occupied_words()
            .checked_add(pending_words)
            .map_or(true, |total| total > self.limit_words)
    }

    fn must_escalate(&self, pending_words: usize) -> bool {
        // When the budget is already blown, or the tenured segment lacks
        // room for a nursery's worth of survivors, a minor pass cannot
        // establish the postcondition.
        let survivor_bound = self.nursery.active_space().cursor_words();
        self.budget_exceeded(pending_words) || self.tenured.free_words() < survivor_bound
    }

    fn covered_by_last(&self, requested: CollectionKind) -> bool {
        match (requested, self.last_kind) {
            (CollectionKind::Minor, Some(_)) => true,
            (CollectionKind::Major, Some(CollectionKind::Major)) => true,
            _ => false,
        }
    }

    fn allocation_failure(&self, size_in_words: usize) -> HeapError {
        let available = self.remaining().min(self.nursery.free_words());
        if self.config.verbose {
            log_event(HeapEvent::AllocationFailure {
                size_words: size_in_words,
                remaining_words: available,
            });
        }
        HeapError::OutOfMemory {
            requested_words: size_in_words,
            available_words: available,
        }
    }

    /// Whether word 0 of `addr` may legitimately hold a forwarding record.
    fn forwardable(&self, addr: usize) -> bool {
        if !Alignment::is_aligned(addr, WORD_BYTES) {
            return false;
        }
        self.nursery.active_space().contains_allocated(addr)
            || self.nursery.inactive_space().contains_allocated(addr)
            || self.tenured.contains_allocated(addr)
            || self
                .retired_tenured
                .as_ref()
                .map_or(false, |s| s.contains_allocated(addr))
    }

    fn forwarded_status(&self, p: usize) -> Status {
        match unsafe { forward::forwarding_target(p) } {
            Some(target) if target != 0 => self.status(target),
            _ => Status::Unreachable,
        }
    }

    fn scratch_allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if self.state != HeapState::Idle {
            return None;
        }
        let words = bytes_to_words(size);
        if self.budget_exceeded(words) {
            return None;
        }
        let ptr = self.scratch.try_allocate_aligned(size, alignment)?;
        self.scratch_words += words;
        Some(ptr)
    }
}

/// Records every reference slot of one object into the remembered set.
struct SlotRecorder<'a> {
    base: usize,
    remembered: &'a mut RememberedSet,
}

impl Walker for SlotRecorder<'_> {
    fn visit(&mut self, word_offset: usize) -> bool {
        self.remembered.record(self.base + word_offset * WORD_BYTES);
        true
    }
}

/// The collector's scratch facet: word-budgeted bump memory for the
/// runtime's own transient structures. The infallible path collects
/// through the client once before giving up.
impl Allocator for Heap {
    fn try_allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.scratch_allocate(size, Alignment::DEFAULT)
    }

    fn allocate(&mut self, size: usize, alignment: usize) -> NonNull<u8> {
        if let Some(ptr) = self.scratch_allocate(size, alignment) {
            return ptr;
        }
        if let Some(client) = self.client.clone() {
            if self.config.verbose {
                log_event(HeapEvent::ScratchPressure {
                    requested_bytes: size,
                });
            }
            client.collect(self, CollectionKind::Minor);
            if let Some(ptr) = self.scratch_allocate(size, alignment) {
                return ptr;
            }
        }
        fatal(&HeapError::OutOfMemory {
            requested_words: bytes_to_words(size),
            available_words: self.remaining(),
        })
    }

    fn free(&mut self, ptr: NonNull<u8>, size: usize) {
        self.scratch_words = self.scratch_words.saturating_sub(bytes_to_words(size));
        self.scratch.free(ptr, size);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if self.config.verbose {
            log_event(HeapEvent::Shutdown {
                passes: self.pass_count,
            });
        }
        log::debug!("heap disposed after {} passes", self.pass_count);
    }
}
