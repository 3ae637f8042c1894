//! Client Protocol - Runtime/Collector Boundary
//!
//! The collector owns memory and movement; the embedding runtime owns object
//! layout and reachability. These traits are the whole boundary between the
//! two. The collection algorithm is written once against them, and any
//! object model (tagged unions, fixed-layout structs, boxed values) can sit
//! on the other side.
//!
//! All addresses crossing this boundary are word-aligned `usize` byte
//! addresses; all sizes and offsets are in machine words. The heap resolves
//! forwarding before calling back, so a client callback always receives the
//! object's current address.

use crate::heap::{CollectionKind, Heap};

/// The embedding runtime, as seen by the collector.
///
/// One client is wired to a heap for the heap's whole lifetime
/// (`Heap::set_client`). All methods take `&self`: the collector may call
/// back while the runtime is mid-operation, so clients keep their mutable
/// state behind interior mutability.
///
/// Contract obligations, per collection pass:
/// - `visit_roots` reports every externally reachable reference at least
///   once. Reporting the same root twice is harmless; forgetting one frees a
///   live object.
/// - `walk` enumerates each of an object's pointer slots exactly once, in
///   any order.
/// - `size_in_words`/`copied_size_in_words` may differ when moving changes
///   an object's footprint (an object whose identity hash has been taken
///   grows a word to carry it). `copied_size_in_words` is what the collector
///   reserves at the destination, and after `copy` the object's
///   `size_in_words` must report that reserved size.
/// - Word 0 of a live object is always word-aligned (its low bits are
///   clear); the collector claims those bits for forwarding records.
pub trait Client {
    /// Run a collection on the runtime's terms.
    ///
    /// Called by the heap itself when its budget comes under pressure from
    /// scratch allocations: only the runtime can suspend mutators and
    /// compute the live `footprint`, so the heap hands control back with the
    /// kind it wants. The expected implementation suspends mutators and
    /// calls `heap.collect(kind, footprint, pending)`.
    fn collect(&self, heap: &mut Heap, kind: CollectionKind);

    /// Report every root slot to `visitor`.
    fn visit_roots(&self, visitor: &mut dyn Visitor);

    /// Whether `p` is a pinned (fixed) allocation that must not move.
    fn is_fixed(&self, p: usize) -> bool;

    /// Current footprint of the object at `p`, in words.
    fn size_in_words(&self, p: usize) -> usize;

    /// Footprint the object at `p` will have after relocation, in words.
    fn copied_size_in_words(&self, p: usize) -> usize;

    /// Relocate the object: move `size_in_words(src)` words of payload from
    /// `src` into the reserved block at `dst`, applying any move-time
    /// transformation (hash capture, header growth).
    ///
    /// Pointer fields are copied in pre-`follow` form; the collector
    /// corrects them when it walks the new copy.
    fn copy(&self, src: usize, dst: usize);

    /// Enumerate the pointer slots of the object at `p`.
    ///
    /// Calls `walker.visit(offset)` once per pointer-valued word and stops
    /// early if the walker returns `false`.
    fn walk(&self, p: usize, walker: &mut dyn Walker);
}

/// Receives discovered references during root reporting.
///
/// The slot is passed mutably: after the collector evacuates the referent it
/// writes the new address straight back, which is how root slots survive
/// relocation.
pub trait Visitor {
    /// Report one root slot. A slot holding 0 is a null reference and is
    /// left untouched.
    fn visit(&mut self, slot: &mut usize);
}

/// Receives the pointer-slot offsets of one object during `Client::walk`.
pub trait Walker {
    /// Handle the pointer-valued word at `word_offset` from the object
    /// start. Return `false` to stop the walk early.
    fn visit(&mut self, word_offset: usize) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    // The traits must stay object-safe: the heap stores `Rc<dyn Client>`
    // and passes `&mut dyn Visitor`/`&mut dyn Walker` across the boundary.
    #[test]
    fn test_traits_are_object_safe() {
        fn _takes_visitor(_: &mut dyn Visitor) {}
        fn _takes_walker(_: &mut dyn Walker) {}
        fn _takes_client(_: &dyn Client) {}
    }

    struct CountingWalker {
        offsets: Vec<usize>,
        stop_after: usize,
    }

    impl Walker for CountingWalker {
        fn visit(&mut self, word_offset: usize) -> bool {
            self.offsets.push(word_offset);
            self.offsets.len() < self.stop_after
        }
    }

    #[test]
    fn test_walker_early_stop_protocol() {
        let mut walker = CountingWalker {
            offsets: Vec::new(),
            stop_after: 2,
        };

        // A well-behaved client stops as soon as visit returns false.
        for offset in 1..10 {
            if !walker.visit(offset) {
                break;
            }
        }

        assert_eq!(walker.offsets, vec![1, 2]);
    }
}
