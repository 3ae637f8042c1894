//! Allocator Capability
//!
//! The minimal allocation interface threaded through the runtime for memory
//! that lives outside the managed heap. Both the scratch zones and the
//! managed heap's budget-accounted facet implement it, so code that needs
//! temporary storage never cares which arena it is handed.

use std::ptr::NonNull;

/// Fallible/infallible allocation pair with bulk-oriented release.
///
/// Contract:
/// - `try_allocate` is the sole fallible entry point. It returns `None` on
///   exhaustion and leaves recovery to the caller. The returned block is
///   aligned at least to a machine word.
/// - `allocate` never returns on failure: an implementation must abort the
///   process when it cannot satisfy the request. Callers rely on this and do
///   not check the result.
/// - `free` returns a block previously obtained from the same allocator.
///   Arena implementations may treat it as accounting only, with the bytes
///   reclaimed wholesale later.
pub trait Allocator {
    /// Attempt to allocate `size` bytes with word alignment.
    fn try_allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Allocate `size` bytes at `alignment`, aborting the process on
    /// exhaustion.
    fn allocate(&mut self, size: usize, alignment: usize) -> NonNull<u8>;

    /// Return a block of `size` bytes starting at `ptr`.
    fn free(&mut self, ptr: NonNull<u8>, size: usize);
}

/// Abort path shared by `Allocator` implementations.
///
/// Kept out of line so the fast paths stay small.
#[cold]
pub(crate) fn exhausted(size: usize) -> ! {
    eprintln!("tern-util: infallible allocation of {size} bytes failed");
    std::process::abort()
}
