//! tern-util - Foundation Utilities for the Tern Runtime
//!
//! ============================================================================
//! MODULE OVERVIEW
//! ============================================================================
//!
//! This crate provides the low-level building blocks shared by the Tern
//! runtime crates: word-size constants, alignment arithmetic, and the scratch
//! allocation capability used for memory that lives outside the managed heap
//! (parsing buffers, resolved metadata, collector bookkeeping).
//!
//! DESIGN PRINCIPLES:
//! ------------------
//! 1. WORD-ORIENTED
//!    The managed heap measures everything in machine words. Conversions
//!    between bytes and words live here, in one place, with the rounding
//!    direction spelled out in the function name.
//!
//! 2. EXPLICIT FAILURE
//!    `Allocator::try_allocate` is the only fallible allocation entry point.
//!    `Allocator::allocate` aborts the process on exhaustion rather than
//!    returning a null the caller would have to remember to check.
//!
//! 3. BULK RECLAMATION
//!    `Zone` hands out pointers with no per-allocation free; memory comes
//!    back wholesale on `reset`. Callers that need finer lifetimes use a
//!    dedicated zone per phase.
//!
//! ## Modules
//!
//! - [`align`]: word constants and alignment arithmetic
//! - [`alloc`]: the `Allocator` capability
//! - [`zone`]: bump-arena implementation of `Allocator`

pub mod align;
pub mod alloc;
pub mod zone;

pub use align::{Alignment, WORD_BITS, WORD_BYTES};
pub use alloc::Allocator;
pub use zone::Zone;
