//! # TGC - Generational Copying Collector
//!
//! TGC is the stop-the-world, generational, copying garbage collector for
//! the Tern runtime. It is the memory engine a language VM embeds: the VM
//! keeps its own object model and hands the collector a small traversal
//! protocol; the collector keeps the spaces, the budget, and the passes.
//!
//! ## Overview
//!
//! TGC implements a classic two-generation copying design:
//!
//! - **Nursery semispaces**: all objects are born in a small active
//!   semispace; survivors are copied to its twin and the roles flip
//! - **Breadth-first evacuation**: roots first, then a scan cursor chases
//!   the copy cursor until the live closure is exhausted
//! - **In-band forwarding**: word 0 of a moved object becomes its new
//!   address with a low tag bit; `follow` resolves stale addresses
//! - **Tenuring by age**: an out-of-band age table promotes objects that
//!   survive enough passes into a tenured segment, evacuated wholesale
//!   only by major passes
//! - **Remembered set**: a write barrier keeps old-to-young edges visible
//!   to nursery-only passes without tracing the old generation
//! - **Fixies**: pinned allocations carved from caller memory, traced and
//!   aged in place, never moved
//! - **Word budget**: one limit covers the active semispace, the tenured
//!   segment, fixed allocations, and collector scratch
//!
//! ## Quick Start
//!
//! The embedding runtime implements [`Client`] over its object model. The
//! example below uses the simplest possible model: word 0 holds the object
//! size shifted left three bits (so its low bits are clear, as the
//! protocol requires), and every following word is a reference slot.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use tgc::{make_heap, Client, CollectionKind, Heap, HostSystem, Status, Visitor, Walker};
//!
//! struct Runtime {
//!     roots: RefCell<Vec<usize>>,
//! }
//!
//! impl Client for Runtime {
//!     fn collect(&self, heap: &mut Heap, kind: CollectionKind) {
//!         heap.collect(kind, 0, 0);
//!     }
//!     fn visit_roots(&self, visitor: &mut dyn Visitor) {
//!         for slot in self.roots.borrow_mut().iter_mut() {
//!             visitor.visit(slot);
//!         }
//!     }
//!     fn is_fixed(&self, _p: usize) -> bool {
//!         false
//!     }
//!     fn size_in_words(&self, p: usize) -> usize {
//!         unsafe { *(p as *const usize) >> 3 }
//!     }
//!     fn copied_size_in_words(&self, p: usize) -> usize {
//!         self.size_in_words(p)
//!     }
//!     fn copy(&self, src: usize, dst: usize) {
//!         let words = self.size_in_words(src);
//!         unsafe {
//!             std::ptr::copy_nonoverlapping(src as *const usize, dst as *mut usize, words);
//!         }
//!     }
//!     fn walk(&self, p: usize, walker: &mut dyn Walker) {
//!         for offset in 1..self.size_in_words(p) {
//!             if !walker.visit(offset) {
//!                 return;
//!             }
//!         }
//!     }
//! }
//!
//! let runtime = Rc::new(Runtime { roots: RefCell::new(Vec::new()) });
//! let mut heap = make_heap(Arc::new(HostSystem), 1024 * 1024)?;
//! heap.set_client(runtime.clone());
//!
//! // Allocate a two-word object and root it.
//! let obj = heap.allocate(2)?;
//! unsafe { *(obj as *mut usize) = 2 << 3 };
//! runtime.roots.borrow_mut().push(obj);
//!
//! heap.collect(CollectionKind::Minor, 0, 0);
//!
//! // The pass rewrote the root; the old address still resolves.
//! let current = runtime.roots.borrow()[0];
//! assert_ne!(current, obj);
//! assert_eq!(heap.follow(obj), current);
//! assert_eq!(heap.status(current), Status::Reachable);
//!
//! heap.dispose();
//! # Ok::<(), tgc::HeapError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Embedding Runtime                        │
//! │   object model, roots, write barrier calls, allocation       │
//! │                    slow path decides to collect              │
//! └───────────────┬─────────────────────────────▲───────────────┘
//!                 │ Client / Visitor / Walker   │ follow, status
//! ┌───────────────▼─────────────────────────────┴───────────────┐
//! │                          Heap                                │
//! │                                                              │
//! │  nursery          tenured         immortal       fixies      │
//! │  ┌────┐┌────┐     ┌─────────┐    ┌─────────┐   ┌──┐┌──┐     │
//! │  │from││ to │ ──▶ │ segment │    │ runtime │   │▪ ││▪ │     │
//! │  └────┘└────┘     └─────────┘    │  image  │   └──┘└──┘     │
//! │   age tables       replaced on    └─────────┘    pinned,     │
//! │   per semispace    major passes    walked,       traced      │
//! │                                    never moved   in place    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Pass Phases
//!
//! 1. **Begin**: reset the destination semispace; on a major pass, map a
//!    replacement tenured segment and clear the remembered set
//! 2. **Roots**: the client reports every root slot; each is rewritten to
//!    the object's current address
//! 3. **Immortal walk**: the permanent region is walked end to end
//! 4. **Remembered slots** (minor only): old-to-young slots act as roots
//! 5. **Scan**: the three fronts (to-space, tenured destination, touched
//!    fixies) are drained to a joint fixpoint
//! 6. **Post-visit**: fixie age and death verdicts are settled
//! 7. **Reclaim**: the semispaces flip; a major pass retires the old
//!    tenured segment
//!
//! Between passes, forwarding records in the old locations keep stale
//! addresses resolvable through [`Heap::follow`] and classifiable through
//! [`Heap::status`]; they die when the next pass begins.
//!
//! ## Safety
//!
//! TGC moves memory underneath raw addresses, so the embedding runtime
//! must hold up its side of the contract:
//!
//! 1. **Report every root, every pass**: an unreported reference is
//!    garbage by definition
//! 2. **Keep word 0 aligned**: the low bits of a live object's first word
//!    distinguish it from a forwarding record
//! 3. **Use the write barrier**: a store of a young address into tenured,
//!    immortal, or pinned memory must be announced through [`Heap::mark`]
//! 4. **Refresh stale addresses**: after a pass, addresses held outside
//!    reported roots must go through [`Heap::follow`] before use, and
//!    before the next pass begins
//!
//! ## Modules
//!
//! - [`client`]: the traversal protocol between runtime and collector
//! - [`config`]: heap sizing, thresholds, and environment overrides
//! - [`error`]: error taxonomy for all collector operations
//! - [`heap`]: spaces, passes, and the public collector surface
//! - [`logging`]: structured collector events
//! - [`stats`]: per-pass summaries and running totals
//! - [`system`]: platform seam for mapping memory and reading the clock
//!
//! ## Limitations
//!
//! - **Stop-the-world**: mutators must be suspended for the duration of a
//!   pass; there is no concurrent or incremental mode
//! - **Single-threaded heap**: one `Heap` serves one runtime instance and
//!   is not `Sync`
//! - **Precise only**: there is no conservative scanning; what the client
//!   does not report does not survive

// Protocol and configuration
pub mod client;
pub mod config;
pub mod error;

// The collector itself
pub mod heap;

// Observability
pub mod logging;
pub mod stats;

// Platform seam
pub mod system;

// Re-export the types an embedding runtime touches
pub use client::{Client, Visitor, Walker};
pub use config::HeapConfig;
pub use error::{HeapError, Result};
pub use heap::{make_heap, CollectionKind, Heap, Status, PAD_WORD};
pub use logging::{configure_logger, log_event, HeapEvent, HeapLogger, HeapLoggerConfig, LogLevel};
pub use stats::{HeapStats, PassSummary};
pub use system::{HostSystem, System};

/// TGC version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a heap with the default configuration.
///
/// The heap is usable once a client is wired with [`Heap::set_client`].
///
/// # Examples
///
/// ```rust
/// let heap = tgc::init()?;
/// assert!(heap.remaining() > 0);
/// # Ok::<(), tgc::HeapError>(())
/// ```
pub fn init() -> Result<Heap> {
    init_with_config(HeapConfig::default())
}

/// Build a heap with a custom configuration.
///
/// # Examples
///
/// ```rust
/// use tgc::HeapConfig;
///
/// let config = HeapConfig {
///     limit_bytes: 8 * 1024 * 1024,
///     tenure_threshold: 2,
///     ..Default::default()
/// };
/// let heap = tgc::init_with_config(config)?;
/// assert_eq!(heap.config().tenure_threshold, 2);
/// # Ok::<(), tgc::HeapError>(())
/// ```
pub fn init_with_config(config: HeapConfig) -> Result<Heap> {
    use std::sync::Arc;
    Heap::with_config(Arc::new(HostSystem), config)
}
