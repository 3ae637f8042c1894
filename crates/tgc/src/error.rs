//! Error Module - Collector Error Types
//!
//! Defines all error types used by the collector.
//!
//! # Error Categories
//!
//! ## Memory Errors
//! - `OutOfMemory` - a space or the overall budget cannot hold a request
//! - `Map` - the platform could not map a segment
//!
//! ## Protocol Errors
//! - `ClientContract` - a traversal callback broke the client contract
//!
//! ## Usage Errors
//! - `InvalidState` - operation invoked in the wrong lifecycle state
//! - `Configuration` - rejected configuration value
//!
//! Out-of-memory is recoverable at the allocation surface (the runtime can
//! collect and retry) but fatal when a completed collection still cannot
//! meet its postcondition; that path goes through [`fatal`] and never
//! returns.

use thiserror::Error;

/// Main error type for all collector operations
///
/// # Examples
///
/// ```rust
/// use tgc::error::HeapError;
///
/// fn handle_error(err: HeapError) {
///     match err {
///         HeapError::OutOfMemory { requested_words, available_words } => {
///             eprintln!("OOM: requested {} words, {} available", requested_words, available_words);
///         }
///         other => {
///             eprintln!("collector error: {}", other);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum HeapError {
    /// Out of memory - a space or the word budget is exhausted
    ///
    /// **When returned:** `allocate`/`try_allocate` cannot satisfy a request
    ///
    /// **Recovery strategy:** run a collection and retry, or surface a
    /// runtime-level out-of-memory condition
    #[error("out of memory: requested {requested_words} words, available {available_words}")]
    OutOfMemory {
        requested_words: usize,
        available_words: usize,
    },

    /// The client broke its traversal contract mid-collection
    ///
    /// **When returned:** never - a partially relocated graph cannot be
    /// rolled back, so this variant is only ever logged on the abort path
    #[error("client contract violation at {address:#x}: {detail}")]
    ClientContract { address: usize, detail: String },

    /// Operation invoked in the wrong lifecycle state
    ///
    /// **When returned:** collecting before `set_client`, touching a
    /// disposed heap, nesting collections
    ///
    /// **Recovery strategy:** none - this is a caller bug; debug builds
    /// assert first
    #[error("invalid state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: String },

    /// Rejected configuration value
    ///
    /// **When returned:** `HeapConfig::validate` or heap construction
    ///
    /// **Recovery strategy:** fix the configuration and reconstruct
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The platform refused a segment mapping
    ///
    /// **When returned:** heap construction or the start of a Major pass
    ///
    /// **Recovery strategy:** lower the limit and reconstruct
    #[error("segment mapping failed: {0}")]
    Map(#[from] std::io::Error),
}

impl HeapError {
    /// Whether the caller can reasonably handle this error and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HeapError::OutOfMemory { .. } | HeapError::Configuration(_) | HeapError::Map(_)
        )
    }

    /// Whether this error indicates a bug in the embedding runtime or the
    /// collector itself rather than a resource condition.
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            HeapError::ClientContract { .. } | HeapError::InvalidState { .. }
        )
    }
}

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, HeapError>;

/// Terminate the process after logging a non-survivable error.
///
/// The only abort site in the crate: collection postcondition misses and
/// mid-relocation contract violations both end up here.
#[cold]
pub(crate) fn fatal(err: &HeapError) -> ! {
    log::error!("fatal collector error: {err}");
    std::process::abort()
}
