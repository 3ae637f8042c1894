//! System Module - Platform Services Seam
//!
//! The collector touches the platform in exactly two places: anonymous
//! memory mapping for its segments and a monotonic clock for pause
//! measurement. Both come through this trait so embedders can interpose
//! (e.g. a counting system in tests, or a reservation-aware one inside a
//! sandboxed runtime).

use std::io;
use std::time::Instant;

use memmap2::MmapMut;

/// Platform services supplied at heap construction.
pub trait System: Send + Sync {
    /// Map `len` bytes of zero-initialized anonymous memory.
    fn map(&self, len: usize) -> io::Result<MmapMut>;

    /// Monotonic clock reading.
    fn now(&self) -> Instant;
}

/// Default platform services backed by the host OS.
#[derive(Debug, Default)]
pub struct HostSystem;

impl System for HostSystem {
    fn map(&self, len: usize) -> io::Result<MmapMut> {
        MmapMut::map_anon(len)
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
