//! Stats Module - Collector Monitoring
//!
//! Pass counters, word traffic, and pause timing. The collector is
//! single-threaded by contract, so these are plain fields updated behind
//! `&mut Heap` rather than atomics.

use std::time::Duration;

use serde::Serialize;

use crate::heap::CollectionKind;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    /// Pass number (1-based, monotonic)
    pub pass: u64,
    /// Minor or Major
    pub kind: CollectionKind,
    /// Whether the requested kind was escalated
    pub escalated: bool,
    /// Root slots reported by the client
    pub roots_visited: usize,
    /// Words copied within the nursery
    pub copied_words: usize,
    /// Words promoted into the tenured generation
    pub promoted_words: usize,
    /// Words returned to the budget by the pass
    pub reclaimed_words: usize,
    /// Fixed allocations discovered live
    pub fixies_marked: usize,
    /// Wall-clock duration of the pass
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

/// Cumulative collector statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeapStats {
    /// Total passes run
    pub total_passes: u64,
    /// Minor passes
    pub minor_passes: u64,
    /// Major passes
    pub major_passes: u64,
    /// Passes skipped because nothing changed since the previous one
    pub noop_collects: u64,
    /// Words copied within the nursery, lifetime total
    pub copied_words: u64,
    /// Words promoted to the tenured generation, lifetime total
    pub promoted_words: u64,
    /// Words reclaimed, lifetime total
    pub reclaimed_words: u64,
    /// Fixed allocations made
    pub fixies_allocated: u64,
    /// Fixed allocations released through disposal
    pub fixies_disposed: u64,
    /// Longest pause observed
    #[serde(serialize_with = "serialize_duration_ms")]
    pub max_pause: Duration,
    /// Most recent pause
    #[serde(serialize_with = "serialize_duration_ms")]
    pub last_pause: Duration,
    /// Sum of all pauses
    #[serde(serialize_with = "serialize_duration_ms")]
    pub total_pause: Duration,
}

impl HeapStats {
    /// Fold one pass outcome into the running totals.
    pub(crate) fn record_pass(&mut self, summary: &PassSummary) {
        self.total_passes += 1;
        match summary.kind {
            CollectionKind::Minor => self.minor_passes += 1,
            CollectionKind::Major => self.major_passes += 1,
        }
        self.copied_words += summary.copied_words as u64;
        self.promoted_words += summary.promoted_words as u64;
        self.reclaimed_words += summary.reclaimed_words as u64;
        self.last_pause = summary.duration;
        self.total_pause += summary.duration;
        if summary.duration > self.max_pause {
            self.max_pause = summary.duration;
        }
    }

    /// Statistics as a JSON string, for monitoring endpoints.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(kind: CollectionKind, copied: usize, pause_ms: u64) -> PassSummary {
        PassSummary {
            pass: 1,
            kind,
            escalated: false,
            roots_visited: 0,
            copied_words: copied,
            promoted_words: 0,
            reclaimed_words: 0,
            fixies_marked: 0,
            duration: Duration::from_millis(pause_ms),
        }
    }

    #[test]
    fn test_record_pass_counts_by_kind() {
        let mut stats = HeapStats::default();
        stats.record_pass(&summary(CollectionKind::Minor, 8, 1));
        stats.record_pass(&summary(CollectionKind::Major, 4, 2));

        assert_eq!(stats.total_passes, 2);
        assert_eq!(stats.minor_passes, 1);
        assert_eq!(stats.major_passes, 1);
        assert_eq!(stats.copied_words, 12);
    }

    #[test]
    fn test_max_pause_tracks_peak() {
        let mut stats = HeapStats::default();
        stats.record_pass(&summary(CollectionKind::Minor, 0, 5));
        stats.record_pass(&summary(CollectionKind::Minor, 0, 2));

        assert_eq!(stats.max_pause, Duration::from_millis(5));
        assert_eq!(stats.last_pause, Duration::from_millis(2));
        assert_eq!(stats.total_pause, Duration::from_millis(7));
    }

    #[test]
    fn test_to_json_is_object() {
        let stats = HeapStats::default();
        let json = stats.to_json();
        assert!(json.starts_with('{'));
        assert!(json.contains("total_passes"));
    }
}
