//! Collector Logging and Tracing
//!
//! Event-level logging for collection passes, useful for:
//! - Pause analysis
//! - Debugging promotion behavior
//! - Production monitoring
//!
//! Log Levels:
//! - ERROR: budget exhaustion on the abort path
//! - WARN: unusual conditions
//! - INFO: passes, lifecycle
//! - DEBUG: phases inside a pass
//! - TRACE: per-region detail

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Log level for collector events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Collector event types
#[derive(Debug, Clone)]
pub enum HeapEvent {
    /// Heap constructed
    Init {
        limit_words: usize,
        semispace_words: usize,
    },

    /// Collection pass started
    PassStart {
        pass: u64,
        kind: String,
        reason: String,
    },

    /// Collection pass completed
    PassEnd {
        pass: u64,
        kind: String,
        duration_ms: f64,
        copied_words: usize,
        promoted_words: usize,
        reclaimed_words: usize,
    },

    /// Occupancy snapshot after a pass
    Occupancy {
        occupied_words: usize,
        limit_words: usize,
        utilization: f64,
    },

    /// Nursery or budget could not hold a request
    AllocationFailure {
        size_words: usize,
        remaining_words: usize,
    },

    /// Immortal region registered
    ImmortalRegistered { size_words: usize },

    /// Transient fixed allocations released
    FixiesDisposed { count: usize, words: usize },

    /// Scratch facet asked the runtime to collect
    ScratchPressure { requested_bytes: usize },

    /// Heap disposed
    Shutdown { passes: u64 },
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct HeapLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,
}

impl Default for HeapLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
            json: false,
            timestamps: true,
        }
    }
}

/// Centralized logger for collector events
///
/// Events are retained in memory (tests read them back) and optionally
/// echoed to the console in human or JSON form.
pub struct HeapLogger {
    config: HeapLoggerConfig,
    events: Mutex<Vec<(Instant, HeapEvent)>>,
    enabled: AtomicBool,
}

impl HeapLogger {
    /// Create new logger
    pub fn new(config: HeapLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a collector event
    pub fn log(&self, event: HeapEvent) {
        if !self.is_enabled() {
            return;
        }

        let event_level = self.event_level(&event);
        if event_level > self.config.level {
            return;
        }

        let timestamp = Instant::now();

        if let Ok(mut events) = self.events.lock() {
            events.push((timestamp, event.clone()));
        }

        if self.config.console {
            self.output_console(&event);
        }
    }

    /// Get log level for event
    fn event_level(&self, event: &HeapEvent) -> LogLevel {
        match event {
            HeapEvent::AllocationFailure { .. } => LogLevel::Error,
            HeapEvent::ScratchPressure { .. } => LogLevel::Warn,
            HeapEvent::Init { .. }
            | HeapEvent::PassStart { .. }
            | HeapEvent::PassEnd { .. }
            | HeapEvent::Shutdown { .. } => LogLevel::Info,
            HeapEvent::Occupancy { .. }
            | HeapEvent::ImmortalRegistered { .. }
            | HeapEvent::FixiesDisposed { .. } => LogLevel::Debug,
        }
    }

    /// Output to console
    fn output_console(&self, event: &HeapEvent) {
        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if self.config.json {
            self.output_json(event);
        } else {
            self.output_human(event);
        }
    }

    /// Output in human-readable format
    fn output_human(&self, event: &HeapEvent) {
        match event {
            HeapEvent::Init {
                limit_words,
                semispace_words,
            } => {
                println!(
                    "[GC] Heap initialized ({} word budget, {} word semispaces)",
                    limit_words, semispace_words
                );
            }
            HeapEvent::PassStart { pass, kind, reason } => {
                println!("[GC] Pass {} started ({}, reason: {})", pass, kind, reason);
            }
            HeapEvent::PassEnd {
                pass,
                kind,
                duration_ms,
                copied_words,
                promoted_words,
                reclaimed_words,
            } => {
                println!(
                    "[GC] Pass {} completed ({}, {:.2}ms, copied {}, promoted {}, reclaimed {} words)",
                    pass, kind, duration_ms, copied_words, promoted_words, reclaimed_words
                );
            }
            HeapEvent::Occupancy {
                occupied_words,
                limit_words,
                utilization,
            } => {
                println!(
                    "[GC] Heap: {}/{} words ({:.1}% utilized)",
                    occupied_words,
                    limit_words,
                    utilization * 100.0
                );
            }
            HeapEvent::AllocationFailure {
                size_words,
                remaining_words,
            } => {
                eprintln!(
                    "[GC] Allocation failure: {} words ({} remaining)",
                    size_words, remaining_words
                );
            }
            HeapEvent::ImmortalRegistered { size_words } => {
                println!("[GC] Immortal region registered ({} words)", size_words);
            }
            HeapEvent::FixiesDisposed { count, words } => {
                println!("[GC] Disposed {} fixed allocations ({} words)", count, words);
            }
            HeapEvent::ScratchPressure { requested_bytes } => {
                println!(
                    "[GC] Scratch pressure: collecting before {} byte request",
                    requested_bytes
                );
            }
            HeapEvent::Shutdown { passes } => {
                println!("[GC] Heap disposed after {} passes", passes);
            }
        }
    }

    /// Output in JSON format
    fn output_json(&self, event: &HeapEvent) {
        let json = match event {
            HeapEvent::Init {
                limit_words,
                semispace_words,
            } => serde_json::json!({
                "type": "init",
                "limit_words": limit_words,
                "semispace_words": semispace_words
            }),
            HeapEvent::PassStart { pass, kind, reason } => serde_json::json!({
                "type": "pass_start",
                "pass": pass,
                "kind": kind,
                "reason": reason
            }),
            HeapEvent::PassEnd {
                pass,
                kind,
                duration_ms,
                copied_words,
                promoted_words,
                reclaimed_words,
            } => serde_json::json!({
                "type": "pass_end",
                "pass": pass,
                "kind": kind,
                "duration_ms": duration_ms,
                "copied_words": copied_words,
                "promoted_words": promoted_words,
                "reclaimed_words": reclaimed_words
            }),
            HeapEvent::Occupancy {
                occupied_words,
                limit_words,
                utilization,
            } => serde_json::json!({
                "type": "occupancy",
                "occupied_words": occupied_words,
                "limit_words": limit_words,
                "utilization": utilization
            }),
            HeapEvent::AllocationFailure {
                size_words,
                remaining_words,
            } => serde_json::json!({
                "type": "allocation_failure",
                "size_words": size_words,
                "remaining_words": remaining_words
            }),
            HeapEvent::ImmortalRegistered { size_words } => serde_json::json!({
                "type": "immortal_registered",
                "size_words": size_words
            }),
            HeapEvent::FixiesDisposed { count, words } => serde_json::json!({
                "type": "fixies_disposed",
                "count": count,
                "words": words
            }),
            HeapEvent::ScratchPressure { requested_bytes } => serde_json::json!({
                "type": "scratch_pressure",
                "requested_bytes": requested_bytes
            }),
            HeapEvent::Shutdown { passes } => serde_json::json!({
                "type": "shutdown",
                "passes": passes
            }),
        };

        if let Ok(json_str) = serde_json::to_string(&json) {
            println!("{}", json_str);
        }
    }

    /// Get all events
    pub fn get_events(&self) -> Vec<(Instant, HeapEvent)> {
        if let Ok(events) = self.events.lock() {
            events.clone()
        } else {
            Vec::new()
        }
    }

    /// Clear all events
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        if let Ok(events) = self.events.lock() {
            events.len()
        } else {
            0
        }
    }
}

impl Default for HeapLogger {
    fn default() -> Self {
        Self::new(HeapLoggerConfig::default())
    }
}

/// Global collector logger
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<HeapLogger> = Mutex::new(HeapLogger::default());
}

/// Log a collector event to the global logger
pub fn log_event(event: HeapEvent) {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.log(event);
    }
}

/// Configure the global logger
pub fn configure_logger(config: HeapLoggerConfig) {
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        *logger = HeapLogger::new(config);
    }
}

/// Get global logger event count
pub fn get_event_count() -> usize {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.event_count()
    } else {
        0
    }
}
