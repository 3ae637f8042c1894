//! Configuration Module - Collector Tuning Parameters
//!
//! Manages the parameters that shape heap geometry and promotion policy.
//! Everything that governs observable collector behavior is a runtime value
//! here rather than a compile-time constant, so embedders and tests can run
//! with small spaces and low tenure thresholds.

use tern_util::align::{bytes_to_words, Alignment};

use crate::error::HeapError;

/// 1 kilobyte
pub const KB: usize = 1024;
/// 1 megabyte
pub const MB: usize = 1024 * KB;
/// 1 gigabyte
pub const GB: usize = 1024 * MB;

/// Smallest accepted heap limit.
///
/// Below this the nursery cannot hold two page-sized semispaces.
pub const MIN_LIMIT_BYTES: usize = 64 * KB;

/// Main configuration for the Tern collector
///
/// Most embedders only set `limit_bytes` (or construct through `make_heap`,
/// which does it for them) and keep the defaults for everything else.
///
/// # Examples
///
/// ```rust
/// use tgc::HeapConfig;
///
/// // Default geometry with a 64MB budget
/// let config = HeapConfig::default();
///
/// // Small spaces and fast promotion, as tests use
/// let config = HeapConfig {
///     limit_bytes: 1024 * 1024,
///     tenure_threshold: 2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Overall word budget for managed memory, expressed in bytes
    ///
    /// Counts the active nursery semispace, the tenured generation, fixed
    /// allocations, and scratch carved from the heap's allocator facet.
    /// Immortal memory is supplied and owned by the runtime and is not
    /// counted.
    /// Default: 64MB
    pub limit_bytes: usize,

    /// Capacity of one nursery semispace in bytes
    ///
    /// Rounded up to the platform page size. `None` picks 1/8 of
    /// `limit_bytes`.
    pub semispace_bytes: Option<usize>,

    /// Collections an ordinary object must survive before promotion
    ///
    /// Default: 3
    pub tenure_threshold: u8,

    /// Collections a fixed allocation must survive before it stops being
    /// revisited on Minor passes
    ///
    /// `None` picks `tenure_threshold + 2`.
    pub fixie_tenure_threshold: Option<u8>,

    /// Emit per-pass events through the global logger
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 64 * MB,
            semispace_bytes: None,
            tenure_threshold: 3,
            fixie_tenure_threshold: None,
            verbose: false,
        }
    }
}

impl HeapConfig {
    /// Semispace capacity in words after defaulting and page rounding.
    pub fn semispace_words(&self) -> usize {
        let requested = self.semispace_bytes.unwrap_or(self.limit_bytes / 8);
        let page = page_size::get();
        let bytes = Alignment::align_up(requested.max(page), page);
        bytes_to_words(bytes)
    }

    /// Overall budget in words.
    pub fn limit_words(&self) -> usize {
        bytes_to_words(self.limit_bytes)
    }

    /// Fixie threshold after defaulting.
    pub fn fixie_threshold(&self) -> u8 {
        self.fixie_tenure_threshold
            .unwrap_or_else(|| self.tenure_threshold.saturating_add(2))
    }

    /// Validate configuration
    ///
    /// Checks that the geometry is self-consistent before any memory is
    /// mapped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tgc::HeapConfig;
    ///
    /// let config = HeapConfig {
    ///     limit_bytes: 0, // invalid
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit_bytes < MIN_LIMIT_BYTES {
            return Err(ConfigError::InvalidLimit(format!(
                "limit_bytes must be at least {MIN_LIMIT_BYTES}"
            )));
        }

        if let Some(semispace) = self.semispace_bytes {
            if semispace == 0 {
                return Err(ConfigError::InvalidSemispace(
                    "semispace_bytes must be > 0".to_string(),
                ));
            }
            if semispace > self.limit_bytes {
                return Err(ConfigError::InvalidSemispace(
                    "semispace_bytes cannot exceed limit_bytes".to_string(),
                ));
            }
        }

        if self.tenure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold(
                "tenure_threshold must be >= 1".to_string(),
            ));
        }

        if let Some(fixie) = self.fixie_tenure_threshold {
            if fixie < self.tenure_threshold {
                return Err(ConfigError::InvalidThreshold(
                    "fixie_tenure_threshold must be >= tenure_threshold".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - TGC_HEAP_LIMIT
    /// - TGC_SEMISPACE_SIZE
    /// - TGC_TENURE_THRESHOLD
    /// - TGC_FIXIE_TENURE_THRESHOLD
    /// - TGC_VERBOSE
    ///
    /// # Examples
    ///
    /// ```bash
    /// export TGC_HEAP_LIMIT=134217728  # 128MB
    /// export TGC_TENURE_THRESHOLD=4
    /// export TGC_VERBOSE=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TGC_HEAP_LIMIT") {
            if let Ok(size) = val.parse::<usize>() {
                config.limit_bytes = size;
            }
        }

        if let Ok(val) = std::env::var("TGC_SEMISPACE_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                config.semispace_bytes = Some(size);
            }
        }

        if let Ok(val) = std::env::var("TGC_TENURE_THRESHOLD") {
            if let Ok(threshold) = val.parse::<u8>() {
                config.tenure_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("TGC_FIXIE_TENURE_THRESHOLD") {
            if let Ok(threshold) = val.parse::<u8>() {
                config.fixie_tenure_threshold = Some(threshold);
            }
        }

        if let Ok(val) = std::env::var("TGC_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid semispace size: {0}")]
    InvalidSemispace(String),

    #[error("Invalid tenure threshold: {0}")]
    InvalidThreshold(String),
}

impl From<ConfigError> for HeapError {
    fn from(err: ConfigError) -> Self {
        HeapError::Configuration(err.to_string())
    }
}
