//! Configuration system for the speculative core model.
//!
//! This module defines all configuration structures used to parameterize
//! the core. It provides:
//! 1. **Defaults:** Baseline constants (line size, TLB geometry, walk latency, memory).
//! 2. **Structures:** Hierarchical config for the core, the reference MMU, memory and tracing.
//! 3. **Validation:** Rejection of geometry the translation protocol cannot handle.
//!
//! Configuration is supplied as JSON (`Config::from_json`) or use `Config::default()`.

use serde::Deserialize;
use thiserror::Error;

/// Default configuration constants for the core.
///
/// These values define the baseline configuration when not explicitly
/// overridden in a JSON configuration file.
mod defaults {
    /// Default simulated cache line size in bytes (64 bytes).
    ///
    /// Accesses crossing a multiple of this size are split in two.
    pub const CACHE_LINE: u64 = 64;

    /// Whether the modelled ISA permits unaligned accesses (and therefore splits).
    pub const UNALIGNED_ACCESS: bool = true;

    /// Number of hardware threads sharing the core.
    pub const THREAD_COUNT: u16 = 1;

    /// Translation Lookaside Buffer entry count.
    pub const TLB_SIZE: usize = 32;

    /// Cycles a page walk takes before its completion is delivered.
    pub const WALK_LATENCY: u64 = 20;

    /// Page size in bytes (4 KiB).
    pub const PAGE_BYTES: u64 = 4096;

    /// Base address of the reference physical memory (2 GiB).
    pub const RAM_BASE: u64 = 0x8000_0000;

    /// Size of the reference physical memory (1 MiB).
    pub const RAM_SIZE: u64 = 1024 * 1024;
}

/// Error returned when a configuration cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON text did not deserialize.
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The cache line size is not a power of two.
    #[error("cache line size {0} is not a power of two")]
    LineNotPowerOfTwo(u64),

    /// The page size is not a power of two or is smaller than a line.
    #[error("page size {page} must be a power of two no smaller than the line size {line}")]
    BadPageSize {
        /// Configured page size.
        page: u64,
        /// Configured line size.
        line: u64,
    },

    /// A core must run at least one thread.
    #[error("thread count must be at least 1")]
    NoThreads,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use specsim_core::config::Config;
///
/// let json = r#"{ "core": { "cache_line_bytes": 32, "dopp_enabled": true } }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.core.cache_line_bytes, 32);
/// assert!(config.core.dopp_enabled);
/// assert_eq!(config.mmu.tlb_size, 32);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Instruction-record and protocol options.
    #[serde(default)]
    pub core: CoreConfig,
    /// Reference translation backend.
    #[serde(default)]
    pub mmu: MmuConfig,
    /// Reference memory backend.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Trace sink options.
    #[serde(default)]
    pub trace: TraceConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the matching
    /// variant for geometry that fails [`Config::validate`].
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the core cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let line = self.core.cache_line_bytes;
        if !line.is_power_of_two() {
            return Err(ConfigError::LineNotPowerOfTwo(line));
        }
        let page = self.mmu.page_bytes;
        if !page.is_power_of_two() || page < line {
            return Err(ConfigError::BadPageSize { page, line });
        }
        if self.core.thread_count == 0 {
            return Err(ConfigError::NoThreads);
        }
        Ok(())
    }
}

/// Options governing the instruction record and the translation protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Simulated cache line size in bytes; the split boundary.
    #[serde(default = "CoreConfig::default_line")]
    pub cache_line_bytes: u64,

    /// Split accesses that straddle a line boundary into two requests.
    #[serde(default = "CoreConfig::default_unaligned")]
    pub unaligned_access: bool,

    /// Enable the doppelganger (shadow-load) mechanism.
    #[serde(default)]
    pub dopp_enabled: bool,

    /// Keep a copy of every issued request for verification.
    #[serde(default)]
    pub checker_enabled: bool,

    /// Number of hardware threads.
    #[serde(default = "CoreConfig::default_threads")]
    pub thread_count: u16,
}

impl CoreConfig {
    /// Returns the default line size in bytes.
    const fn default_line() -> u64 {
        defaults::CACHE_LINE
    }

    /// Returns the default unaligned-access support.
    const fn default_unaligned() -> bool {
        defaults::UNALIGNED_ACCESS
    }

    /// Returns the default thread count.
    const fn default_threads() -> u16 {
        defaults::THREAD_COUNT
    }
}

impl Default for CoreConfig {
    /// Creates a default core configuration.
    ///
    /// 64-byte lines, splitting enabled, shadow loads and checker disabled,
    /// single thread.
    fn default() -> Self {
        Self {
            cache_line_bytes: defaults::CACHE_LINE,
            unaligned_access: defaults::UNALIGNED_ACCESS,
            dopp_enabled: false,
            checker_enabled: false,
            thread_count: defaults::THREAD_COUNT,
        }
    }
}

/// Reference MMU configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MmuConfig {
    /// TLB entries (rounded up to a power of two).
    #[serde(default = "MmuConfig::default_tlb_size")]
    pub tlb_size: usize,

    /// Cycles between a TLB miss and delivery of its completion.
    #[serde(default = "MmuConfig::default_walk_latency")]
    pub walk_latency: u64,

    /// Page size in bytes.
    #[serde(default = "MmuConfig::default_page_bytes")]
    pub page_bytes: u64,
}

impl MmuConfig {
    /// Returns the default TLB entry count.
    const fn default_tlb_size() -> usize {
        defaults::TLB_SIZE
    }

    /// Returns the default page-walk latency.
    const fn default_walk_latency() -> u64 {
        defaults::WALK_LATENCY
    }

    /// Returns the default page size.
    const fn default_page_bytes() -> u64 {
        defaults::PAGE_BYTES
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            tlb_size: defaults::TLB_SIZE,
            walk_latency: defaults::WALK_LATENCY,
            page_bytes: defaults::PAGE_BYTES,
        }
    }
}

/// Reference memory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// First valid physical address.
    #[serde(default = "MemoryConfig::default_base")]
    pub base: u64,

    /// Size of the physical memory in bytes.
    #[serde(default = "MemoryConfig::default_size")]
    pub size: u64,
}

impl MemoryConfig {
    /// Returns the default physical base address.
    const fn default_base() -> u64 {
        defaults::RAM_BASE
    }

    /// Returns the default memory size.
    const fn default_size() -> u64 {
        defaults::RAM_SIZE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base: defaults::RAM_BASE,
            size: defaults::RAM_SIZE,
        }
    }
}

/// Trace sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceConfig {
    /// Collect per-instruction trace records.
    #[serde(default)]
    pub enabled: bool,
}
