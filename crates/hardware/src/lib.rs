//! Speculative instruction core library.
//!
//! This crate models the state an out-of-order core keeps for each
//! in-flight instruction, with the following:
//! 1. **Instruction Record:** Identity, lifecycle progress, squash sites,
//!    container membership, operand bookkeeping and memory fields.
//! 2. **Address Translation:** Line-split requests, idempotent retry and
//!    synchronous or deferred completion through injected backends.
//! 3. **Taint Tracking:** Propagation along producer links, the stall list,
//!    the expose gate and deferred squashes.
//! 4. **Shadow Loads:** Doppelganger accesses for tainted loads with
//!    at-most-once dependent wakeup.
//! 5. **Simulation:** Reference MMU and memory backends, scenario drivers,
//!    configuration, tracing and statistics.

/// Common types and constants (addresses, faults, access types, sequence numbers).
pub mod common;
/// Core configuration (defaults, JSON loading, validation).
pub mod config;
/// CPU core (instruction record, translation, taint, shadow loads, backends).
pub mod core;
/// Static instruction descriptions consumed by the core.
pub mod isa;
/// Scenario drivers over the reference backends.
pub mod sim;
/// Core statistics collection and reporting.
pub mod stats;
/// Per-instruction trace records and sinks.
pub mod trace;

/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Main CPU type; owns the instruction window and both backends.
pub use crate::core::Cpu;
/// In-flight instruction record.
pub use crate::core::inst::DynInst;
