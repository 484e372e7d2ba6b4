//! Core processor implementation.
//!
//! This module contains everything the speculative core tracks per
//! in-flight instruction, and the orchestrator that owns those records.

/// CPU: owner of the instruction window and the backends.
pub mod cpu;

/// Dynamic instruction record and its lifecycle.
pub mod inst;

/// Doppelganger (shadow) loads.
pub mod shadow;

/// Taint propagation, stall list and deferred squash.
pub mod taint;

/// Address translation protocol.
pub mod translation;

/// Reference translation and memory backends.
pub mod units;

/// Sequence-number keyed table of in-flight instructions.
pub mod window;

pub use self::cpu::Cpu;
