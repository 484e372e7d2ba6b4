//! Reference backends.
//!
//! The core talks to address translation and memory through traits; these
//! units are the implementations used by the command-line driver and the
//! test suite.

/// Flat physical memory implementing the memory backend.
pub mod lsu;

/// Memory Management Unit with TLB and page table walker.
pub mod mmu;
