//! Unit tests grouped by component.


/// Lifecycle, squash sites, membership and removal.
pub mod lifecycle;

/// Reference MMU driven through the CPU.
pub mod mmu;


/// End-to-end scenario runs.
pub mod scenarios;

/// Shadow loads.
pub mod shadow;


/// Translation protocol: retries, splits, deferred and stale completions.
pub mod translation;
