//! Core statistics collection and reporting.
//!
//! This module tracks counters for the instruction record and its
//! protocols. It provides:
//! 1. **Window:** Dispatched, committed, squashed and reclaimed instructions.
//! 2. **Translation:** Requests issued, splits, retry collapses, deferrals and faults.
//! 3. **Taint:** Stall-list insertions and deferred squashes.
//! 4. **Shadow loads:** Started, completed and dependent wakeups.

use serde::Serialize;

/// Counters kept by a [`crate::core::cpu::Cpu`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoreStats {
    /// Instructions created.
    pub dispatched: u64,
    /// Instructions retired.
    pub committed: u64,
    /// Instructions squashed.
    pub squashed: u64,
    /// Instructions removed and destroyed.
    pub reclaimed: u64,
    /// Removals postponed until an outstanding translation completed.
    pub deferred_reclaims: u64,

    /// Translation requests handed to the backend (one per fragment).
    pub translations_issued: u64,
    /// Accesses split at a line boundary.
    pub split_requests: u64,
    /// Entry-point calls that found a translation already in flight.
    pub retry_collapses: u64,
    /// Translations that did not complete synchronously.
    pub deferred_translations: u64,
    /// Translations that completed with a fault.
    pub translation_faults: u64,
    /// Completions that arrived after their instruction was squashed.
    pub late_completions: u64,
    /// Completions for instructions or translations that no longer exist.
    pub stale_completions: u64,
    /// Reads handed to memory.
    pub reads_issued: u64,
    /// Reads handed to memory on behalf of a shadow load.
    pub shadow_reads_issued: u64,
    /// Writes handed to memory.
    pub writes_issued: u64,

    /// Instructions placed in the stall list.
    pub stall_list_insertions: u64,
    /// Squashes deferred until taint resolved.
    pub deferred_squashes: u64,
    /// Deferred squashes released once taint resolved.
    pub resolved_squashes: u64,

    /// Shadow loads started.
    pub shadow_loads_started: u64,
    /// Shadow loads that finished with a usable value.
    pub shadow_loads_succeeded: u64,
    /// Dependent wakeups triggered by shadow loads.
    pub shadow_wakeups: u64,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"window"`, `"translation"`, `"taint"`, `"shadow"`.
/// Pass an empty slice to `render_sections` to render all sections.
pub const STATS_SECTIONS: &[&str] = &["window", "translation", "taint", "shadow"];

impl CoreStats {
    /// Renders the requested sections as text.
    ///
    /// # Arguments
    ///
    /// * `sections` - Section names to include, or empty for all.
    pub fn render_sections(&self, sections: &[&str]) -> String {
        let want = |s: &str| sections.is_empty() || sections.contains(&s);
        let mut out = String::new();
        let mut line = |name: &str, val: u64| {
            out.push_str(&format!("  {name:<24} {val}\n"));
        };

        if want("window") {
            line("window.dispatched", self.dispatched);
            line("window.committed", self.committed);
            line("window.squashed", self.squashed);
            line("window.reclaimed", self.reclaimed);
            line("window.deferred_reclaims", self.deferred_reclaims);
        }
        if want("translation") {
            line("xlate.issued", self.translations_issued);
            line("xlate.splits", self.split_requests);
            line("xlate.retry_collapses", self.retry_collapses);
            line("xlate.deferred", self.deferred_translations);
            line("xlate.faults", self.translation_faults);
            line("xlate.late_completions", self.late_completions);
            line("xlate.stale_completions", self.stale_completions);
            line("mem.reads", self.reads_issued);
            line("mem.shadow_reads", self.shadow_reads_issued);
            line("mem.writes", self.writes_issued);
        }
        if want("taint") {
            line("taint.stalls", self.stall_list_insertions);
            line("taint.deferred_squashes", self.deferred_squashes);
            line("taint.resolved_squashes", self.resolved_squashes);
        }
        if want("shadow") {
            line("dopp.started", self.shadow_loads_started);
            line("dopp.succeeded", self.shadow_loads_succeeded);
            line("dopp.wakeups", self.shadow_wakeups);
        }
        out
    }

    /// Prints all sections to stdout.
    pub fn print(&self) {
        println!("==========================================================");
        println!("SPECULATIVE CORE STATISTICS");
        println!("==========================================================");
        print!("{}", self.render_sections(&[]));
        println!("==========================================================");
    }
}
