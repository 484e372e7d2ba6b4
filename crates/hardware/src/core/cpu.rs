//! CPU: owner of every in-flight instruction.
//!
//! The CPU is the single owner of instruction records and of the two
//! injected backends. It provides:
//! 1. **Dispatch:** Creates records with fresh sequence numbers and links producers.
//! 2. **Access:** Routes the translation protocol's entry points to the
//!    right record with the right collaborators.
//! 3. **Completion Routing:** Delivers deferred translation results by
//!    sequence number, after checking the instruction still exists.
//! 4. **Squash and Removal:** Terminal transitions and reclaim, deferring
//!    reclaim while a translation the instruction issued is outstanding.
//! 5. **Taint and Shadow Loads:** Window-wide taint passes and shadow-load control.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::{
    ContractViolation, Fault, InstSeqNum, RequestFlags, ThreadId, TranslationResult, VirtAddr,
    violation,
};
use crate::config::{Config, CoreConfig};
use crate::core::inst::DynInst;
use crate::core::inst::status::SquashSite;
use crate::core::shadow::ShadowLoad;
use crate::core::taint::{SquashDecision, TaintTracker};
use crate::core::translation::{
    CompletionOutcome, MemContext, MemoryBackend, TranslationBackend, TranslationToken,
};
use crate::core::window::InstWindow;
use crate::isa::StaticInst;
use crate::stats::CoreStats;
use crate::trace::TraceSink;

/// Result of asking the CPU to remove an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The record was destroyed.
    Reclaimed,
    /// A translation is outstanding; the record is destroyed when it completes.
    Deferred,
}

/// The speculative core.
pub struct Cpu {
    config: CoreConfig,
    trace_enabled: bool,
    window: InstWindow,
    draining: BTreeMap<InstSeqNum, DynInst>,
    translator: Box<dyn TranslationBackend>,
    memory: Box<dyn MemoryBackend>,
    sink: Option<Box<dyn TraceSink>>,
    stats: CoreStats,
    next_seq: InstSeqNum,
    cycle: u64,
}

impl Cpu {
    /// Creates a CPU with the given backends.
    ///
    /// # Arguments
    ///
    /// * `config` - Full configuration; the core and trace sections are used.
    /// * `translator` - Address translation service.
    /// * `memory` - Memory access service.
    pub fn new(
        config: &Config,
        translator: Box<dyn TranslationBackend>,
        memory: Box<dyn MemoryBackend>,
    ) -> Self {
        Self {
            config: config.core.clone(),
            trace_enabled: config.trace.enabled,
            window: InstWindow::new(),
            draining: BTreeMap::new(),
            translator,
            memory,
            sink: None,
            stats: CoreStats::default(),
            next_seq: InstSeqNum(1),
            cycle: 0,
        }
    }

    /// Installs a trace sink. Records are only collected if tracing is enabled.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Core options.
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Counters.
    pub const fn stats(&self) -> &CoreStats {
        &self.stats
    }

    /// Current backend cycle.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Instructions currently in the window.
    pub const fn window(&self) -> &InstWindow {
        &self.window
    }

    /// Number of removed records kept alive by an outstanding translation.
    pub fn draining(&self) -> usize {
        self.draining.len()
    }

    /// Looks up a live instruction.
    pub fn inst(&self, seq: InstSeqNum) -> Option<&DynInst> {
        self.window.get(seq)
    }

    /// Looks up a live instruction for mutation.
    pub fn inst_mut(&mut self, seq: InstSeqNum) -> Option<&mut DynInst> {
        self.window.get_mut(seq)
    }

    #[track_caller]
    fn expect_mut(&mut self, seq: InstSeqNum) -> &mut DynInst {
        match self.window.get_mut(seq) {
            Some(inst) => inst,
            None => violation(ContractViolation::StaleReference { seq }),
        }
    }

    /// Resolves the producer of `consumer`'s source `idx`, checking liveness.
    pub fn producer(&self, consumer: InstSeqNum, idx: usize) -> Option<&DynInst> {
        let link = self.window.get(consumer)?.arg_producers().get(idx).copied()?;
        self.window.live_producer(link)
    }

    // ══════════════════════════════════════════════════════════
    // Dispatch
    // ══════════════════════════════════════════════════════════

    /// Creates an instruction and places it in the window.
    ///
    /// `producers[i]` names the in-flight producer of source `i`, if any.
    /// Taint is computed immediately; a tainted instruction enters the
    /// stall list.
    ///
    /// # Returns
    ///
    /// The new sequence number.
    pub fn dispatch(
        &mut self,
        static_inst: Arc<StaticInst>,
        pc: u64,
        pred_pc: u64,
        tid: ThreadId,
        producers: &[Option<InstSeqNum>],
    ) -> InstSeqNum {
        let seq = self.next_seq;
        self.next_seq = seq.next();

        let mut inst = DynInst::new(seq, tid, static_inst, pc, pred_pc, &self.config);
        if self.trace_enabled && self.sink.is_some() {
            inst.enable_trace();
        }
        for (idx, link) in producers.iter().enumerate() {
            if let Some(producer) = link {
                inst.set_arg_producer(idx, *producer);
            }
        }
        debug!(%seq, tid, pc = format_args!("{pc:#x}"), mnemonic = inst.static_inst().mnemonic, "dispatch");
        self.window.insert(inst);
        self.stats.dispatched += 1;

        TaintTracker::on_dispatch(&mut self.window, seq, &mut self.stats);
        seq
    }

    // ══════════════════════════════════════════════════════════
    // Memory access
    // ══════════════════════════════════════════════════════════

    #[track_caller]
    fn with_access<R>(
        &mut self,
        seq: InstSeqNum,
        f: impl FnOnce(&mut DynInst, &mut MemContext<'_>) -> R,
    ) -> R {
        let Some(inst) = self.window.get_mut(seq) else {
            violation(ContractViolation::StaleReference { seq });
        };
        let mut cx = MemContext {
            config: &self.config,
            translator: self.translator.as_mut(),
            memory: self.memory.as_mut(),
            stats: &mut self.stats,
        };
        f(inst, &mut cx)
    }

    /// Initiates (or retries) a read on behalf of `seq`.
    ///
    /// See [`DynInst::initiate_read`].
    #[track_caller]
    pub fn initiate_read(
        &mut self,
        seq: InstSeqNum,
        addr: VirtAddr,
        size: u32,
        flags: RequestFlags,
    ) -> Option<Fault> {
        self.with_access(seq, |inst, cx| inst.initiate_read(addr, size, flags, cx))
    }

    /// Initiates (or retries) a write on behalf of `seq`.
    ///
    /// See [`DynInst::initiate_write`].
    #[track_caller]
    pub fn initiate_write(
        &mut self,
        seq: InstSeqNum,
        data: &[u8],
        size: u32,
        addr: VirtAddr,
        flags: RequestFlags,
        res: Option<u64>,
    ) -> Option<Fault> {
        self.with_access(seq, |inst, cx| {
            inst.initiate_write(data, size, addr, flags, res, cx)
        })
    }

    /// Delivers a deferred translation result.
    ///
    /// Results for instructions that no longer exist are logged and dropped.
    /// A result that finishes the translation of an already-removed record
    /// lets that record be reclaimed.
    pub fn complete_translation(
        &mut self,
        token: TranslationToken,
        result: TranslationResult,
    ) -> CompletionOutcome {
        let outcome = if let Some(inst) = self.window.get_mut(token.seq) {
            inst.complete_translation(token, result, &mut self.stats)
        } else if let Some(inst) = self.draining.get_mut(&token.seq) {
            let outcome = inst.complete_translation(token, result, &mut self.stats);
            if !inst.is_translation_delayed()
                && let Some(inst) = self.draining.remove(&token.seq)
            {
                self.reclaim(inst);
            }
            outcome
        } else {
            CompletionOutcome::Stale
        };

        if outcome == CompletionOutcome::Stale {
            self.stats.stale_completions += 1;
            warn!(seq = %token.seq, fragment = ?token.fragment, "dropping completion with no matching translation");
        }
        outcome
    }

    /// Advances the translation backend by one cycle and delivers due completions.
    ///
    /// # Returns
    ///
    /// The number of completions delivered.
    pub fn tick(&mut self) -> usize {
        self.cycle += 1;
        let due = self.translator.tick(self.cycle);
        let count = due.len();
        for c in due {
            let _ = self.complete_translation(c.token, c.result);
        }
        count
    }

    // ══════════════════════════════════════════════════════════
    // Squash and removal
    // ══════════════════════════════════════════════════════════

    /// Squashes one instruction, observed at `site`.
    #[track_caller]
    pub fn squash(&mut self, seq: InstSeqNum, site: SquashSite) {
        self.expect_mut(seq).squash(site);
    }

    /// Squashes every live instruction of `tid` younger than `seq`.
    ///
    /// # Returns
    ///
    /// The squashed sequence numbers, in program order.
    pub fn squash_younger_than(&mut self, seq: InstSeqNum, tid: ThreadId) -> Vec<InstSeqNum> {
        let mut squashed = Vec::new();
        for younger in self.window.seqs().into_iter().filter(|s| *s > seq) {
            if let Some(inst) = self.window.get_mut(younger)
                && inst.tid() == tid
                && !inst.is_terminal()
            {
                inst.set_squashed();
                squashed.push(younger);
            }
        }
        if !squashed.is_empty() {
            debug!(%seq, count = squashed.len(), "squashed younger instructions");
        }
        squashed
    }

    /// Removes a terminal instruction that no container holds any more.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if `seq` is unknown, not terminal,
    /// or still held by a container.
    #[track_caller]
    pub fn remove(&mut self, seq: InstSeqNum) -> RemoveOutcome {
        let Some(inst) = self.window.get(seq) else {
            violation(ContractViolation::StaleReference { seq });
        };
        if !inst.is_terminal() {
            violation(ContractViolation::RemoveLiveInstruction { seq });
        }
        if let Some(container) = inst.membership().holder() {
            violation(ContractViolation::RemoveWhileQueued { seq, container });
        }
        let Some(mut inst) = self.window.remove(seq) else {
            violation(ContractViolation::StaleReference { seq });
        };
        inst.set_removed();
        inst.remove_from_stall_list();

        if inst.is_translation_delayed() {
            debug!(%seq, outstanding = inst.outstanding_fragments(), "reclaim deferred until translation completes");
            self.stats.deferred_reclaims += 1;
            let _ = self.draining.insert(seq, inst);
            return RemoveOutcome::Deferred;
        }
        self.reclaim(inst);
        RemoveOutcome::Reclaimed
    }

    fn reclaim(&mut self, mut inst: DynInst) {
        if inst.is_committed() {
            self.stats.committed += 1;
        } else {
            self.stats.squashed += 1;
        }
        self.stats.reclaimed += 1;

        if let (Some(sink), Some(mut rec)) = (self.sink.as_mut(), inst.trace.take()) {
            rec.outcome = Some(if inst.is_committed() { "committed" } else { "squashed" });
            rec.fault = inst.fault().map(ToString::to_string);
            sink.record(&rec);
        }
        debug!(seq = %inst.seq(), "reclaimed");
    }

    // ══════════════════════════════════════════════════════════
    // Taint
    // ══════════════════════════════════════════════════════════

    /// Recomputes taint across the window.
    pub fn propagate_taint(&mut self) {
        TaintTracker::propagate(&mut self.window);
    }

    /// Releases stalled instructions whose taint has cleared.
    pub fn release_stalled(&mut self) -> Vec<InstSeqNum> {
        TaintTracker::release_stalled(&mut self.window)
    }

    /// Generic issue gate: operands ready and not stalled on taint.
    pub fn can_issue(&self, seq: InstSeqNum) -> bool {
        self.window.get(seq).is_some_and(TaintTracker::can_issue)
    }

    /// Returns true if taint permits `seq` to issue.
    pub fn taint_permits_issue(&self, seq: InstSeqNum) -> bool {
        self.window
            .get(seq)
            .is_some_and(|inst| TaintTracker::permits_issue(&self.window, inst))
    }

    /// Marks `seq` past the visibility point.
    #[track_caller]
    pub fn mark_unsquashable(&mut self, seq: InstSeqNum) {
        self.expect_mut(seq).mark_unsquashable();
    }

    /// Requests that `seq` squash younger instructions.
    ///
    /// If taint allows, the squash is applied right away and the squashed
    /// sequence numbers are returned; otherwise it is deferred.
    #[track_caller]
    pub fn request_squash(&mut self, seq: InstSeqNum) -> (SquashDecision, Vec<InstSeqNum>) {
        if !self.window.contains(seq) {
            violation(ContractViolation::StaleReference { seq });
        }
        match TaintTracker::request_squash(&mut self.window, seq, &mut self.stats) {
            SquashDecision::Immediate => {
                let tid = self.window.get(seq).map_or(0, DynInst::tid);
                (SquashDecision::Immediate, self.squash_younger_than(seq, tid))
            }
            SquashDecision::Deferred => (SquashDecision::Deferred, Vec::new()),
        }
    }

    /// Applies deferred squashes whose taint has resolved.
    ///
    /// # Returns
    ///
    /// The instructions whose squash was applied, in program order.
    pub fn apply_resolved_squashes(&mut self) -> Vec<InstSeqNum> {
        let resolved = TaintTracker::take_resolved_squashes(&mut self.window, &mut self.stats);
        for seq in &resolved {
            let tid = self.window.get(*seq).map_or(0, DynInst::tid);
            let _ = self.squash_younger_than(*seq, tid);
        }
        resolved
    }

    // ══════════════════════════════════════════════════════════
    // Shadow loads
    // ══════════════════════════════════════════════════════════

    /// Starts a shadow access for the load `seq` and initiates its read.
    ///
    /// # Returns
    ///
    /// The fault recorded on the instruction, if any.
    #[track_caller]
    pub fn initiate_shadow_read(
        &mut self,
        seq: InstSeqNum,
        addr: VirtAddr,
        size: u32,
        flags: RequestFlags,
    ) -> Option<Fault> {
        self.with_access(seq, |inst, cx| {
            ShadowLoad::begin(inst, cx.stats);
            inst.initiate_read(addr, size, flags, cx)
        })
    }

    /// Records the end of the shadow access of `seq`.
    ///
    /// # Returns
    ///
    /// True if dependents should be woken now; true at most once per instruction.
    #[track_caller]
    pub fn finish_shadow_load(&mut self, seq: InstSeqNum, success: bool) -> bool {
        let Some(inst) = self.window.get_mut(seq) else {
            violation(ContractViolation::StaleReference { seq });
        };
        let _ = ShadowLoad::finish(inst, success, &mut self.stats);
        ShadowLoad::take_wakeup(inst, &mut self.stats)
    }

    /// Clears the translation progress of `seq` for its real access.
    #[track_caller]
    pub fn reset_dopp(&mut self, seq: InstSeqNum) {
        ShadowLoad::reset(self.expect_mut(seq));
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("cycle", &self.cycle)
            .field("next_seq", &self.next_seq)
            .field("window", &self.window.len())
            .field("draining", &self.draining.len())
            .finish_non_exhaustive()
    }
}

impl Index<InstSeqNum> for Cpu {
    type Output = DynInst;

    #[track_caller]
    fn index(&self, seq: InstSeqNum) -> &DynInst {
        match self.window.get(seq) {
            Some(inst) => inst,
            None => violation(ContractViolation::StaleReference { seq }),
        }
    }
}
