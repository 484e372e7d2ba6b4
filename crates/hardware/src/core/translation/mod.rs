//! Address translation protocol.
//!
//! Turns an instruction's virtual access into one or two translated
//! requests and hands them to memory. The protocol:
//! 1. **Retry collapse:** Re-invoking an entry point while a translation is
//!    in flight issues nothing new.
//! 2. **Boundary split:** An access crossing a cache-line boundary becomes a
//!    low and a high fragment, translated independently.
//! 3. **Issue:** Fragments go to the [`TranslationBackend`], which answers
//!    immediately or later through a [`TranslationToken`].
//! 4. **Completion:** Results are merged, physical addresses and any fault
//!    are stored on the instruction, and the in-flight state is released.
//! 5. **Expose gate:** A normal read may only start while the instruction is
//!    ready to expose; a shadow load is exempt. Writes are not gated.
//!
//! In-flight state is owned by the instruction's [`TranslationPhase`], so
//! "started and not completed" is exactly "a saved request is held".

/// Translation and memory collaborator traits.
pub mod backend;

/// Memory requests, split points and tokens.
pub mod request;

/// In-flight translation bookkeeping.
pub mod state;

use tracing::{debug, trace};

use crate::common::constants::MAX_ACCESS_BYTES;
use crate::common::{
    AccessType, ContractViolation, Fault, RequestFlags, TranslationResult, VirtAddr, violation,
};
use crate::config::CoreConfig;
use crate::core::inst::DynInst;
use crate::core::inst::flags;
use crate::stats::CoreStats;

pub use self::backend::{DeferredCompletion, MemoryBackend, TranslationBackend};
pub use self::request::{
    Fragment, MemRequest, TranslatedAccess, TranslationToken, line_split_point,
};
pub use self::state::{FinishedTranslation, RecordOutcome, TranslationState};

/// Where an instruction's translation stands.
#[derive(Debug, Default)]
pub enum TranslationPhase {
    /// No translation started (or reset for a fresh attempt).
    #[default]
    Idle,
    /// Started, waiting for at least one fragment result.
    InFlight(Box<TranslationState>),
    /// Completed without fault; the finalized access is kept for (re)issue.
    Translated(TranslatedAccess),
    /// Completed with a fault, or abandoned after a squash. Nothing is held.
    Released,
}

/// Collaborators an entry point needs for one call.
pub struct MemContext<'a> {
    /// Core options.
    pub config: &'a CoreConfig,
    /// Address translation service.
    pub translator: &'a mut dyn TranslationBackend,
    /// Memory access service.
    pub memory: &'a mut dyn MemoryBackend,
    /// Counters.
    pub stats: &'a mut CoreStats,
}

/// Outcome of delivering a deferred translation result to an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Stored; the other fragment is still outstanding.
    Pending,
    /// Translation finished and its results were recorded.
    Finished,
    /// Translation finished on a squashed instruction and was discarded.
    Abandoned,
    /// No matching translation was in flight; the result was dropped.
    Stale,
}

enum Step {
    Pending,
    Ready(TranslatedAccess),
    Done,
}

impl DynInst {
    /// Returns true once a translation has been started.
    #[inline]
    pub const fn translation_started(&self) -> bool {
        !matches!(self.translation, TranslationPhase::Idle)
    }

    /// Returns true once the started translation has completed.
    #[inline]
    pub const fn translation_completed(&self) -> bool {
        matches!(
            self.translation,
            TranslationPhase::Translated(_) | TranslationPhase::Released
        )
    }

    /// Returns true while a translation is outstanding.
    #[inline]
    pub const fn is_translation_delayed(&self) -> bool {
        matches!(self.translation, TranslationPhase::InFlight(_))
    }

    /// Current translation phase.
    pub const fn translation_phase(&self) -> &TranslationPhase {
        &self.translation
    }

    /// Number of fragments still awaiting a result.
    pub fn outstanding_fragments(&self) -> usize {
        match &self.translation {
            TranslationPhase::InFlight(state) => state.outstanding(),
            _ => 0,
        }
    }

    /// Initiates a read of `size` bytes at `addr`.
    ///
    /// Safe to call repeatedly: while the translation is in flight nothing
    /// new is issued, and once it has completed the saved request is sent
    /// to memory.
    ///
    /// # Returns
    ///
    /// The fault recorded on the instruction, if any.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if the instruction is terminal, if
    /// a normal read is attempted while the expose gate is closed, or if
    /// the access size is invalid.
    #[track_caller]
    pub fn initiate_read(
        &mut self,
        addr: VirtAddr,
        size: u32,
        req_flags: RequestFlags,
        cx: &mut MemContext<'_>,
    ) -> Option<Fault> {
        self.ensure_live("initiate_read");
        let shadow = self.is_dopp_load_executing();
        if !shadow && !self.may_expose_read() {
            violation(ContractViolation::ExposeGateClosed { seq: self.seq() });
        }

        self.flags.set(flags::REQ_MADE, true);
        self.set_spec_tlb_miss(false);
        self.record_access(addr, size, req_flags);

        let step = self.translate(addr, size, req_flags, AccessType::Read, None, cx);
        if matches!(step, Step::Pending) {
            return self.fault.clone();
        }

        if self.fault.is_none() {
            if let Step::Ready(access) = step {
                self.begin_access(&access, size, cx.config);
                let Some(lq_idx) = self.lq_idx() else {
                    violation(ContractViolation::NotInLsq { seq: self.seq() });
                };
                cx.stats.reads_issued += 1;
                if shadow {
                    cx.stats.shadow_reads_issued += 1;
                }
                self.fault = cx.memory.read(&access, lq_idx);
            }
        } else if shadow {
            // A shadow access that faults gives up quietly; the real access
            // retranslates later.
            self.flags.set(flags::IS_DOPP_LOAD_EXECUTING, false);
            self.flags.set(flags::IS_DOPP_LOAD_SUCCESS, false);
            self.flags.set(flags::DOPP_FINISHED, true);
            self.flags.set(flags::DOPP_TRANSLATION_COMPLETED, true);
            self.translation = TranslationPhase::Idle;
            debug!(seq = %self.seq(), "shadow load faulted, translation reset");
        } else {
            self.set_executed();
        }

        self.fault.clone()
    }

    /// Initiates a write of `data` (`size` bytes) at `addr`.
    ///
    /// `res` is the extra data carried by a conditional swap.
    ///
    /// # Returns
    ///
    /// The fault recorded on the instruction, if any.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if the instruction is terminal, if
    /// the access size is invalid, or if `data` is not exactly `size` bytes.
    #[track_caller]
    pub fn initiate_write(
        &mut self,
        data: &[u8],
        size: u32,
        addr: VirtAddr,
        req_flags: RequestFlags,
        res: Option<u64>,
        cx: &mut MemContext<'_>,
    ) -> Option<Fault> {
        self.ensure_live("initiate_write");
        if data.len() != size as usize {
            violation(ContractViolation::DataSizeMismatch {
                seq: self.seq(),
                size,
                len: data.len(),
            });
        }
        self.flags.set(flags::REQ_MADE, true);
        self.record_access(addr, size, req_flags);

        let step = self.translate(addr, size, req_flags, AccessType::Write, res, cx);
        if let Step::Ready(access) = step
            && self.fault.is_none()
        {
            self.begin_access(&access, size, cx.config);
            let Some(sq_idx) = self.sq_idx() else {
                violation(ContractViolation::NotInLsq { seq: self.seq() });
            };
            cx.stats.writes_issued += 1;
            self.fault = cx.memory.write(&access, data, sq_idx);
        }

        self.fault.clone()
    }

    fn record_access(&mut self, addr: VirtAddr, size: u32, req_flags: RequestFlags) {
        if let Some(rec) = self.trace.as_mut() {
            rec.set_mem(addr, size, req_flags);
        }
    }

    fn begin_access(&mut self, access: &TranslatedAccess, size: u32, config: &CoreConfig) {
        self.eff_addr = access.main.vaddr;
        self.eff_size = size;
        self.flags.set(flags::EFF_ADDR_VALID, true);
        if config.checker_enabled {
            self.req_to_verify = Some(access.clone());
        }
    }

    /// Drives the translation phase forward without issuing memory.
    fn translate(
        &mut self,
        addr: VirtAddr,
        size: u32,
        req_flags: RequestFlags,
        mode: AccessType,
        res: Option<u64>,
        cx: &mut MemContext<'_>,
    ) -> Step {
        match &self.translation {
            TranslationPhase::InFlight(state) => {
                cx.stats.retry_collapses += 1;
                trace!(seq = %self.seq(), outstanding = state.outstanding(), "translation retry collapsed");
                return Step::Pending;
            }
            TranslationPhase::Translated(access) => return Step::Ready(access.clone()),
            TranslationPhase::Released => return Step::Done,
            TranslationPhase::Idle => {}
        }

        if size == 0 || size > MAX_ACCESS_BYTES {
            violation(ContractViolation::BadAccessSize {
                seq: self.seq(),
                size,
            });
        }

        let req = MemRequest::new(addr, size, req_flags, self.pc(), self.tid(), self.asid());
        let halves = if cx.config.unaligned_access {
            let line = cx.config.cache_line_bytes;
            if u64::from(size) > line {
                violation(ContractViolation::SplitTooWide { seq: self.seq() });
            }
            line_split_point(addr, size, line).map(|split| req.split_on_vaddr(split))
        } else {
            None
        };

        self.initiate_translation(req, halves, mode, res, cx);

        match &self.translation {
            TranslationPhase::Translated(access) => Step::Ready(access.clone()),
            TranslationPhase::InFlight(_) => Step::Pending,
            TranslationPhase::Released | TranslationPhase::Idle => Step::Done,
        }
    }

    /// Issues every fragment to the backend and records synchronous results.
    fn initiate_translation(
        &mut self,
        main: MemRequest,
        halves: Option<(MemRequest, MemRequest)>,
        mode: AccessType,
        res: Option<u64>,
        cx: &mut MemContext<'_>,
    ) {
        self.translation_generation = self.translation_generation.wrapping_add(1);
        let generation = self.translation_generation;
        let mut state = TranslationState::new(main, halves, mode, generation, res);
        if state.is_split() {
            cx.stats.split_requests += 1;
        }

        for (fragment, req) in state.fragments() {
            let token = TranslationToken {
                seq: self.seq(),
                generation,
                fragment,
            };
            cx.stats.translations_issued += 1;
            trace!(seq = %self.seq(), ?fragment, vaddr = %req.vaddr, size = req.size, mode = mode.name(), "translate");
            if let Some(result) = cx.translator.translate_timing(&req, self.tid(), mode, token) {
                let _ = state.record(fragment, result);
            }
        }

        if state.is_complete() {
            self.finish_translation(state, cx.stats);
        } else {
            // The old fault belongs to a previous attempt.
            self.fault = None;
            cx.stats.deferred_translations += 1;
            debug!(seq = %self.seq(), outstanding = state.outstanding(), "translation delayed");
            self.translation = TranslationPhase::InFlight(Box::new(state));
        }
    }

    /// Stores the merged outcome of a completed translation.
    fn finish_translation(&mut self, state: TranslationState, stats: &mut CoreStats) {
        let FinishedTranslation {
            outcome,
            strictly_ordered,
            flags: merged,
        } = state.finish();

        self.flags.set(flags::IS_STRICTLY_ORDERED, strictly_ordered);
        match outcome {
            Ok(access) => {
                self.fault = None;
                self.phys_eff_addr_low = access.paddr_low();
                self.phys_eff_addr_high = access.paddr_high();
                self.mem_req_flags = merged;
                if let Some(rec) = self.trace.as_mut() {
                    rec.set_paddr(access.paddr_low());
                }
                trace!(seq = %self.seq(), paddr = ?access.paddr_low(), split = access.is_split(), "translation finished");
                self.translation = TranslationPhase::Translated(access);
            }
            Err(fault) => {
                stats.translation_faults += 1;
                debug!(seq = %self.seq(), %fault, "translation faulted");
                self.fault = Some(fault);
                self.translation = TranslationPhase::Released;
            }
        }

        if self.is_dopp_load_executing() {
            self.flags.set(flags::DOPP_TRANSLATION_COMPLETED, true);
        }
    }

    /// Delivers a deferred translation result.
    ///
    /// A result for a squashed instruction releases the in-flight state
    /// without touching any address or fault field.
    pub(crate) fn complete_translation(
        &mut self,
        token: TranslationToken,
        result: TranslationResult,
        stats: &mut CoreStats,
    ) -> CompletionOutcome {
        let TranslationPhase::InFlight(state) = &mut self.translation else {
            return CompletionOutcome::Stale;
        };
        if state.generation() != token.generation {
            return CompletionOutcome::Stale;
        }
        match state.record(token.fragment, result) {
            RecordOutcome::Rejected => return CompletionOutcome::Stale,
            RecordOutcome::Pending => return CompletionOutcome::Pending,
            RecordOutcome::Complete => {}
        }

        let TranslationPhase::InFlight(state) =
            std::mem::replace(&mut self.translation, TranslationPhase::Released)
        else {
            return CompletionOutcome::Stale;
        };

        if self.is_squashed() {
            stats.late_completions += 1;
            debug!(seq = %self.seq(), "translation completed after squash, released");
            drop(state);
            return CompletionOutcome::Abandoned;
        }

        self.finish_translation(*state, stats);
        CompletionOutcome::Finished
    }

    /// Forgets the current translation so the next access retranslates.
    pub(crate) fn reset_translation(&mut self) {
        self.translation = TranslationPhase::Idle;
    }
}
