//! Dynamic instruction record.
//!
//! A [`DynInst`] is one in-flight, possibly speculative instance of a
//! decoded instruction. It carries:
//! 1. **Identity:** Sequence number, thread, PC and predicted next PC, static form.
//! 2. **Lifecycle:** Progress along the dispatch-to-commit path, squash sites
//!    and container membership.
//! 3. **Flags:** Taint axes, shadow-load progress and translation side effects.
//! 4. **Operands:** Result queue, rename state, ready bits and producer links.
//! 5. **Memory:** Effective and physical addresses, the translation phase and
//!    forwarding buffers.
//!
//! The scheduler drives progress through the setters here. Translation,
//! taint and shadow-load behavior live in sibling modules and operate on
//! the same record.
//!
//! Once the instruction is committed or squashed every public mutator
//! panics. Membership clears and stall-list removal stay legal so that
//! containers can drop a terminal record.

/// Orthogonal flag bits.
pub mod flags;

/// Operand and result bookkeeping.
pub mod operands;

/// Progress, squash sites, membership and status markers.
pub mod status;

use std::sync::Arc;

use tracing::debug;

use crate::common::constants::{MAX_INST_DEST_REGS, MAX_INST_SRC_REGS};
use crate::common::{
    ContractViolation, Fault, InstSeqNum, PhysAddr, RequestFlags, ThreadId, VirtAddr, violation,
};
use crate::config::CoreConfig;
use crate::core::translation::{TranslatedAccess, TranslationPhase};
use crate::isa::{RegId, StaticInst};
use crate::trace::InstRecord;

use self::flags::InstFlags;
use self::operands::{InstResult, PhysRegId, ProducerLinks, RenameState, ResultQueue};
use self::status::{LsqSlot, Membership, Progress, SquashSite, SquashSites, StatusMarks};

/// Store-to-load forwarding state of one access.
///
/// The load/store queue fills these when memory answers or an older store
/// forwards. A load keeps one set for its real access and one for its
/// shadow access; [`DynInst::forward_buffers_mut`] picks the set of the
/// access currently in flight, so the shadow never writes into the real
/// access's buffers.
#[derive(Clone, Debug, Default)]
pub struct ForwardBuffers {
    /// Data returned by memory.
    pub mem_data: Option<Vec<u8>>,
    /// Data forwarded from an older store.
    pub st_fwd_data: Option<Vec<u8>>,
    /// A store has already forwarded into this access.
    pub already_forwarded: bool,
}

/// One in-flight instruction.
#[derive(Debug)]
pub struct DynInst {
    seq: InstSeqNum,
    tid: ThreadId,
    static_inst: Arc<StaticInst>,
    macroop: Option<Arc<StaticInst>>,
    pc: u64,
    pred_pc: u64,
    resolved_npc: Option<u64>,
    asid: u16,
    dopp_enabled: bool,

    progress: Progress,
    squash_sites: SquashSites,
    membership: Membership,
    marks: StatusMarks,
    pub(crate) flags: InstFlags,

    results: ResultQueue,
    rename: RenameState,
    producers: ProducerLinks,

    pub(crate) fault: Option<Fault>,
    pub(crate) eff_addr: VirtAddr,
    pub(crate) eff_size: u32,
    pub(crate) phys_eff_addr_low: Option<PhysAddr>,
    pub(crate) phys_eff_addr_high: Option<PhysAddr>,
    pub(crate) mem_req_flags: RequestFlags,
    pub(crate) translation: TranslationPhase,
    pub(crate) translation_generation: u32,
    pub(crate) req_to_verify: Option<TranslatedAccess>,
    pub(crate) trace: Option<InstRecord>,

    pub(crate) forward: ForwardBuffers,
    pub(crate) shadow_forward: ForwardBuffers,
}

impl DynInst {
    /// Creates a freshly dispatched instruction.
    ///
    /// # Arguments
    ///
    /// * `seq` - Program-order sequence number, unique for the CPU's lifetime.
    /// * `tid` - Owning hardware thread.
    /// * `static_inst` - Shared decoded form.
    /// * `pc` - Address of the instruction.
    /// * `pred_pc` - Predicted address of the next instruction.
    /// * `config` - Core options (shadow-load enable is latched here).
    pub fn new(
        seq: InstSeqNum,
        tid: ThreadId,
        static_inst: Arc<StaticInst>,
        pc: u64,
        pred_pc: u64,
        config: &CoreConfig,
    ) -> Self {
        let mut initial = InstFlags::default();
        initial.set(flags::READY_TO_EXPOSE, true);
        initial.set(flags::PREDICATE, true);
        Self {
            seq,
            tid,
            static_inst,
            macroop: None,
            pc,
            pred_pc,
            resolved_npc: None,
            asid: 0,
            dopp_enabled: config.dopp_enabled,
            progress: Progress::Dispatched,
            squash_sites: SquashSites::default(),
            membership: Membership::default(),
            marks: StatusMarks::default(),
            flags: initial,
            results: ResultQueue::default(),
            rename: RenameState::default(),
            producers: [None; MAX_INST_SRC_REGS],
            fault: None,
            eff_addr: VirtAddr::default(),
            eff_size: 0,
            phys_eff_addr_low: None,
            phys_eff_addr_high: None,
            mem_req_flags: RequestFlags::NONE,
            translation: TranslationPhase::Idle,
            translation_generation: 0,
            req_to_verify: None,
            trace: None,
            forward: ForwardBuffers::default(),
            shadow_forward: ForwardBuffers::default(),
        }
    }

    /// Attaches the macro-op this instruction was cracked from.
    #[must_use]
    pub fn with_macroop(mut self, macroop: Arc<StaticInst>) -> Self {
        self.macroop = Some(macroop);
        self
    }

    /// Sets the address-space id used on memory requests.
    #[must_use]
    pub fn with_asid(mut self, asid: u16) -> Self {
        self.asid = asid;
        self
    }

    /// Enables collection of a trace record.
    pub(crate) fn enable_trace(&mut self) {
        self.trace = Some(InstRecord::new(
            self.seq,
            self.tid,
            self.pc,
            self.static_inst.mnemonic,
        ));
    }

    // ══════════════════════════════════════════════════════════
    // Identity
    // ══════════════════════════════════════════════════════════

    /// Sequence number.
    #[inline(always)]
    pub const fn seq(&self) -> InstSeqNum {
        self.seq
    }

    /// Owning thread.
    #[inline(always)]
    pub const fn tid(&self) -> ThreadId {
        self.tid
    }

    /// Address of the instruction.
    #[inline(always)]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Predicted next PC.
    #[inline(always)]
    pub const fn pred_pc(&self) -> u64 {
        self.pred_pc
    }

    /// Address-space id.
    #[inline(always)]
    pub const fn asid(&self) -> u16 {
        self.asid
    }

    /// Decoded form.
    #[inline(always)]
    pub fn static_inst(&self) -> &StaticInst {
        &self.static_inst
    }

    /// Macro-op this instruction was cracked from, if any.
    pub fn macroop(&self) -> Option<&StaticInst> {
        self.macroop.as_deref()
    }

    /// Returns true if the shadow-load mechanism is enabled for this core.
    #[inline]
    pub const fn dopp_enabled(&self) -> bool {
        self.dopp_enabled
    }

    /// Replaces the predicted next PC.
    #[track_caller]
    pub fn set_pred_target(&mut self, pred_pc: u64) {
        self.ensure_live("set_pred_target");
        self.pred_pc = pred_pc;
    }

    /// Records the next PC computed by execution.
    #[track_caller]
    pub fn set_resolved_next_pc(&mut self, npc: u64) {
        self.ensure_live("set_resolved_next_pc");
        self.resolved_npc = Some(npc);
    }

    /// Fall-through address.
    pub fn fall_through(&self) -> u64 {
        self.pc.wrapping_add(u64::from(self.static_inst.size))
    }

    /// Returns true if the predicted next PC differs from the resolved one.
    ///
    /// Before execution resolves a next PC, the fall-through (or static
    /// target of an unconditional direct branch) stands in for it.
    pub fn mispredicted(&self) -> bool {
        let actual = self.resolved_npc.unwrap_or_else(|| {
            let flags = &self.static_inst.flags;
            if flags.direct_ctrl && !flags.cond_ctrl {
                self.static_inst
                    .branch_target(self.pc)
                    .unwrap_or_else(|| self.fall_through())
            } else {
                self.fall_through()
            }
        });
        actual != self.pred_pc
    }

    /// Static branch target, if the instruction is a direct control transfer.
    pub fn branch_target(&self) -> Option<u64> {
        self.static_inst.branch_target(self.pc)
    }

    /// Returns true if the instruction reads memory.
    #[inline]
    pub fn is_load(&self) -> bool {
        self.static_inst.flags.load
    }

    /// Returns true if the instruction writes memory.
    #[inline]
    pub fn is_store(&self) -> bool {
        self.static_inst.flags.store
    }

    /// Returns true if the instruction accesses memory.
    #[inline]
    pub fn is_mem_ref(&self) -> bool {
        self.static_inst.is_mem_ref()
    }

    /// Returns true if the instruction is a store-conditional.
    pub fn is_store_conditional(&self) -> bool {
        self.static_inst.flags.store_conditional
    }

    /// Returns true for an instruction or data prefetch.
    pub fn is_prefetch(&self) -> bool {
        self.static_inst.flags.inst_prefetch || self.static_inst.flags.data_prefetch
    }

    /// Returns true for a floating-point instruction.
    pub fn is_floating(&self) -> bool {
        self.static_inst.flags.floating
    }

    /// Returns true for a control transfer.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.static_inst.flags.control
    }

    /// Returns true for a call.
    pub fn is_call(&self) -> bool {
        self.static_inst.flags.call
    }

    /// Returns true for a return.
    pub fn is_return(&self) -> bool {
        self.static_inst.flags.ret
    }

    /// Returns true for a direct control transfer.
    pub fn is_direct_ctrl(&self) -> bool {
        self.static_inst.flags.direct_ctrl
    }

    /// Returns true for a conditional control transfer.
    pub fn is_cond_ctrl(&self) -> bool {
        self.static_inst.flags.cond_ctrl
    }

    /// Returns true for a thread-synchronization instruction.
    pub fn is_thread_sync(&self) -> bool {
        self.static_inst.flags.thread_sync
    }

    /// Returns true for a full memory barrier.
    pub fn is_mem_barrier(&self) -> bool {
        self.static_inst.flags.mem_barrier
    }

    /// Returns true for a write barrier.
    pub fn is_write_barrier(&self) -> bool {
        self.static_inst.flags.write_barrier
    }

    /// Returns true if the instruction only executes non-speculatively.
    pub fn is_non_speculative(&self) -> bool {
        self.static_inst.flags.non_speculative
    }

    /// Returns true if younger instructions are squashed after this one.
    pub fn is_squash_after(&self) -> bool {
        self.static_inst.flags.squash_after
    }

    /// Returns true for a system call.
    pub fn is_syscall(&self) -> bool {
        self.static_inst.flags.syscall
    }

    /// Returns true for a nop.
    pub fn is_nop(&self) -> bool {
        self.static_inst.flags.nop
    }

    /// Number of source registers.
    pub fn num_src_regs(&self) -> usize {
        self.static_inst.num_src_regs()
    }

    /// Number of destination registers.
    pub fn num_dest_regs(&self) -> usize {
        self.static_inst.num_dest_regs()
    }

    // ══════════════════════════════════════════════════════════
    // Lifecycle
    // ══════════════════════════════════════════════════════════

    /// Current position on the progress path.
    #[inline]
    pub const fn progress(&self) -> Progress {
        self.progress
    }

    /// Returns true once the instruction has committed or been squashed.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.progress, Progress::Committed) || !self.squash_sites.is_empty()
    }

    /// Fails fast if the instruction has reached a terminal state.
    #[track_caller]
    pub(crate) fn ensure_live(&self, op: &'static str) {
        if self.is_squashed() {
            violation(ContractViolation::TerminalMutation {
                seq: self.seq,
                op,
                state: "squashed",
            });
        }
        if self.is_committed() {
            violation(ContractViolation::TerminalMutation {
                seq: self.seq,
                op,
                state: "committed",
            });
        }
    }

    #[track_caller]
    fn advance(&mut self, to: Progress, op: &'static str) {
        self.ensure_live(op);
        if to > self.progress {
            debug!(seq = %self.seq, from = %self.progress, to = %to, "progress");
            self.progress = to;
        }
    }

    /// Marks the instruction ready to issue.
    #[track_caller]
    pub fn set_can_issue(&mut self) {
        self.advance(Progress::CanIssue, "set_can_issue");
    }

    /// Marks the instruction issued.
    #[track_caller]
    pub fn set_issued(&mut self) {
        self.advance(Progress::Issued, "set_issued");
    }

    /// Marks the instruction executed.
    #[track_caller]
    pub fn set_executed(&mut self) {
        self.advance(Progress::Executed, "set_executed");
    }

    /// Marks a memory instruction speculatively complete.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation on a non-memory instruction.
    #[track_caller]
    pub fn set_spec_completed(&mut self) {
        if !self.is_mem_ref() {
            violation(ContractViolation::SpecCompletedOnNonMemory { seq: self.seq });
        }
        self.advance(Progress::SpecCompleted, "set_spec_completed");
        self.marks.set(status::SPEC_COMPLETED, true);
    }

    /// Marks the instruction eligible to commit.
    #[track_caller]
    pub fn set_can_commit(&mut self) {
        self.advance(Progress::CanCommit, "set_can_commit");
    }

    /// Marks the instruction as being at the commit point.
    #[track_caller]
    pub fn set_at_commit(&mut self) {
        self.advance(Progress::AtCommit, "set_at_commit");
    }

    /// Retires the instruction. Terminal.
    #[track_caller]
    pub fn set_committed(&mut self) {
        self.advance(Progress::Committed, "set_committed");
    }

    /// Squashes the instruction, recording where the squash was observed.
    ///
    /// Squashing is terminal, but repeated squashes from other containers
    /// are accepted and only add their site.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if the instruction has committed.
    #[track_caller]
    pub fn squash(&mut self, site: SquashSite) {
        if self.is_committed() {
            violation(ContractViolation::TerminalMutation {
                seq: self.seq,
                op: "squash",
                state: "committed",
            });
        }
        if self.squash_sites.is_empty() {
            debug!(seq = %self.seq, ?site, progress = %self.progress, "squashed");
        }
        self.squash_sites.add(site);
    }

    /// Squashes the instruction from the pipeline at large.
    #[track_caller]
    pub fn set_squashed(&mut self) {
        self.squash(SquashSite::Pipeline);
    }

    /// Squashes the instruction from the issue queue.
    #[track_caller]
    pub fn set_squashed_in_iq(&mut self) {
        self.squash(SquashSite::InstQueue);
    }

    /// Squashes the instruction from the load/store queue.
    #[track_caller]
    pub fn set_squashed_in_lsq(&mut self) {
        self.squash(SquashSite::LoadStoreQueue);
    }

    /// Squashes the instruction from the reorder buffer.
    #[track_caller]
    pub fn set_squashed_in_rob(&mut self) {
        self.squash(SquashSite::ReorderBuffer);
    }

    /// Returns true if the instruction has been squashed anywhere.
    #[inline]
    pub const fn is_squashed(&self) -> bool {
        !self.squash_sites.is_empty()
    }

    /// Returns true if squashed by the issue queue.
    pub const fn is_squashed_in_iq(&self) -> bool {
        self.squash_sites.contains(SquashSite::InstQueue)
    }

    /// Returns true if squashed by the load/store queue.
    pub const fn is_squashed_in_lsq(&self) -> bool {
        self.squash_sites.contains(SquashSite::LoadStoreQueue)
    }

    /// Returns true if squashed by the reorder buffer.
    pub const fn is_squashed_in_rob(&self) -> bool {
        self.squash_sites.contains(SquashSite::ReorderBuffer)
    }

    /// Returns true once the instruction may be selected for issue.
    #[inline]
    pub fn ready_to_issue(&self) -> bool {
        self.progress >= Progress::CanIssue && !self.is_terminal()
    }

    /// Returns true once issued.
    pub fn is_issued(&self) -> bool {
        self.progress >= Progress::Issued
    }

    /// Returns true once executed.
    pub fn is_executed(&self) -> bool {
        self.progress >= Progress::Executed
    }

    /// Returns true once a memory instruction is speculatively complete.
    pub const fn is_spec_completed(&self) -> bool {
        self.marks.get(status::SPEC_COMPLETED)
    }

    /// Returns true once eligible to commit.
    pub fn can_commit(&self) -> bool {
        self.progress >= Progress::CanCommit
    }

    /// Returns true while at the commit point.
    pub fn is_at_commit(&self) -> bool {
        self.progress >= Progress::AtCommit
    }

    /// Returns true once committed.
    #[inline]
    pub const fn is_committed(&self) -> bool {
        matches!(self.progress, Progress::Committed)
    }

    /// Returns true if commit may retire the instruction.
    ///
    /// An instruction with a deferred squash only retires once that squash
    /// has been applied.
    #[inline]
    pub fn ready_to_commit(&self) -> bool {
        self.can_commit() && (!self.has_pending_squash() || self.is_squashed())
    }

    // ══════════════════════════════════════════════════════════
    // Membership
    // ══════════════════════════════════════════════════════════

    /// Container membership.
    #[inline]
    pub const fn membership(&self) -> Membership {
        self.membership
    }

    /// Records insertion into the issue queue.
    #[track_caller]
    pub fn set_in_iq(&mut self) {
        self.ensure_live("set_in_iq");
        self.membership.iq = true;
    }

    /// Records removal from the issue queue.
    pub const fn clear_in_iq(&mut self) {
        self.membership.iq = false;
    }

    /// Returns true while held by the issue queue.
    pub const fn is_in_iq(&self) -> bool {
        self.membership.iq
    }

    /// Records insertion into the reorder buffer.
    #[track_caller]
    pub fn set_in_rob(&mut self) {
        self.ensure_live("set_in_rob");
        self.membership.rob = true;
    }

    /// Records removal from the reorder buffer.
    pub const fn clear_in_rob(&mut self) {
        self.membership.rob = false;
    }

    /// Returns true while held by the reorder buffer.
    pub const fn is_in_rob(&self) -> bool {
        self.membership.rob
    }

    /// Records insertion into the load/store queue at `slot`.
    #[track_caller]
    pub fn set_in_lsq(&mut self, slot: LsqSlot) {
        self.ensure_live("set_in_lsq");
        self.membership.lsq = Some(slot);
    }

    /// Records removal from the load/store queue; the slot index is dropped.
    pub const fn clear_in_lsq(&mut self) {
        self.membership.lsq = None;
    }

    /// Returns true while held by the load/store queue.
    pub const fn is_in_lsq(&self) -> bool {
        self.membership.lsq.is_some()
    }

    /// Load-queue index, only while in the load queue.
    pub const fn lq_idx(&self) -> Option<u16> {
        self.membership.lq_idx()
    }

    /// Store-queue index, only while in the store queue.
    pub const fn sq_idx(&self) -> Option<u16> {
        self.membership.sq_idx()
    }

    // ══════════════════════════════════════════════════════════
    // Status markers
    // ══════════════════════════════════════════════════════════

    /// Marks the result computed.
    #[track_caller]
    pub fn set_completed(&mut self) {
        self.ensure_live("set_completed");
        self.marks.set(status::COMPLETED, true);
    }

    /// Returns true once the result has been computed.
    pub const fn is_completed(&self) -> bool {
        self.marks.get(status::COMPLETED)
    }

    /// Marks the result readable by dependents.
    #[track_caller]
    pub fn set_result_ready(&mut self) {
        self.ensure_live("set_result_ready");
        self.marks.set(status::RESULT_READY, true);
    }

    /// Returns true once dependents may read the result.
    pub const fn is_result_ready(&self) -> bool {
        self.marks.get(status::RESULT_READY)
    }

    /// Marks the memory operation completed in an exposable way.
    #[track_caller]
    pub fn set_expose_completed(&mut self) {
        self.ensure_live("set_expose_completed");
        self.marks.set(status::EXPOSE_COMPLETED, true);
    }

    /// Returns true once the memory operation's completion may be exposed.
    pub const fn is_expose_completed(&self) -> bool {
        self.marks.get(status::EXPOSE_COMPLETED)
    }

    /// Marks every older instruction completed.
    #[track_caller]
    pub fn set_prev_insts_completed(&mut self) {
        self.ensure_live("set_prev_insts_completed");
        self.marks.set(status::PREV_INSTS_COMPLETED, true);
    }

    /// Returns true once every older instruction has completed.
    pub const fn is_prev_insts_completed(&self) -> bool {
        self.marks.get(status::PREV_INSTS_COMPLETED)
    }

    /// Marks every older branch resolved.
    #[track_caller]
    pub fn set_prev_brs_resolved(&mut self) {
        self.ensure_live("set_prev_brs_resolved");
        self.marks.set(status::PREV_BRS_RESOLVED, true);
    }

    /// Returns true once every older branch has resolved.
    pub const fn is_prev_brs_resolved(&self) -> bool {
        self.marks.get(status::PREV_BRS_RESOLVED)
    }

    /// Marks every older instruction committed.
    #[track_caller]
    pub fn set_prev_insts_committed(&mut self) {
        self.ensure_live("set_prev_insts_committed");
        self.marks.set(status::PREV_INSTS_COMMITTED, true);
    }

    /// Returns true once every older instruction has committed.
    pub const fn is_prev_insts_committed(&self) -> bool {
        self.marks.get(status::PREV_INSTS_COMMITTED)
    }

    /// Marks every older branch committed.
    #[track_caller]
    pub fn set_prev_brs_committed(&mut self) {
        self.ensure_live("set_prev_brs_committed");
        self.marks.set(status::PREV_BRS_COMMITTED, true);
    }

    /// Returns true once every older branch has committed.
    pub const fn is_prev_brs_committed(&self) -> bool {
        self.marks.get(status::PREV_BRS_COMMITTED)
    }

    /// Records whether the low (or only) access hit in the L1.
    #[track_caller]
    pub fn set_l1_hit_low(&mut self, hit: bool) {
        self.ensure_live("set_l1_hit_low");
        self.marks.set(status::L1_HIT_LOW, hit);
    }

    /// Returns true if the low (or only) access hit in the L1.
    pub const fn l1_hit_low(&self) -> bool {
        self.marks.get(status::L1_HIT_LOW)
    }

    /// Records whether the high access hit in the L1.
    #[track_caller]
    pub fn set_l1_hit_high(&mut self, hit: bool) {
        self.ensure_live("set_l1_hit_high");
        self.marks.set(status::L1_HIT_HIGH, hit);
    }

    /// Returns true if the high access hit in the L1.
    pub const fn l1_hit_high(&self) -> bool {
        self.marks.get(status::L1_HIT_HIGH)
    }

    /// Places the instruction in the taint stall list.
    #[track_caller]
    pub fn add_to_stall_list(&mut self) {
        self.ensure_live("add_to_stall_list");
        self.marks.set(status::IN_STALL_LIST, true);
    }

    /// Takes the instruction out of the taint stall list.
    pub const fn remove_from_stall_list(&mut self) {
        self.marks.set(status::IN_STALL_LIST, false);
    }

    /// Returns true while waiting in the taint stall list.
    #[inline]
    pub const fn is_in_stall_list(&self) -> bool {
        self.marks.get(status::IN_STALL_LIST)
    }

    /// Requires the instruction to serialize before executing.
    #[track_caller]
    pub fn set_serialize_before(&mut self) {
        self.ensure_live("set_serialize_before");
        self.marks.set(status::SERIALIZE_BEFORE, true);
    }

    /// Drops the temporary serialize-before requirement.
    #[track_caller]
    pub fn clear_serialize_before(&mut self) {
        self.ensure_live("clear_serialize_before");
        self.marks.set(status::SERIALIZE_BEFORE, false);
    }

    /// Returns true if the temporary serialize-before marker is set.
    pub const fn is_temp_serialize_before(&self) -> bool {
        self.marks.get(status::SERIALIZE_BEFORE)
    }

    /// Returns true if the instruction must serialize before executing.
    pub fn is_serialize_before(&self) -> bool {
        self.static_inst.flags.serialize_before || self.is_temp_serialize_before()
    }

    /// Requires younger instructions to serialize after this one.
    #[track_caller]
    pub fn set_serialize_after(&mut self) {
        self.ensure_live("set_serialize_after");
        self.marks.set(status::SERIALIZE_AFTER, true);
    }

    /// Drops the temporary serialize-after requirement.
    #[track_caller]
    pub fn clear_serialize_after(&mut self) {
        self.ensure_live("clear_serialize_after");
        self.marks.set(status::SERIALIZE_AFTER, false);
    }

    /// Returns true if the temporary serialize-after marker is set.
    pub const fn is_temp_serialize_after(&self) -> bool {
        self.marks.get(status::SERIALIZE_AFTER)
    }

    /// Returns true if younger instructions must serialize after this one.
    pub fn is_serialize_after(&self) -> bool {
        self.static_inst.flags.serialize_after || self.is_temp_serialize_after()
    }

    /// Marks serialization handled.
    #[track_caller]
    pub fn set_serialize_handled(&mut self) {
        self.ensure_live("set_serialize_handled");
        self.marks.set(status::SERIALIZE_HANDLED, true);
    }

    /// Returns true once serialization has been handled.
    pub const fn is_serialize_handled(&self) -> bool {
        self.marks.get(status::SERIALIZE_HANDLED)
    }

    /// Marks the instruction removed from the window.
    pub(crate) const fn set_removed(&mut self) {
        self.marks.set(status::REMOVED, true);
    }

    /// Returns true once removed from the window.
    pub const fn is_removed(&self) -> bool {
        self.marks.get(status::REMOVED)
    }

    // ══════════════════════════════════════════════════════════
    // Misc flags
    // ══════════════════════════════════════════════════════════

    /// Raw flag set.
    #[inline]
    pub const fn flags(&self) -> InstFlags {
        self.flags
    }

    /// Marks the record as not a real instruction.
    #[track_caller]
    pub fn set_not_an_inst(&mut self) {
        self.ensure_live("set_not_an_inst");
        self.flags.set(flags::NOT_AN_INST, true);
    }

    /// Returns true if the record is not a real instruction.
    pub const fn not_an_inst(&self) -> bool {
        self.flags.get(flags::NOT_AN_INST)
    }

    /// Records a possible load-ordering violation.
    #[track_caller]
    pub fn set_possible_load_violation(&mut self, on: bool) {
        self.ensure_live("set_possible_load_violation");
        self.flags.set(flags::POSSIBLE_LOAD_VIOLATION, on);
    }

    /// Returns true if a load-ordering violation is possible.
    pub const fn possible_load_violation(&self) -> bool {
        self.flags.get(flags::POSSIBLE_LOAD_VIOLATION)
    }

    /// Records an external snoop hit.
    #[track_caller]
    pub fn set_hit_external_snoop(&mut self, on: bool) {
        self.ensure_live("set_hit_external_snoop");
        self.flags.set(flags::HIT_EXTERNAL_SNOOP, on);
    }

    /// Returns true if an external snoop hit the instruction.
    pub const fn hit_external_snoop(&self) -> bool {
        self.flags.get(flags::HIT_EXTERNAL_SNOOP)
    }

    /// Records an invalidation hit.
    #[track_caller]
    pub fn set_hit_invalidation(&mut self, on: bool) {
        self.ensure_live("set_hit_invalidation");
        self.flags.set(flags::HIT_INVALIDATION, on);
    }

    /// Returns true if an invalidation hit the instruction.
    pub const fn hit_invalidation(&self) -> bool {
        self.flags.get(flags::HIT_INVALIDATION)
    }

    /// Records an external eviction hit.
    #[track_caller]
    pub fn set_hit_external_eviction(&mut self, on: bool) {
        self.ensure_live("set_hit_external_eviction");
        self.flags.set(flags::HIT_EXTERNAL_EVICTION, on);
    }

    /// Returns true if an external eviction hit the instruction.
    pub const fn hit_external_eviction(&self) -> bool {
        self.flags.get(flags::HIT_EXTERNAL_EVICTION)
    }

    /// Records a validation failure.
    #[track_caller]
    pub fn set_validation_fail(&mut self, on: bool) {
        self.ensure_live("set_validation_fail");
        self.flags.set(flags::VALIDATION_FAIL, on);
    }

    /// Returns true if validation failed.
    pub const fn validation_fail(&self) -> bool {
        self.flags.get(flags::VALIDATION_FAIL)
    }

    /// Records that the instruction only waits for a fence.
    #[track_caller]
    pub fn set_only_wait_for_fence(&mut self, on: bool) {
        self.ensure_live("set_only_wait_for_fence");
        self.flags.set(flags::ONLY_WAIT_FOR_FENCE, on);
    }

    /// Returns true if the instruction only waits for a fence.
    pub const fn only_wait_for_fence(&self) -> bool {
        self.flags.get(flags::ONLY_WAIT_FOR_FENCE)
    }

    /// Records a speculative TLB miss.
    #[track_caller]
    pub fn set_spec_tlb_miss(&mut self, on: bool) {
        self.ensure_live("set_spec_tlb_miss");
        self.flags.set(flags::SPEC_TLB_MISS, on);
    }

    /// Returns true if the translation missed speculatively.
    pub const fn spec_tlb_miss(&self) -> bool {
        self.flags.get(flags::SPEC_TLB_MISS)
    }

    /// Marks the memory operation done.
    #[track_caller]
    pub fn set_mem_op_done(&mut self, on: bool) {
        self.ensure_live("set_mem_op_done");
        self.flags.set(flags::MEM_OP_DONE, on);
    }

    /// Returns true once the memory operation is done.
    pub const fn mem_op_done(&self) -> bool {
        self.flags.get(flags::MEM_OP_DONE)
    }

    /// Returns true once a memory request has been made.
    pub const fn has_request(&self) -> bool {
        self.flags.get(flags::REQ_MADE)
    }

    /// Returns true if translation marked the access strictly ordered.
    pub const fn strictly_ordered(&self) -> bool {
        self.flags.get(flags::IS_STRICTLY_ORDERED)
    }

    /// Returns true if the effective address has been computed.
    pub const fn eff_addr_valid(&self) -> bool {
        self.flags.get(flags::EFF_ADDR_VALID)
    }

    /// Marks the effective address valid or invalid.
    #[track_caller]
    pub fn set_eff_addr_valid(&mut self, on: bool) {
        self.ensure_live("set_eff_addr_valid");
        self.flags.set(flags::EFF_ADDR_VALID, on);
    }

    /// Records the predicate outcome.
    #[track_caller]
    pub fn set_predicate(&mut self, val: bool) {
        self.ensure_live("set_predicate");
        self.flags.set(flags::PREDICATE, val);
        if let Some(rec) = self.trace.as_mut() {
            rec.predicate = Some(val);
        }
    }

    /// Predicate outcome (true unless cleared).
    pub const fn read_predicate(&self) -> bool {
        self.flags.get(flags::PREDICATE)
    }

    /// Records the predicted branch direction.
    #[track_caller]
    pub fn set_pred_taken(&mut self, taken: bool) {
        self.ensure_live("set_pred_taken");
        self.flags.set(flags::PRED_TAKEN, taken);
    }

    /// Predicted branch direction.
    pub const fn pred_taken(&self) -> bool {
        self.flags.get(flags::PRED_TAKEN)
    }

    // ══════════════════════════════════════════════════════════
    // Taint axes and the expose gate
    // ══════════════════════════════════════════════════════════

    /// Returns true if any source operand is tainted.
    #[inline]
    pub const fn is_args_tainted(&self) -> bool {
        self.flags.get(flags::IS_ARGS_TAINTED)
    }

    /// Sets source taint. Clears unsquashability while tainted.
    #[track_caller]
    pub fn set_args_tainted(&mut self, on: bool) {
        self.ensure_live("set_args_tainted");
        self.flags.set(flags::IS_ARGS_TAINTED, on);
        if on {
            self.flags.set(flags::IS_UNSQUASHABLE, false);
        }
    }

    /// Returns true if the destination value is tainted.
    #[inline]
    pub const fn is_dest_tainted(&self) -> bool {
        self.flags.get(flags::IS_DEST_TAINTED)
    }

    /// Sets destination taint.
    #[track_caller]
    pub fn set_dest_tainted(&mut self, on: bool) {
        self.ensure_live("set_dest_tainted");
        self.flags.set(flags::IS_DEST_TAINTED, on);
    }

    /// Returns true if the effective address is tainted.
    pub const fn is_addr_tainted(&self) -> bool {
        self.flags.get(flags::IS_ADDR_TAINTED)
    }

    /// Sets address taint.
    #[track_caller]
    pub fn set_addr_tainted(&mut self, on: bool) {
        self.ensure_live("set_addr_tainted");
        self.flags.set(flags::IS_ADDR_TAINTED, on);
    }

    /// Returns true if taint reached the instruction through data flow.
    pub const fn has_explicit_flow(&self) -> bool {
        self.flags.get(flags::HAS_EXPLICIT_FLOW)
    }

    /// Returns true if taint reached the instruction through control flow.
    pub const fn has_implicit_flow(&self) -> bool {
        self.flags.get(flags::HAS_IMPLICIT_FLOW)
    }

    /// Records how taint reached the instruction.
    #[track_caller]
    pub fn set_flows(&mut self, explicit: bool, implicit: bool) {
        self.ensure_live("set_flows");
        self.flags.set(flags::HAS_EXPLICIT_FLOW, explicit);
        self.flags.set(flags::HAS_IMPLICIT_FLOW, implicit);
    }

    /// Returns true once the instruction is past the visibility point.
    #[inline]
    pub const fn is_unsquashable(&self) -> bool {
        self.flags.get(flags::IS_UNSQUASHABLE)
    }

    /// Marks the instruction past the visibility point.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation while the arguments are tainted.
    #[track_caller]
    pub fn mark_unsquashable(&mut self) {
        self.ensure_live("mark_unsquashable");
        if self.is_args_tainted() {
            violation(ContractViolation::UnsquashableWhileTainted { seq: self.seq });
        }
        self.flags.set(flags::IS_UNSQUASHABLE, true);
    }

    /// Returns true while a squash waits for taint to resolve.
    #[inline]
    pub const fn has_pending_squash(&self) -> bool {
        self.flags.get(flags::HAS_PENDING_SQUASH)
    }

    /// Sets or clears the deferred-squash marker.
    #[track_caller]
    pub fn set_pending_squash(&mut self, on: bool) {
        self.ensure_live("set_pending_squash");
        self.flags.set(flags::HAS_PENDING_SQUASH, on);
    }

    /// Returns true if the access may become visible.
    #[inline]
    pub const fn ready_to_expose(&self) -> bool {
        self.flags.get(flags::READY_TO_EXPOSE)
    }

    /// Opens or closes the expose gate.
    #[track_caller]
    pub fn set_ready_to_expose(&mut self, on: bool) {
        self.ensure_live("set_ready_to_expose");
        self.flags.set(flags::READY_TO_EXPOSE, on);
    }

    /// Returns true if the access must wait behind a virtual fence.
    #[inline]
    pub const fn fence_delay(&self) -> bool {
        self.flags.get(flags::FENCE_DELAY)
    }

    /// Sets or clears the virtual-fence delay. Only the scheduler writes it.
    #[track_caller]
    pub fn set_fence_delay(&mut self, on: bool) {
        self.ensure_live("set_fence_delay");
        self.flags.set(flags::FENCE_DELAY, on);
    }

    /// Returns true if a normal (non-shadow) read may be initiated now.
    #[inline]
    pub const fn may_expose_read(&self) -> bool {
        self.ready_to_expose() && !self.fence_delay()
    }

    // ══════════════════════════════════════════════════════════
    // Shadow-load flags
    // ══════════════════════════════════════════════════════════

    /// Returns true while a shadow load is in flight.
    #[inline]
    pub const fn is_dopp_load_executing(&self) -> bool {
        self.flags.get(flags::IS_DOPP_LOAD_EXECUTING)
    }

    #[track_caller]
    pub(crate) fn require_dopp(&self, op: &'static str) {
        if !self.dopp_enabled {
            violation(ContractViolation::ShadowLoadDisabled { seq: self.seq, op });
        }
    }

    /// Sets the shadow-executing flag.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if shadow loads are disabled.
    #[track_caller]
    pub fn set_dopp_load_executing(&mut self, on: bool) {
        self.ensure_live("set_dopp_load_executing");
        self.require_dopp("set_dopp_load_executing");
        self.flags.set(flags::IS_DOPP_LOAD_EXECUTING, on);
    }

    /// Returns true if the shadow load produced a usable value.
    pub const fn is_dopp_load_success(&self) -> bool {
        self.flags.get(flags::IS_DOPP_LOAD_SUCCESS)
    }

    /// Sets the shadow-success flag.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if shadow loads are disabled.
    #[track_caller]
    pub fn set_dopp_load_success(&mut self, on: bool) {
        self.ensure_live("set_dopp_load_success");
        self.require_dopp("set_dopp_load_success");
        self.flags.set(flags::IS_DOPP_LOAD_SUCCESS, on);
    }

    /// Returns true once the shadow load has finished.
    pub const fn dopp_finished(&self) -> bool {
        self.flags.get(flags::DOPP_FINISHED)
    }

    /// Returns true once the shadow translation has finished.
    pub const fn dopp_translation_completed(&self) -> bool {
        self.flags.get(flags::DOPP_TRANSLATION_COMPLETED)
    }

    /// Returns true if dependents should be woken by the shadow load.
    pub const fn dopp_should_wake_dependents(&self) -> bool {
        self.flags.get(flags::DOPP_SHOULD_WAKE_DEPENDENTS)
    }

    /// Returns true once dependents have been woken by the shadow load.
    pub const fn dopp_has_woken_dependents(&self) -> bool {
        self.flags.get(flags::DOPP_HAS_WOKEN_DEPENDENTS)
    }

    /// Debug marker for shadow-load tracing.
    pub const fn dopp_dbg(&self) -> bool {
        self.flags.get(flags::DOPP_DBG)
    }

    /// Sets the shadow-load debug marker.
    #[track_caller]
    pub fn set_dopp_dbg(&mut self, on: bool) {
        self.ensure_live("set_dopp_dbg");
        self.flags.set(flags::DOPP_DBG, on);
    }

    // ══════════════════════════════════════════════════════════
    // Operands
    // ══════════════════════════════════════════════════════════

    /// Enables or disables recording of pushed results.
    #[track_caller]
    pub fn set_record_result(&mut self, on: bool) {
        self.ensure_live("set_record_result");
        self.flags.set(flags::RECORD_RESULT, on);
    }

    /// Pushes a produced value. Dropped unless recording is enabled.
    #[track_caller]
    pub fn push_result(&mut self, result: InstResult) {
        self.ensure_live("push_result");
        if self.flags.get(flags::RECORD_RESULT) {
            self.results.push(result);
        }
    }

    /// Pops the oldest recorded result, or `default` if none remain.
    #[track_caller]
    pub fn pop_result(&mut self, default: InstResult) -> InstResult {
        self.ensure_live("pop_result");
        self.results.pop().unwrap_or(default)
    }

    /// Recorded results.
    pub const fn results(&self) -> &ResultQueue {
        &self.results
    }

    /// Rename state.
    pub const fn rename(&self) -> &RenameState {
        &self.rename
    }

    #[track_caller]
    fn check_operand(&self, idx: usize, bound: usize) {
        if idx >= bound {
            violation(ContractViolation::OperandOutOfRange { seq: self.seq, idx });
        }
    }

    /// Records the physical register for destination `idx` and the one it replaces.
    #[track_caller]
    pub fn rename_dest_reg(&mut self, idx: usize, renamed: PhysRegId, previous: PhysRegId) {
        self.ensure_live("rename_dest_reg");
        self.check_operand(idx, MAX_INST_DEST_REGS);
        self.rename.dest[idx] = Some(renamed);
        self.rename.prev_dest[idx] = Some(previous);
    }

    /// Records the physical register read by source `idx`.
    #[track_caller]
    pub fn rename_src_reg(&mut self, idx: usize, renamed: PhysRegId) {
        self.ensure_live("rename_src_reg");
        self.check_operand(idx, MAX_INST_SRC_REGS);
        self.rename.src[idx] = Some(renamed);
    }

    /// Records the flattened architectural id of destination `idx`.
    #[track_caller]
    pub fn flatten_dest_reg(&mut self, idx: usize, reg: RegId) {
        self.ensure_live("flatten_dest_reg");
        self.check_operand(idx, MAX_INST_DEST_REGS);
        self.rename.flat_dest[idx] = Some(reg);
    }

    /// Marks source `idx` ready; once every source is ready the instruction can issue.
    #[track_caller]
    pub fn mark_src_reg_ready_idx(&mut self, idx: usize) {
        self.ensure_live("mark_src_reg_ready_idx");
        self.check_operand(idx, MAX_INST_SRC_REGS);
        let _ = self.rename.mark_src_ready(idx);
        self.mark_src_reg_ready();
    }

    /// Re-evaluates operand readiness.
    #[track_caller]
    pub fn mark_src_reg_ready(&mut self) {
        if self.rename.ready_count() as usize >= self.num_src_regs() {
            self.set_can_issue();
        }
    }

    /// Returns true if source `idx` is ready.
    pub const fn is_ready_src_reg_idx(&self, idx: usize) -> bool {
        self.rename.is_src_ready(idx)
    }

    /// Links source `idx` to the instruction that produces it.
    #[track_caller]
    pub fn set_arg_producer(&mut self, idx: usize, producer: InstSeqNum) {
        self.ensure_live("set_arg_producer");
        self.check_operand(idx, MAX_INST_SRC_REGS);
        self.producers[idx] = Some(producer);
    }

    /// Clears the producer link of source `idx`.
    #[track_caller]
    pub fn clear_arg_producer(&mut self, idx: usize) {
        self.ensure_live("clear_arg_producer");
        self.check_operand(idx, MAX_INST_SRC_REGS);
        self.producers[idx] = None;
    }

    /// Producer links, one per source slot.
    #[inline]
    pub const fn arg_producers(&self) -> &ProducerLinks {
        &self.producers
    }

    // ══════════════════════════════════════════════════════════
    // Memory fields
    // ══════════════════════════════════════════════════════════

    /// Fault recorded by translation or the memory access.
    #[inline]
    pub const fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Overwrites the recorded fault.
    #[track_caller]
    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.ensure_live("set_fault");
        self.fault = fault;
    }

    /// Effective virtual address.
    pub const fn eff_addr(&self) -> VirtAddr {
        self.eff_addr
    }

    /// Access size in bytes.
    pub const fn eff_size(&self) -> u32 {
        self.eff_size
    }

    /// Physical address of the low (or only) part of the access.
    pub const fn phys_eff_addr_low(&self) -> Option<PhysAddr> {
        self.phys_eff_addr_low
    }

    /// Physical address of the high part of a split access.
    pub const fn phys_eff_addr_high(&self) -> Option<PhysAddr> {
        self.phys_eff_addr_high
    }

    /// Request flags after translation.
    pub const fn mem_req_flags(&self) -> RequestFlags {
        self.mem_req_flags
    }

    /// Copy of the last issued request, kept when the checker is enabled.
    pub const fn req_to_verify(&self) -> Option<&TranslatedAccess> {
        self.req_to_verify.as_ref()
    }

    /// Trace record, if tracing is enabled.
    pub const fn trace_record(&self) -> Option<&InstRecord> {
        self.trace.as_ref()
    }

    /// Forwarding state of the real access.
    pub const fn real_forward(&self) -> &ForwardBuffers {
        &self.forward
    }

    /// Forwarding state of the shadow access.
    pub const fn shadow_forward(&self) -> &ForwardBuffers {
        &self.shadow_forward
    }

    /// Forwarding state of the access in flight: the shadow set while a
    /// shadow load executes, the real set otherwise.
    #[track_caller]
    pub fn forward_buffers_mut(&mut self) -> &mut ForwardBuffers {
        self.ensure_live("forward_buffers_mut");
        if self.is_dopp_load_executing() {
            &mut self.shadow_forward
        } else {
            &mut self.forward
        }
    }
}
