//! Taint propagation and the visibility gate.
//!
//! Speculatively loaded values are tainted until the load passes the
//! visibility point (becomes unsquashable). Taint flows forward along
//! producer links:
//! 1. **Sources:** An instruction's arguments are tainted if any live
//!    producer has a tainted destination or an unresolved squash.
//! 2. **Destinations:** A load's destination is tainted until the load is
//!    unsquashable; any other instruction forwards its argument taint.
//! 3. **Addresses:** A memory instruction's address is tainted with its arguments.
//! 4. **Gates:** Tainted instructions wait in the stall list; a tainted
//!    load keeps its expose gate closed; a squash requested while taint is
//!    unresolved is deferred.
//!
//! Taint owns only the expose half of the read gate. The virtual-fence
//! delay belongs to the scheduler and is never touched here.
//!
//! Propagation walks the window in program order, so producers are always
//! updated before their consumers.

use tracing::debug;

use crate::common::InstSeqNum;
use crate::core::inst::DynInst;
use crate::core::window::InstWindow;
use crate::stats::CoreStats;

/// How a squash request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquashDecision {
    /// Taint is resolved; the caller may squash now.
    Immediate,
    /// Taint is unresolved; the squash waits and commit is blocked.
    Deferred,
}

/// Computed taint of one instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Taint {
    args: bool,
}

/// Stateless taint rules over an [`InstWindow`].
#[derive(Debug)]
pub struct TaintTracker;

impl TaintTracker {
    /// Returns true if any live producer of `consumer` is tainted or unresolved.
    pub fn producers_tainted(window: &InstWindow, consumer: &DynInst) -> bool {
        window
            .live_producers(consumer)
            .any(|p| p.is_dest_tainted() || p.has_pending_squash())
    }

    fn evaluate(window: &InstWindow, seq: InstSeqNum) -> Option<Taint> {
        let inst = window.get(seq)?;
        if inst.is_terminal() {
            return None;
        }
        Some(Taint {
            args: Self::producers_tainted(window, inst),
        })
    }

    fn apply(inst: &mut DynInst, taint: Taint) {
        inst.set_args_tainted(taint.args);
        if taint.args {
            let control = inst.is_control();
            inst.set_flows(!control, control);
        } else {
            inst.set_flows(false, false);
            if inst.is_prev_brs_resolved() && !inst.is_unsquashable() {
                inst.mark_unsquashable();
            }
        }

        let mem = inst.is_mem_ref();
        inst.set_addr_tainted(mem && taint.args);

        if inst.is_load() {
            inst.set_dest_tainted(!inst.is_unsquashable());
            inst.set_ready_to_expose(!taint.args);
        } else {
            inst.set_dest_tainted(taint.args);
        }
    }

    /// Recomputes taint for one instruction from its producers.
    pub fn refresh(window: &mut InstWindow, seq: InstSeqNum) {
        if let Some(taint) = Self::evaluate(window, seq)
            && let Some(inst) = window.get_mut(seq)
        {
            Self::apply(inst, taint);
        }
    }

    /// Recomputes taint for every live instruction in program order.
    pub fn propagate(window: &mut InstWindow) {
        for seq in window.seqs() {
            Self::refresh(window, seq);
        }
    }

    /// Computes taint for a newly dispatched instruction and stalls it if tainted.
    pub fn on_dispatch(window: &mut InstWindow, seq: InstSeqNum, stats: &mut CoreStats) {
        Self::refresh(window, seq);
        if let Some(inst) = window.get_mut(seq)
            && inst.is_args_tainted()
        {
            inst.add_to_stall_list();
            stats.stall_list_insertions += 1;
            debug!(%seq, "dispatched tainted, stalled");
        }
    }

    /// Releases stalled instructions whose arguments are no longer tainted.
    ///
    /// # Returns
    ///
    /// The released sequence numbers, in program order.
    pub fn release_stalled(window: &mut InstWindow) -> Vec<InstSeqNum> {
        Self::propagate(window);
        let mut released = Vec::new();
        for seq in window.seqs() {
            if let Some(inst) = window.get_mut(seq)
                && inst.is_in_stall_list()
                && !inst.is_args_tainted()
            {
                inst.remove_from_stall_list();
                debug!(%seq, "released from stall list");
                released.push(seq);
            }
        }
        released
    }

    /// Returns true if taint allows the instruction to issue.
    ///
    /// A load always may: it is the root under observation, and its
    /// exposure is gated separately.
    pub fn permits_issue(window: &InstWindow, inst: &DynInst) -> bool {
        inst.is_load() || !Self::producers_tainted(window, inst)
    }

    /// Generic issue gate: operands ready and not held by the stall list.
    pub fn can_issue(inst: &DynInst) -> bool {
        inst.ready_to_issue() && !inst.is_in_stall_list()
    }

    /// Handles a request for `seq` to squash younger instructions.
    ///
    /// While the instruction's own arguments are tainted the squash is
    /// recorded as pending instead, which blocks its commit until resolved.
    pub fn request_squash(
        window: &mut InstWindow,
        seq: InstSeqNum,
        stats: &mut CoreStats,
    ) -> SquashDecision {
        Self::refresh(window, seq);
        match window.get_mut(seq) {
            Some(inst) if inst.is_args_tainted() && !inst.is_terminal() => {
                inst.set_pending_squash(true);
                stats.deferred_squashes += 1;
                debug!(%seq, "squash deferred until taint resolves");
                SquashDecision::Deferred
            }
            _ => SquashDecision::Immediate,
        }
    }

    /// Clears pending squashes whose taint has resolved.
    ///
    /// # Returns
    ///
    /// Instructions whose deferred squash must now be applied, in program order.
    pub fn take_resolved_squashes(window: &mut InstWindow, stats: &mut CoreStats) -> Vec<InstSeqNum> {
        Self::propagate(window);
        let mut resolved = Vec::new();
        for seq in window.seqs() {
            if let Some(inst) = window.get_mut(seq)
                && inst.has_pending_squash()
                && !inst.is_terminal()
                && !inst.is_args_tainted()
            {
                inst.set_pending_squash(false);
                stats.resolved_squashes += 1;
                resolved.push(seq);
            }
        }
        if !resolved.is_empty() {
            Self::propagate(window);
        }
        resolved
    }
}
