//! Doppelganger (shadow) loads.
//!
//! A tainted load may not perform its real access yet, but leaving it idle
//! leaks timing. A shadow access runs the same translation and read path
//! early; its value never becomes architectural. States:
//!
//! `Idle -> Executing -> {Succeeded | FinishedWithoutSuccess}`
//!
//! A successful shadow load may wake dependents, at most once per
//! instruction. Afterwards [`ShadowLoad::reset`] clears the translation
//! progress so the same instruction can translate again for its real access.

use tracing::debug;

use crate::common::{ContractViolation, violation};
use crate::core::inst::{DynInst, ForwardBuffers};
use crate::core::inst::flags;
use crate::stats::CoreStats;

/// Where a shadow load stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowState {
    /// No shadow access has started.
    Idle,
    /// Shadow translation or access in flight.
    Executing,
    /// Finished with a usable value.
    Succeeded,
    /// Finished without a usable value.
    FinishedWithoutSuccess,
}

/// Shadow-load operations on a [`DynInst`].
///
/// Every operation requires the mechanism to be enabled on the core.
#[derive(Debug)]
pub struct ShadowLoad;

impl ShadowLoad {
    /// Current shadow state of `inst`.
    pub const fn state(inst: &DynInst) -> ShadowState {
        if inst.is_dopp_load_executing() {
            ShadowState::Executing
        } else if !inst.dopp_finished() {
            ShadowState::Idle
        } else if inst.is_dopp_load_success() {
            ShadowState::Succeeded
        } else {
            ShadowState::FinishedWithoutSuccess
        }
    }

    /// Starts a shadow access.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if shadow loads are disabled, the
    /// instruction is not a load, or it is terminal.
    #[track_caller]
    pub fn begin(inst: &mut DynInst, stats: &mut CoreStats) {
        inst.require_dopp("shadow_begin");
        inst.ensure_live("shadow_begin");
        if !inst.is_load() {
            violation(ContractViolation::ShadowLoadOnNonLoad { seq: inst.seq() });
        }
        if inst.is_dopp_load_executing() {
            return;
        }
        inst.flags.set(flags::IS_DOPP_LOAD_EXECUTING, true);
        inst.flags.set(flags::IS_DOPP_LOAD_SUCCESS, false);
        inst.flags.set(flags::DOPP_FINISHED, false);
        inst.flags.set(flags::DOPP_TRANSLATION_COMPLETED, false);
        inst.shadow_forward = ForwardBuffers::default();
        stats.shadow_loads_started += 1;
        debug!(seq = %inst.seq(), "shadow load started");
    }

    /// Records the end of the shadow access.
    ///
    /// Repeated completion signals after the first are ignored.
    ///
    /// # Returns
    ///
    /// True if this call finished the shadow load.
    ///
    /// # Panics
    ///
    /// Panics with a contract violation if shadow loads are disabled or no
    /// shadow access was ever started.
    #[track_caller]
    pub fn finish(inst: &mut DynInst, success: bool, stats: &mut CoreStats) -> bool {
        inst.require_dopp("shadow_finish");
        if !inst.is_dopp_load_executing() {
            if inst.dopp_finished() {
                return false;
            }
            violation(ContractViolation::UnexpectedCompletion { seq: inst.seq() });
        }
        inst.flags.set(flags::IS_DOPP_LOAD_EXECUTING, false);
        inst.flags.set(flags::IS_DOPP_LOAD_SUCCESS, success);
        inst.flags.set(flags::DOPP_FINISHED, true);
        inst.flags.set(flags::DOPP_TRANSLATION_COMPLETED, true);
        if success && !inst.is_squashed() {
            inst.flags.set(flags::DOPP_SHOULD_WAKE_DEPENDENTS, true);
            stats.shadow_loads_succeeded += 1;
        }
        debug!(seq = %inst.seq(), success, "shadow load finished");
        true
    }

    /// Claims the dependent wakeup of a successful shadow load.
    ///
    /// # Returns
    ///
    /// True exactly once per instruction, the first time a wakeup is due.
    #[track_caller]
    pub fn take_wakeup(inst: &mut DynInst, stats: &mut CoreStats) -> bool {
        inst.require_dopp("shadow_take_wakeup");
        if !inst.dopp_should_wake_dependents() || inst.dopp_has_woken_dependents() {
            return false;
        }
        inst.flags.set(flags::DOPP_HAS_WOKEN_DEPENDENTS, true);
        stats.shadow_wakeups += 1;
        debug!(seq = %inst.seq(), "shadow load woke dependents");
        true
    }

    /// Clears only the translation progress, leaving every other flag.
    ///
    /// Any saved request is released; a completion still in flight for it
    /// will be dropped as stale.
    #[track_caller]
    pub fn reset(inst: &mut DynInst) {
        inst.require_dopp("reset_dopp");
        inst.reset_translation();
    }
}
