//! Lifecycle position, squash sites, container membership and status markers.
//!
//! This module replaces a flat bag of status bits with types that make the
//! illegal combinations unrepresentable. It provides:
//! 1. **Progress:** The single ordered path an instruction walks from dispatch to commit.
//! 2. **Squash Sites:** Which containers an instruction was squashed in.
//! 3. **Membership:** Which scheduling containers currently hold the instruction.
//! 4. **Markers:** Orthogonal status bits that do not describe progress.

use std::fmt;

/// Position of an instruction on its lifecycle path.
///
/// The ordering of variants is program order of the lifecycle: a later
/// variant implies every earlier one has been reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Progress {
    /// Created and placed in the window.
    #[default]
    Dispatched,
    /// All operands ready; may be selected for issue.
    CanIssue,
    /// Sent to a functional unit.
    Issued,
    /// Functional unit finished.
    Executed,
    /// Memory operation speculatively complete.
    SpecCompleted,
    /// Eligible to commit.
    CanCommit,
    /// At the head of the commit window.
    AtCommit,
    /// Retired. Terminal.
    Committed,
}

impl Progress {
    /// Name used in logs and violation messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::CanIssue => "can-issue",
            Self::Issued => "issued",
            Self::Executed => "executed",
            Self::SpecCompleted => "spec-completed",
            Self::CanCommit => "can-commit",
            Self::AtCommit => "at-commit",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container in which a squash was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SquashSite {
    /// Squashed by the pipeline at large.
    Pipeline,
    /// Squashed while held by the issue queue.
    InstQueue,
    /// Squashed while held by the load/store queue.
    LoadStoreQueue,
    /// Squashed while held by the reorder buffer.
    ReorderBuffer,
}

impl SquashSite {
    const fn bit(self) -> u8 {
        match self {
            Self::Pipeline => 1 << 0,
            Self::InstQueue => 1 << 1,
            Self::LoadStoreQueue => 1 << 2,
            Self::ReorderBuffer => 1 << 3,
        }
    }
}

/// Set of sites an instruction has been squashed in.
///
/// Non-empty exactly when the instruction is squashed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SquashSites(u8);

impl SquashSites {
    /// Records a squash observed at `site`.
    #[inline]
    pub const fn add(&mut self, site: SquashSite) {
        self.0 |= site.bit();
    }

    /// Returns true if a squash was observed at `site`.
    #[inline]
    pub const fn contains(self, site: SquashSite) -> bool {
        self.0 & site.bit() != 0
    }

    /// Returns true if no squash has been observed.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Slot an instruction occupies in the load/store queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LsqSlot {
    /// Load-queue index.
    Load(u16),
    /// Store-queue index.
    Store(u16),
}

/// Scheduling containers currently holding the instruction.
///
/// A queue index exists only while the instruction is in the LSQ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    /// Held by the issue queue.
    pub iq: bool,
    /// Held by the reorder buffer.
    pub rob: bool,
    /// LSQ slot, if held by the load/store queue.
    pub lsq: Option<LsqSlot>,
}

impl Membership {
    /// Returns the name of some container still holding the instruction.
    pub const fn holder(&self) -> Option<&'static str> {
        if self.iq {
            Some("issue queue")
        } else if self.rob {
            Some("reorder buffer")
        } else if self.lsq.is_some() {
            Some("load/store queue")
        } else {
            None
        }
    }

    /// Load-queue index, if in the load queue.
    pub const fn lq_idx(&self) -> Option<u16> {
        match self.lsq {
            Some(LsqSlot::Load(idx)) => Some(idx),
            _ => None,
        }
    }

    /// Store-queue index, if in the store queue.
    pub const fn sq_idx(&self) -> Option<u16> {
        match self.lsq {
            Some(LsqSlot::Store(idx)) => Some(idx),
            _ => None,
        }
    }
}

/// Result of the instruction has been computed.
pub const COMPLETED: u32 = 1 << 0;
/// Result can be read by dependents.
pub const RESULT_READY: u32 = 1 << 1;
/// Memory operation completed in a way that may be exposed.
pub const EXPOSE_COMPLETED: u32 = 1 << 2;
/// Entered the spec-completed state (memory operations only).
pub const SPEC_COMPLETED: u32 = 1 << 3;
/// Every older instruction has completed.
pub const PREV_INSTS_COMPLETED: u32 = 1 << 4;
/// Every older branch has resolved.
pub const PREV_BRS_RESOLVED: u32 = 1 << 5;
/// Every older instruction has committed.
pub const PREV_INSTS_COMMITTED: u32 = 1 << 6;
/// Every older branch has committed.
pub const PREV_BRS_COMMITTED: u32 = 1 << 7;
/// Upper half of a split access hit in the L1.
pub const L1_HIT_HIGH: u32 = 1 << 8;
/// Lower half (or whole) access hit in the L1.
pub const L1_HIT_LOW: u32 = 1 << 9;
/// Waiting in the taint stall list.
pub const IN_STALL_LIST: u32 = 1 << 10;
/// Must serialize before executing.
pub const SERIALIZE_BEFORE: u32 = 1 << 11;
/// Younger instructions must serialize after this one.
pub const SERIALIZE_AFTER: u32 = 1 << 12;
/// Serialization has been handled.
pub const SERIALIZE_HANDLED: u32 = 1 << 13;
/// Removed from the window; only a late translation completion keeps it alive.
pub const REMOVED: u32 = 1 << 14;

/// Packed set of the status markers above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusMarks(u32);

impl StatusMarks {
    /// Returns true if `bit` is set.
    #[inline(always)]
    pub const fn get(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Sets or clears `bit`.
    #[inline(always)]
    pub const fn set(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}
