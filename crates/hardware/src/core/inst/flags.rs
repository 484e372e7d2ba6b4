//! Orthogonal per-instruction flag set.
//!
//! Flags are independent booleans that do not describe lifecycle position:
//! translation side effects, predication, taint axes and shadow-load
//! progress. Lifecycle position lives in [`super::status`].

/// Not a real instruction (e.g. a fetch-fault placeholder).
pub const NOT_AN_INST: u64 = 1 << 0;
/// Matched an older load that issued out of order.
pub const POSSIBLE_LOAD_VIOLATION: u64 = 1 << 1;
/// Hit an external snoop while in the LSQ.
pub const HIT_EXTERNAL_SNOOP: u64 = 1 << 2;
/// Effective virtual address has been computed.
pub const EFF_ADDR_VALID: u64 = 1 << 3;
/// Results pushed onto the result queue are recorded.
pub const RECORD_RESULT: u64 = 1 << 4;
/// Predicate evaluated true.
pub const PREDICATE: u64 = 1 << 5;
/// Branch predicted taken.
pub const PRED_TAKEN: u64 = 1 << 6;
/// Translation marked the access strictly ordered.
pub const IS_STRICTLY_ORDERED: u64 = 1 << 7;
/// A memory request has been made.
pub const REQ_MADE: u64 = 1 << 8;
/// The memory operation is done.
pub const MEM_OP_DONE: u64 = 1 << 9;
/// Must be delayed behind a virtual fence.
pub const FENCE_DELAY: u64 = 1 << 10;
/// Legal for the access to become visible.
pub const READY_TO_EXPOSE: u64 = 1 << 11;
/// Hit an invalidation.
pub const HIT_INVALIDATION: u64 = 1 << 12;
/// Hit an external eviction.
pub const HIT_EXTERNAL_EVICTION: u64 = 1 << 13;
/// Validation failed.
pub const VALIDATION_FAIL: u64 = 1 << 14;
/// Only waiting for a fence.
pub const ONLY_WAIT_FOR_FENCE: u64 = 1 << 15;
/// Speculative TLB miss.
pub const SPEC_TLB_MISS: u64 = 1 << 16;
/// Past the visibility point; can no longer be squashed.
pub const IS_UNSQUASHABLE: u64 = 1 << 17;
/// Destination value is tainted.
pub const IS_DEST_TAINTED: u64 = 1 << 18;
/// At least one source operand is tainted.
pub const IS_ARGS_TAINTED: u64 = 1 << 19;
/// Effective address is tainted (memory ops).
pub const IS_ADDR_TAINTED: u64 = 1 << 20;
/// Taint reached this instruction through data flow.
pub const HAS_EXPLICIT_FLOW: u64 = 1 << 21;
/// Taint reached this instruction through control flow.
pub const HAS_IMPLICIT_FLOW: u64 = 1 << 22;
/// A squash this instruction must trigger is deferred until its taint resolves.
pub const HAS_PENDING_SQUASH: u64 = 1 << 23;
/// Shadow load in flight.
pub const IS_DOPP_LOAD_EXECUTING: u64 = 1 << 24;
/// Shadow load produced a usable value.
pub const IS_DOPP_LOAD_SUCCESS: u64 = 1 << 25;
/// Shadow load finished, with or without success.
pub const DOPP_FINISHED: u64 = 1 << 26;
/// Shadow translation finished.
pub const DOPP_TRANSLATION_COMPLETED: u64 = 1 << 27;
/// Debug marker for shadow-load tracing.
pub const DOPP_DBG: u64 = 1 << 28;
/// Shadow load finished and dependents should be woken.
pub const DOPP_SHOULD_WAKE_DEPENDENTS: u64 = 1 << 29;
/// Dependents have been woken by the shadow load.
pub const DOPP_HAS_WOKEN_DEPENDENTS: u64 = 1 << 30;

/// Packed set of the flag bits above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstFlags(u64);

impl InstFlags {
    /// Returns true if `bit` is set.
    #[inline(always)]
    pub const fn get(self, bit: u64) -> bool {
        self.0 & bit != 0
    }

    /// Sets or clears `bit`.
    #[inline(always)]
    pub const fn set(&mut self, bit: u64, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Returns the raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }
}
