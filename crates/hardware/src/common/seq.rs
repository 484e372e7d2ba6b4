//! Program-order identity of in-flight instructions.

use std::fmt;

use serde::Serialize;

/// Sequence number of a dynamic instruction.
///
/// Assigned at dispatch from a monotonically increasing counter, so ordering
/// of sequence numbers is program order. Sequence numbers are never reused,
/// which makes them safe to hold as non-owning references: a stale number
/// simply fails to resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InstSeqNum(pub u64);

impl InstSeqNum {
    /// Returns the raw counter value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Returns the sequence number following this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for InstSeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[sn:{}]", self.0)
    }
}

/// Hardware thread an instruction belongs to.
pub type ThreadId = u16;
