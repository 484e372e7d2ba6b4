//! Operand, rename and result bookkeeping.
//!
//! The rename stage owns the free list and rename map; the instruction only
//! records what it was handed. Physical registers are opaque handles here.

use std::collections::VecDeque;

use crate::common::constants::{MAX_INST_DEST_REGS, MAX_INST_SRC_REGS};
use crate::common::seq::InstSeqNum;
use crate::isa::RegId;

/// Handle to a physical register allocated by the rename stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysRegId(pub u32);

/// Value produced by an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstResult {
    /// Scalar integer or floating-point bit pattern.
    Scalar(u64),
    /// Whole vector register contents.
    Vector(Vec<u8>),
    /// Single vector element.
    VecElem(u64),
}

/// Results pushed during execution, in production order.
///
/// Pushes are recorded only while recording is enabled; the commit-time
/// checker pops them in order.
#[derive(Clone, Debug, Default)]
pub struct ResultQueue {
    queue: VecDeque<InstResult>,
}

impl ResultQueue {
    /// Appends a result.
    pub(crate) fn push(&mut self, result: InstResult) {
        self.queue.push_back(result);
    }

    /// Removes and returns the oldest result.
    pub fn pop(&mut self) -> Option<InstResult> {
        self.queue.pop_front()
    }

    /// Returns true if no results are recorded.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Rename state of one instruction.
#[derive(Clone, Debug, Default)]
pub struct RenameState {
    /// Physical registers written by this instruction.
    pub dest: [Option<PhysRegId>; MAX_INST_DEST_REGS],
    /// Previous mappings of the destinations, freed at commit.
    pub prev_dest: [Option<PhysRegId>; MAX_INST_DEST_REGS],
    /// Flattened architectural destination ids.
    pub flat_dest: [Option<RegId>; MAX_INST_DEST_REGS],
    /// Physical registers read by this instruction.
    pub src: [Option<PhysRegId>; MAX_INST_SRC_REGS],
    ready_src: u8,
}

impl RenameState {
    /// Returns true if source `idx` has been marked ready.
    #[inline]
    pub const fn is_src_ready(&self, idx: usize) -> bool {
        idx < MAX_INST_SRC_REGS && self.ready_src & (1 << idx) != 0
    }

    /// Marks source `idx` ready. Returns true if it was not already ready.
    pub(crate) const fn mark_src_ready(&mut self, idx: usize) -> bool {
        let bit = 1 << idx;
        let fresh = self.ready_src & bit == 0;
        self.ready_src |= bit;
        fresh
    }

    /// Number of sources marked ready.
    #[inline]
    pub const fn ready_count(&self) -> u32 {
        self.ready_src.count_ones()
    }
}

/// Producers of each source operand.
///
/// Links are non-owning: a sequence number that no longer resolves in the
/// window means the producer has been reclaimed.
pub type ProducerLinks = [Option<InstSeqNum>; MAX_INST_SRC_REGS];
