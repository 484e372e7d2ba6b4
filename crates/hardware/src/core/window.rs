//! Owning table of in-flight instructions.
//!
//! Instructions are keyed by sequence number, so iteration is program
//! order. Every cross-instruction reference (producer links, translation
//! tokens) is a sequence number resolved through this table, and a lookup
//! that fails means the referenced instruction is gone.

use std::collections::BTreeMap;

use crate::common::InstSeqNum;
use crate::core::inst::DynInst;

/// In-flight instructions in program order.
#[derive(Debug, Default)]
pub struct InstWindow {
    insts: BTreeMap<InstSeqNum, DynInst>,
}

impl InstWindow {
    /// Creates an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions held.
    #[inline]
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Returns true if the window holds nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Adds an instruction.
    pub(crate) fn insert(&mut self, inst: DynInst) {
        let _ = self.insts.insert(inst.seq(), inst);
    }

    /// Takes an instruction out of the window.
    pub(crate) fn remove(&mut self, seq: InstSeqNum) -> Option<DynInst> {
        self.insts.remove(&seq)
    }

    /// Looks up an instruction.
    #[inline]
    pub fn get(&self, seq: InstSeqNum) -> Option<&DynInst> {
        self.insts.get(&seq)
    }

    /// Looks up an instruction for mutation.
    #[inline]
    pub fn get_mut(&mut self, seq: InstSeqNum) -> Option<&mut DynInst> {
        self.insts.get_mut(&seq)
    }

    /// Returns true if `seq` names an instruction in the window.
    pub fn contains(&self, seq: InstSeqNum) -> bool {
        self.insts.contains_key(&seq)
    }

    /// Instructions in program order.
    pub fn iter(&self) -> impl Iterator<Item = &DynInst> {
        self.insts.values()
    }

    /// Sequence numbers in program order.
    pub fn seqs(&self) -> Vec<InstSeqNum> {
        self.insts.keys().copied().collect()
    }

    /// Resolves a producer link to a live instruction.
    ///
    /// Returns `None` for an empty link, a reclaimed producer, or one that
    /// has committed or been squashed.
    pub fn live_producer(&self, link: Option<InstSeqNum>) -> Option<&DynInst> {
        link.and_then(|seq| self.insts.get(&seq))
            .filter(|p| !p.is_terminal())
    }

    /// Live producers of `consumer`'s source operands.
    pub fn live_producers<'a>(&'a self, consumer: &'a DynInst) -> impl Iterator<Item = &'a DynInst> {
        consumer
            .arg_producers()
            .iter()
            .filter_map(|link| self.live_producer(*link))
    }
}
