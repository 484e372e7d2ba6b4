//! Memory Management Unit (MMU).
//!
//! Reference [`TranslationBackend`]: a TLB in front of a single-level page
//! table. A TLB hit answers synchronously; a miss starts a walk whose
//! result is delivered after a fixed latency through
//! [`TranslationBackend::tick`]. Walks complete strictly by due cycle, so
//! a younger instruction's walk can finish before an older one's.

/// Reference page table and walker.
pub mod ptw;

/// Translation Lookaside Buffer (TLB) for caching page table entries.
pub mod tlb;

use tracing::trace;

use crate::common::{AccessType, ThreadId, TranslationResult};
use crate::config::MmuConfig;
use crate::core::translation::{
    DeferredCompletion, MemRequest, TranslationBackend, TranslationToken,
};

use self::ptw::{PageTable, PageTableEntry};
use self::tlb::Tlb;

/// A page walk waiting for its due cycle.
#[derive(Clone, Debug)]
struct PendingWalk {
    due: u64,
    vpn: u64,
    pte: PageTableEntry,
    token: TranslationToken,
    result: TranslationResult,
}

/// Memory Management Unit with a data TLB and a fixed-latency walker.
#[derive(Debug)]
pub struct Mmu {
    /// Data TLB.
    pub dtlb: Tlb,
    /// Page table consulted on a miss.
    pub table: PageTable,
    page_bytes: u64,
    walk_latency: u64,
    cycle: u64,
    pending: Vec<PendingWalk>,
}

impl Mmu {
    /// Creates an MMU with an empty page table.
    ///
    /// # Arguments
    ///
    /// * `config` - TLB size, page size and walk latency.
    pub fn new(config: &MmuConfig) -> Self {
        Self {
            dtlb: Tlb::new(config.tlb_size),
            table: PageTable::new(),
            page_bytes: config.page_bytes,
            walk_latency: config.walk_latency,
            cycle: 0,
            pending: Vec::new(),
        }
    }

    /// Maps `len` bytes of virtual memory at `vbase` onto physical memory at `pbase`.
    ///
    /// Both bases are rounded down to a page boundary. `entry` builds the
    /// page table entry for each physical page number.
    pub fn map_range(
        &mut self,
        vbase: u64,
        pbase: u64,
        len: u64,
        entry: impl Fn(u64) -> PageTableEntry,
    ) {
        let first = vbase / self.page_bytes;
        let pfirst = pbase / self.page_bytes;
        for i in 0..len.div_ceil(self.page_bytes) {
            self.table.map(first + i, entry(pfirst + i));
        }
    }

    /// Number of walks not yet delivered.
    pub fn pending_walks(&self) -> usize {
        self.pending.len()
    }
}

impl TranslationBackend for Mmu {
    fn translate_timing(
        &mut self,
        req: &MemRequest,
        _tid: ThreadId,
        mode: AccessType,
        token: TranslationToken,
    ) -> Option<TranslationResult> {
        let vpn = req.vaddr.page_number(self.page_bytes);
        if let Some(pte) = self.dtlb.lookup(vpn) {
            trace!(seq = %token.seq, vpn, "tlb hit");
            return Some(pte.resolve(req.vaddr, mode, self.page_bytes));
        }

        let pte = self.table.walk(vpn);
        let result = pte.resolve(req.vaddr, mode, self.page_bytes);
        if self.walk_latency == 0 {
            if pte.is_valid() {
                self.dtlb.insert(vpn, pte);
            }
            return Some(result);
        }

        trace!(seq = %token.seq, vpn, due = self.cycle + self.walk_latency, "tlb miss, walking");
        self.pending.push(PendingWalk {
            due: self.cycle + self.walk_latency,
            vpn,
            pte,
            token,
            result,
        });
        None
    }

    fn tick(&mut self, cycle: u64) -> Vec<DeferredCompletion> {
        self.cycle = cycle;
        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|w| w.due <= cycle);
        self.pending = waiting;

        due.into_iter()
            .map(|walk| {
                if walk.pte.is_valid() {
                    self.dtlb.insert(walk.vpn, walk.pte);
                }
                DeferredCompletion {
                    token: walk.token,
                    result: walk.result,
                }
            })
            .collect()
    }
}
