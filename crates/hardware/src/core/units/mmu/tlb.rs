//! Translation Lookaside Buffer (TLB).
//!
//! A direct-mapped cache of page table entries indexed by virtual page
//! number. A hit lets the MMU answer a translation synchronously.

use super::ptw::PageTableEntry;

/// A single entry in the TLB.
#[derive(Clone, Copy, Debug, Default)]
struct TlbEntry {
    /// Virtual Page Number (Tag).
    vpn: u64,
    /// Cached page table entry (Data).
    pte: PageTableEntry,
    /// Entry validity flag.
    valid: bool,
}

/// Translation Lookaside Buffer structure.
#[derive(Debug)]
pub struct Tlb {
    /// Vector of TLB entries.
    entries: Vec<TlbEntry>,
    /// Mask used for indexing (size - 1).
    mask: usize,
}

impl Tlb {
    /// Creates a new TLB with the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of entries (will be rounded up to next power of 2).
    pub fn new(size: usize) -> Self {
        let safe_size = size.max(1).next_power_of_two();
        Self {
            entries: vec![TlbEntry::default(); safe_size],
            mask: safe_size - 1,
        }
    }

    /// Number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Looks up a VPN in the TLB.
    ///
    /// # Returns
    ///
    /// The cached entry if present, otherwise `None`.
    #[inline(always)]
    pub fn lookup(&self, vpn: u64) -> Option<PageTableEntry> {
        let idx = (vpn as usize) & self.mask;
        self.entries
            .get(idx)
            .filter(|e| e.valid && e.vpn == vpn)
            .map(|e| e.pte)
    }

    /// Inserts a new mapping, replacing whatever shared its slot.
    ///
    /// # Arguments
    ///
    /// * `vpn` - Virtual Page Number.
    /// * `pte` - Page table entry to cache.
    pub fn insert(&mut self, vpn: u64, pte: PageTableEntry) {
        let idx = (vpn as usize) & self.mask;
        if let Some(slot) = self.entries.get_mut(idx) {
            *slot = TlbEntry {
                vpn,
                pte,
                valid: true,
            };
        }
    }

    /// Flushes all entries from the TLB.
    pub fn flush(&mut self) {
        for e in &mut self.entries {
            e.valid = false;
        }
    }
}
