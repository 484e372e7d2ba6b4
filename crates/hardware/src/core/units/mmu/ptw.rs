//! Reference page table and walker.
//!
//! A flat map from virtual page number to page table entry. The walker
//! checks validity and permissions and reports the physical address and
//! any ordering flags; its latency is modelled by the MMU.

use std::collections::BTreeMap;

use crate::common::{AccessType, Fault, PhysAddr, RequestFlags, TranslationResult, VirtAddr};

/// Page Table Entry valid bit (bit 0).
const PTE_VALID_BIT: u64 = 1;

/// Page Table Entry read permission bit (bit 1).
const PTE_READ_BIT: u64 = 1 << 1;

/// Page Table Entry write permission bit (bit 2).
const PTE_WRITE_BIT: u64 = 1 << 2;

/// Page Table Entry strictly-ordered (device memory) bit (bit 3).
const PTE_STRICT_BIT: u64 = 1 << 3;

/// Page Table Entry uncacheable bit (bit 4).
const PTE_UNCACHEABLE_BIT: u64 = 1 << 4;

/// Bit shift to extract the Physical Page Number from a PTE.
const PTE_PPN_SHIFT: u64 = 10;

/// A strongly-typed page table entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    /// Builds a valid entry mapping to physical page `ppn`.
    pub const fn new(ppn: u64, read: bool, write: bool) -> Self {
        let mut raw = PTE_VALID_BIT | (ppn << PTE_PPN_SHIFT);
        if read {
            raw |= PTE_READ_BIT;
        }
        if write {
            raw |= PTE_WRITE_BIT;
        }
        Self(raw)
    }

    /// Returns a copy marked as strictly-ordered device memory.
    #[must_use]
    pub const fn strictly_ordered(self) -> Self {
        Self(self.0 | PTE_STRICT_BIT | PTE_UNCACHEABLE_BIT)
    }

    /// Returns the underlying raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if the Valid bit is set.
    pub const fn is_valid(self) -> bool {
        self.0 & PTE_VALID_BIT != 0
    }

    /// Returns true if the Read bit is set.
    pub const fn can_read(self) -> bool {
        self.0 & PTE_READ_BIT != 0
    }

    /// Returns true if the Write bit is set.
    pub const fn can_write(self) -> bool {
        self.0 & PTE_WRITE_BIT != 0
    }

    /// Extracts the Physical Page Number.
    pub const fn ppn(self) -> u64 {
        self.0 >> PTE_PPN_SHIFT
    }

    /// Request flags implied by the entry.
    pub const fn request_flags(self) -> RequestFlags {
        let mut flags = RequestFlags::NONE;
        if self.0 & PTE_STRICT_BIT != 0 {
            flags = flags.union(RequestFlags::STRICT_ORDER);
        }
        if self.0 & PTE_UNCACHEABLE_BIT != 0 {
            flags = flags.union(RequestFlags::UNCACHEABLE);
        }
        flags
    }

    /// Checks the entry against an access and builds the result.
    pub const fn resolve(self, vaddr: VirtAddr, access: AccessType, page_bytes: u64) -> TranslationResult {
        if !self.is_valid() {
            return TranslationResult::fault(Fault::page_fault(vaddr.val(), access));
        }
        let permitted = match access {
            AccessType::Read => self.can_read(),
            AccessType::Write => self.can_write(),
        };
        if !permitted {
            return TranslationResult::fault(Fault::page_fault(vaddr.val(), access));
        }
        let paddr = self.ppn() * page_bytes + vaddr.page_offset(page_bytes);
        TranslationResult::success(PhysAddr::new(paddr), self.request_flags())
    }
}

/// Single-level page table.
#[derive(Clone, Debug, Default)]
pub struct PageTable {
    entries: BTreeMap<u64, PageTableEntry>,
}

impl PageTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps virtual page `vpn`.
    pub fn map(&mut self, vpn: u64, pte: PageTableEntry) {
        let _ = self.entries.insert(vpn, pte);
    }

    /// Removes the mapping of `vpn`.
    pub fn unmap(&mut self, vpn: u64) {
        let _ = self.entries.remove(&vpn);
    }

    /// Looks up the entry for `vpn`; unmapped pages yield an invalid entry.
    pub fn walk(&self, vpn: u64) -> PageTableEntry {
        self.entries.get(&vpn).copied().unwrap_or_default()
    }
}
