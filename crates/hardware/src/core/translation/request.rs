//! Memory requests and line splitting.
//!
//! A request describes one contiguous virtual access. An access that
//! straddles a cache-line boundary is carried as a main request plus a
//! low and a high fragment; the fragments partition the main request.

use serde::Serialize;

use crate::common::{InstSeqNum, PhysAddr, RequestFlags, ThreadId, VirtAddr};

/// A single memory request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemRequest {
    /// First virtual byte.
    pub vaddr: VirtAddr,
    /// Length in bytes.
    pub size: u32,
    /// Request flags (caller flags merged with translation flags once finished).
    pub flags: RequestFlags,
    /// PC of the issuing instruction.
    pub pc: u64,
    /// Issuing thread.
    pub tid: ThreadId,
    /// Address-space id of the issuing context.
    pub asid: u16,
    /// Physical address of `vaddr`, once translated.
    pub paddr: Option<PhysAddr>,
    /// Extra data carried by conditional-swap requests.
    pub extra_data: Option<u64>,
}

impl MemRequest {
    /// Creates an untranslated request.
    pub const fn new(
        vaddr: VirtAddr,
        size: u32,
        flags: RequestFlags,
        pc: u64,
        tid: ThreadId,
        asid: u16,
    ) -> Self {
        Self {
            vaddr,
            size,
            flags,
            pc,
            tid,
            asid,
            paddr: None,
            extra_data: None,
        }
    }

    /// One past the last virtual byte.
    #[inline]
    pub const fn end(&self) -> VirtAddr {
        self.vaddr.offset(self.size as u64)
    }

    /// Returns true if `vaddr` falls inside the request.
    #[inline]
    pub const fn contains(&self, vaddr: VirtAddr) -> bool {
        vaddr.0 >= self.vaddr.0 && vaddr.0 < self.end().0
    }

    /// Splits the request at `split`, which must lie strictly inside it.
    ///
    /// Returns the `(low, high)` fragments. Both inherit every attribute of
    /// the parent except address and size.
    pub fn split_on_vaddr(&self, split: VirtAddr) -> (Self, Self) {
        let low_size = (split.0 - self.vaddr.0) as u32;
        let mut low = self.clone();
        low.size = low_size;
        let mut high = self.clone();
        high.vaddr = split;
        high.size = self.size - low_size;
        (low, high)
    }
}

/// Computes the line boundary an access of `size` bytes at `vaddr` crosses.
///
/// Returns `None` when the access fits within one line of `line_bytes`.
/// Callers must ensure `size <= line_bytes`, so at most one boundary can be
/// crossed.
pub const fn line_split_point(vaddr: VirtAddr, size: u32, line_bytes: u64) -> Option<VirtAddr> {
    let last = vaddr.offset(size as u64 - 1);
    let split = last.round_down(line_bytes);
    if split.0 > vaddr.0 { Some(split) } else { None }
}

/// Which part of an access a translation result belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Fragment {
    /// The whole, unsplit access.
    Whole,
    /// Lower fragment of a split access.
    Low,
    /// Upper fragment of a split access.
    High,
}

/// Identifies an outstanding translation to the backend.
///
/// The backend hands the token back with the result. The generation guards
/// against a completion from an abandoned translation being applied to a
/// newer one on the same instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TranslationToken {
    /// Instruction that owns the translation.
    pub seq: InstSeqNum,
    /// Translation attempt on that instruction.
    pub generation: u32,
    /// Part of the access.
    pub fragment: Fragment,
}

/// A fully translated access, ready to be issued to memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranslatedAccess {
    /// The whole access. Its physical address is that of its first byte.
    pub main: MemRequest,
    /// Low and high fragments of a split access.
    pub fragments: Option<(MemRequest, MemRequest)>,
}

impl TranslatedAccess {
    /// Returns true if the access was split at a line boundary.
    #[inline]
    pub const fn is_split(&self) -> bool {
        self.fragments.is_some()
    }

    /// Requests that are sent to memory, in address order.
    pub fn pieces(&self) -> Vec<&MemRequest> {
        match &self.fragments {
            Some((low, high)) => vec![low, high],
            None => vec![&self.main],
        }
    }

    /// Maps a virtual byte of the access to its physical address.
    pub fn paddr_of(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
        self.pieces().into_iter().find_map(|piece| {
            if piece.contains(vaddr) {
                piece.paddr.map(|p| p.offset(vaddr.0 - piece.vaddr.0))
            } else {
                None
            }
        })
    }

    /// Physical address of the low (or only) piece.
    pub fn paddr_low(&self) -> Option<PhysAddr> {
        self.fragments
            .as_ref()
            .map_or(self.main.paddr, |(low, _)| low.paddr)
    }

    /// Physical address of the high piece, if split.
    pub fn paddr_high(&self) -> Option<PhysAddr> {
        self.fragments.as_ref().and_then(|(_, high)| high.paddr)
    }
}
