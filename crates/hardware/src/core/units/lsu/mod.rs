//! Load/Store Unit (LSU).
//!
//! Reference [`MemoryBackend`]: a flat physical memory region. Every piece
//! of a (possibly split) access is bounds-checked against the region before
//! any byte moves, and every issued access is logged so a caller can see
//! exactly what reached memory and in what order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::trace;

use crate::common::{AccessType, Fault, PhysAddr};
use crate::config::MemoryConfig;
use crate::core::translation::{MemoryBackend, TranslatedAccess};

/// One access as it reached memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuedAccess {
    /// Read or write.
    pub kind: AccessType,
    /// Load or store queue index supplied by the issuer.
    pub queue_idx: u16,
    /// Physical address and length of each piece, in address order.
    pub pieces: Vec<(PhysAddr, u32)>,
    /// Fault raised by the access, if any.
    pub fault: Option<Fault>,
}

#[derive(Debug)]
struct Region {
    base: u64,
    bytes: Vec<u8>,
    log: Vec<IssuedAccess>,
}

impl Region {
    /// Byte range of a piece inside the region, or `None` if it falls outside.
    fn span(&self, paddr: PhysAddr, size: u32) -> Option<std::ops::Range<usize>> {
        let start = paddr.0.checked_sub(self.base)? as usize;
        let end = start.checked_add(size as usize)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    fn check(&self, access: &TranslatedAccess, kind: AccessType) -> Option<Fault> {
        access.pieces().into_iter().find_map(|piece| match piece.paddr {
            Some(p) if self.span(p, piece.size).is_some() => None,
            Some(p) => Some(Fault::access_fault(p.0, kind)),
            None => Some(Fault::access_fault(piece.vaddr.0, kind)),
        })
    }
}

/// Flat RAM shared between a core and whoever inspects it.
///
/// Clones share the same storage and access log.
#[derive(Clone, Debug)]
pub struct FlatMemory {
    region: Arc<Mutex<Region>>,
}

impl FlatMemory {
    /// Creates zero-filled memory covering the configured region.
    ///
    /// # Arguments
    ///
    /// * `config` - Base physical address and size in bytes.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            region: Arc::new(Mutex::new(Region {
                base: config.base,
                bytes: vec![0; config.size as usize],
                log: Vec::new(),
            })),
        }
    }

    fn region(&self) -> MutexGuard<'_, Region> {
        self.region.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies `data` into memory at `paddr`, bypassing the access log.
    ///
    /// # Returns
    ///
    /// False if the range falls outside the region; nothing is written then.
    pub fn load_bytes(&self, paddr: PhysAddr, data: &[u8]) -> bool {
        let mut region = self.region();
        match region.span(paddr, data.len() as u32) {
            Some(range) => {
                region.bytes[range].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Reads `len` bytes at `paddr` without logging an access.
    pub fn peek(&self, paddr: PhysAddr, len: u32) -> Option<Vec<u8>> {
        let region = self.region();
        region.span(paddr, len).map(|r| region.bytes[r].to_vec())
    }

    /// Reads the bytes covered by a translated access, in virtual order.
    pub fn read_bytes(&self, access: &TranslatedAccess) -> Option<Vec<u8>> {
        let region = self.region();
        let mut out = Vec::with_capacity(access.main.size as usize);
        for piece in access.pieces() {
            let range = region.span(piece.paddr?, piece.size)?;
            out.extend_from_slice(&region.bytes[range]);
        }
        Some(out)
    }

    /// Accesses issued so far, oldest first.
    pub fn accesses(&self) -> Vec<IssuedAccess> {
        self.region().log.clone()
    }
}

impl MemoryBackend for FlatMemory {
    fn read(&mut self, access: &TranslatedAccess, lq_idx: u16) -> Option<Fault> {
        let mut region = self.region();
        let fault = region.check(access, AccessType::Read);
        trace!(vaddr = %access.main.vaddr, size = access.main.size, lq_idx, ?fault, "read");
        region.log.push(IssuedAccess {
            kind: AccessType::Read,
            queue_idx: lq_idx,
            pieces: pieces_of(access),
            fault: fault.clone(),
        });
        fault
    }

    fn write(&mut self, access: &TranslatedAccess, data: &[u8], sq_idx: u16) -> Option<Fault> {
        let mut region = self.region();
        let fault = region.check(access, AccessType::Write).or_else(|| {
            (data.len() != access.main.size as usize)
                .then(|| Fault::access_fault(access.main.vaddr.0, AccessType::Write))
        });
        if fault.is_none() {
            let mut consumed = 0usize;
            for piece in access.pieces() {
                let len = piece.size as usize;
                if let Some(range) = piece.paddr.and_then(|p| region.span(p, piece.size))
                    && let Some(src) = data.get(consumed..consumed + len)
                {
                    region.bytes[range].copy_from_slice(src);
                }
                consumed += len;
            }
        }
        trace!(vaddr = %access.main.vaddr, size = access.main.size, sq_idx, ?fault, "write");
        region.log.push(IssuedAccess {
            kind: AccessType::Write,
            queue_idx: sq_idx,
            pieces: pieces_of(access),
            fault: fault.clone(),
        });
        fault
    }
}

fn pieces_of(access: &TranslatedAccess) -> Vec<(PhysAddr, u32)> {
    access
        .pieces()
        .into_iter()
        .map(|p| (p.paddr.unwrap_or_default(), p.size))
        .collect()
}
