//! Physical and Virtual Address types.
//!
//! This module defines strong types for physical and virtual addresses to prevent
//! accidental mixing of address spaces. It provides the following:
//! 1. **Type Safety:** Distinguishes between virtual and physical address spaces at compile time.
//! 2. **Address Manipulation:** Helpers for page offsets, line rounding and offsets.
//! 3. **Translation Integration:** The currency of the translation protocol and its backends.

use std::fmt;

use serde::Serialize;

/// A virtual address as produced by an instruction's effective-address computation.
///
/// Virtual addresses must be translated to physical addresses by the
/// translation backend before a memory access can be issued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VirtAddr(pub u64);

/// A physical address, produced by a completed translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Extracts the offset of this address within a page of `page_bytes`.
    ///
    /// `page_bytes` must be a power of two.
    #[inline]
    pub const fn page_offset(&self, page_bytes: u64) -> u64 {
        self.0 & (page_bytes - 1)
    }

    /// Returns the virtual page number for a page of `page_bytes`.
    #[inline]
    pub const fn page_number(&self, page_bytes: u64) -> u64 {
        self.0 / page_bytes
    }

    /// Rounds the address down to a multiple of `align` (a power of two).
    #[inline]
    pub const fn round_down(&self, align: u64) -> Self {
        Self(self.0 & !(align - 1))
    }

    /// Returns the address `bytes` past this one.
    #[inline]
    pub const fn offset(&self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the address `bytes` past this one.
    #[inline]
    pub const fn offset(&self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v:{:#x}", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p:{:#x}", self.0)
    }
}
