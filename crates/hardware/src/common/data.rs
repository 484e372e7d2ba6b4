//! Memory Access Types.
//!
//! This module defines the classification of data accesses used throughout the core.
//! These types are used for the following:
//! 1. **Permission Validation:** Checking Read/Write permissions in the translation backend.
//! 2. **Fault Generation:** Determining the correct page fault or access fault.
//! 3. **Trace Records:** Tagging access metadata handed to the trace sink.

use serde::Serialize;

/// Mode a translation is performed in.
///
/// Instruction fetch is handled by the frontend and never reaches the
/// per-instruction protocol, so only data accesses are represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AccessType {
    /// Data read access (loads, and the shadow access of a tainted load).
    Read,

    /// Data write access (stores).
    Write,
}

impl AccessType {
    /// Short lowercase name used in log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Memory request flag set carried by a request from the instruction to the
/// translation and memory backends.
///
/// The translation backend may add flags (e.g. [`RequestFlags::STRICT_ORDER`]
/// for device memory); the merged set is recorded on the instruction when
/// translation finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RequestFlags(pub u32);

impl RequestFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Access must not be reordered or performed speculatively.
    pub const STRICT_ORDER: Self = Self(1 << 0);
    /// Access bypasses the caches.
    pub const UNCACHEABLE: Self = Self(1 << 1);
    /// Load-linked / store-conditional access.
    pub const LLSC: Self = Self(1 << 2);
    /// Part of a locked read-modify-write sequence.
    pub const LOCKED_RMW: Self = Self(1 << 3);
    /// Conditional swap; the request carries extra data supplied by the write.
    pub const COND_SWAP: Self = Self(1 << 4);
    /// Software prefetch.
    pub const PREFETCH: Self = Self(1 << 5);

    /// Returns true if every flag in `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for RequestFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
