//! Fault, Translation Result and Contract Violation definitions.
//!
//! This module defines how things go wrong in the core. It provides:
//! 1. **Fault Representation:** Faults are values stored on an instruction and
//!    inspected by commit logic; they never unwind.
//! 2. **Translation Results:** The outcome a translation backend reports for one request.
//! 3. **Contract Violations:** Programming errors by the caller, which fail fast.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::addr::PhysAddr;
use super::data::{AccessType, RequestFlags};
use super::seq::InstSeqNum;

/// Fault produced while translating or performing a data access.
///
/// Stored on the instruction; the commit stage decides whether the
/// instruction squashes or retires with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// Load address misaligned. The associated value is the virtual address.
    LoadAddressMisaligned(u64),

    /// Load access fault (no device or memory at the physical address).
    LoadAccessFault(u64),

    /// Store address misaligned. The associated value is the virtual address.
    StoreAddressMisaligned(u64),

    /// Store access fault (no device or memory at the physical address).
    StoreAccessFault(u64),

    /// Load page fault. The associated value is the faulting virtual address.
    LoadPageFault(u64),

    /// Store page fault. The associated value is the faulting virtual address.
    StorePageFault(u64),
}

impl Fault {
    /// Builds the page fault matching an access type.
    pub const fn page_fault(addr: u64, access: AccessType) -> Self {
        match access {
            AccessType::Read => Self::LoadPageFault(addr),
            AccessType::Write => Self::StorePageFault(addr),
        }
    }

    /// Builds the access fault matching an access type.
    pub const fn access_fault(addr: u64, access: AccessType) -> Self {
        match access {
            AccessType::Read => Self::LoadAccessFault(addr),
            AccessType::Write => Self::StoreAccessFault(addr),
        }
    }

    /// Returns the address the fault was raised for.
    pub const fn addr(&self) -> u64 {
        match self {
            Self::LoadAddressMisaligned(a)
            | Self::LoadAccessFault(a)
            | Self::StoreAddressMisaligned(a)
            | Self::StoreAccessFault(a)
            | Self::LoadPageFault(a)
            | Self::StorePageFault(a) => *a,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadAddressMisaligned(addr) => write!(f, "LoadAddressMisaligned({addr:#x})"),
            Self::LoadAccessFault(addr) => write!(f, "LoadAccessFault({addr:#x})"),
            Self::StoreAddressMisaligned(addr) => {
                write!(f, "StoreAddressMisaligned({addr:#x})")
            }
            Self::StoreAccessFault(addr) => write!(f, "StoreAccessFault({addr:#x})"),
            Self::LoadPageFault(addr) => write!(f, "LoadPageFault({addr:#x})"),
            Self::StorePageFault(addr) => write!(f, "StorePageFault({addr:#x})"),
        }
    }
}

impl std::error::Error for Fault {}

/// Result of translating one (possibly partial) request.
///
/// Reported by the translation backend either synchronously from
/// `translate_timing` or later through the CPU's completion entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationResult {
    /// The translated physical address, or zero if translation failed.
    pub paddr: PhysAddr,
    /// Flags the backend attaches to the request (e.g. strict ordering).
    pub flags: RequestFlags,
    /// Fault raised by the translation, if any.
    pub fault: Option<Fault>,
}

impl TranslationResult {
    /// Creates a successful translation result.
    #[inline]
    pub const fn success(paddr: PhysAddr, flags: RequestFlags) -> Self {
        Self {
            paddr,
            flags,
            fault: None,
        }
    }

    /// Creates a translation result indicating a fault occurred.
    #[inline]
    pub const fn fault(fault: Fault) -> Self {
        Self {
            paddr: PhysAddr(0),
            flags: RequestFlags::NONE,
            fault: Some(fault),
        }
    }

    /// Returns true if the backend marked the request strictly ordered.
    #[inline]
    pub const fn is_strictly_ordered(&self) -> bool {
        self.flags.contains(RequestFlags::STRICT_ORDER)
    }
}

/// Misuse of the instruction-record API by the scheduler or a backend.
///
/// These are programming errors, not simulated events. They are raised
/// through [`violation`], which panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// A mutation was attempted after commit or squash.
    #[error("{seq} {op} on an instruction that is already {state}")]
    TerminalMutation {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Operation that was attempted.
        op: &'static str,
        /// `"committed"` or `"squashed"`.
        state: &'static str,
    },

    /// A shadow-load operation was used on a core with the mechanism off.
    #[error("{seq} {op} requires the shadow-load mechanism, which is disabled")]
    ShadowLoadDisabled {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Operation that was attempted.
        op: &'static str,
    },

    /// Shadow loads apply to loads only.
    #[error("{seq} shadow load started on an instruction that is not a load")]
    ShadowLoadOnNonLoad {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// A normal read was issued with the expose gate closed.
    #[error("{seq} read initiated while not ready to expose")]
    ExposeGateClosed {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// The instruction holds no load/store queue slot.
    #[error("{seq} memory access issued without a load/store queue slot")]
    NotInLsq {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// Only loads and stores pass through the spec-completed state.
    #[error("{seq} spec-completed marked on a non-memory instruction")]
    SpecCompletedOnNonMemory {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// Unsquashable and args-tainted are mutually exclusive.
    #[error("{seq} marked unsquashable while its arguments are tainted")]
    UnsquashableWhileTainted {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// Access size is zero or larger than any supported access.
    #[error("{seq} access of {size} bytes is not a valid access size")]
    BadAccessSize {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Requested size in bytes.
        size: u32,
    },

    /// Store data must cover exactly the requested access.
    #[error("{seq} write of {size} bytes given {len} bytes of data")]
    DataSizeMismatch {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Requested size in bytes.
        size: u32,
        /// Length of the data buffer.
        len: usize,
    },

    /// An unaligned access would need more than two fragments.
    #[error("{seq} access crosses more than one line boundary")]
    SplitTooWide {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// Removal requires commit or squash first.
    #[error("{seq} removed before reaching a terminal state")]
    RemoveLiveInstruction {
        /// Offending instruction.
        seq: InstSeqNum,
    },

    /// Removal requires every container to have let go.
    #[error("{seq} removed while still held by the {container}")]
    RemoveWhileQueued {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Container still holding it.
        container: &'static str,
    },

    /// The sequence number names no instruction in the window.
    #[error("{seq} does not name a live instruction")]
    StaleReference {
        /// Sequence number that failed to resolve.
        seq: InstSeqNum,
    },

    /// A completion arrived with nothing to complete.
    #[error("completion for {seq} delivered without an outstanding translation")]
    UnexpectedCompletion {
        /// Instruction named by the completion token.
        seq: InstSeqNum,
    },

    /// Operand index beyond the operand arrays.
    #[error("operand {idx} out of range for {seq}")]
    OperandOutOfRange {
        /// Offending instruction.
        seq: InstSeqNum,
        /// Requested operand slot.
        idx: usize,
    },
}

/// Raises a contract violation.
///
/// # Panics
///
/// Always. The simulated machine state is no longer trustworthy after a
/// violation, so there is nothing sensible to continue with.
#[cold]
#[track_caller]
pub fn violation(v: ContractViolation) -> ! {
    tracing::error!(%v, "contract violation");
    panic!("contract violation: {v}")
}
