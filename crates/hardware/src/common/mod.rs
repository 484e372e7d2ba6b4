//! Common utilities and types used throughout the core.
//!
//! This module provides fundamental building blocks shared by every component.
//! It includes:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Constants:** Operand bounds and page geometry.
//! 3. **Memory Access:** Access classification and request flags.
//! 4. **Error Handling:** Faults, translation results and contract violations.
//! 5. **Identity:** Sequence numbers and thread ids.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Common constants used throughout the core.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Fault, translation result and contract-violation types.
pub mod error;

/// Instruction sequence numbers and thread ids.
pub mod seq;

pub use addr::{PhysAddr, VirtAddr};
pub use data::{AccessType, RequestFlags};
pub use error::{ContractViolation, Fault, TranslationResult, violation};
pub use seq::{InstSeqNum, ThreadId};
