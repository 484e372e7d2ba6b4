//! Global Core Constants.
//!
//! This module defines constants shared by the instruction record and the
//! translation protocol. It includes:
//! 1. **Operand Bounds:** Fixed sizes of the per-instruction register arrays.
//! 2. **Access Bounds:** The widest access the translation protocol accepts.

/// Maximum number of source register operands per instruction.
pub const MAX_INST_SRC_REGS: usize = 4;

/// Maximum number of destination register operands per instruction.
pub const MAX_INST_DEST_REGS: usize = 2;

/// Largest single access the protocol accepts, in bytes.
///
/// An access may straddle at most one line boundary, so it can never be
/// wider than the smallest supported line.
pub const MAX_ACCESS_BYTES: u32 = 64;
