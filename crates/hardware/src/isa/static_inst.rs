//! Decoded static instruction form.
//!
//! The core never decodes; it receives an immutable, shared view of the
//! decoder's output. This module defines that view. It provides:
//! 1. **Classification:** Operation class and the boolean properties the core forwards.
//! 2. **Operands:** Architectural source and destination register ids.
//! 3. **Control:** Instruction length and the static branch target, if any.

use serde::Serialize;

use crate::common::constants::{MAX_INST_DEST_REGS, MAX_INST_SRC_REGS};

/// Functional-unit class of an operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum OpClass {
    /// No functional unit (nops).
    NoOpClass,
    /// Integer ALU.
    #[default]
    IntAlu,
    /// Integer multiplier.
    IntMult,
    /// Integer divider.
    IntDiv,
    /// Floating-point arithmetic.
    FloatArith,
    /// Data read port.
    MemRead,
    /// Data write port.
    MemWrite,
}

/// Register file an architectural register lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RegClass {
    /// Integer register file.
    Int,
    /// Floating-point register file.
    Float,
    /// Condition-code register file.
    Cc,
}

/// Architectural register identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RegId {
    /// Register file.
    pub class: RegClass,
    /// Index within the file.
    pub index: u16,
}

impl RegId {
    /// Integer register `index`.
    pub const fn int(index: u16) -> Self {
        Self {
            class: RegClass::Int,
            index,
        }
    }

    /// Floating-point register `index`.
    pub const fn float(index: u16) -> Self {
        Self {
            class: RegClass::Float,
            index,
        }
    }
}

/// Static properties the decoder attaches to an instruction.
///
/// Each field corresponds to a property query forwarded by the dynamic
/// instruction (`is_load`, `is_control`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StaticFlags {
    /// Reads memory.
    pub load: bool,
    /// Writes memory.
    pub store: bool,
    /// Store-conditional.
    pub store_conditional: bool,
    /// Instruction prefetch hint.
    pub inst_prefetch: bool,
    /// Data prefetch hint.
    pub data_prefetch: bool,
    /// Floating point.
    pub floating: bool,
    /// Changes control flow.
    pub control: bool,
    /// Call.
    pub call: bool,
    /// Return.
    pub ret: bool,
    /// Direct control transfer (target encoded in the instruction).
    pub direct_ctrl: bool,
    /// Conditional control transfer.
    pub cond_ctrl: bool,
    /// Thread synchronization.
    pub thread_sync: bool,
    /// Must wait for all older instructions to complete before issuing.
    pub serialize_before: bool,
    /// Younger instructions must wait for this one to complete.
    pub serialize_after: bool,
    /// Squash younger instructions after this one commits.
    pub squash_after: bool,
    /// Full memory barrier.
    pub mem_barrier: bool,
    /// Write barrier.
    pub write_barrier: bool,
    /// Only executes non-speculatively, at the head of the ROB.
    pub non_speculative: bool,
    /// Blocking instruction.
    pub block: bool,
    /// System call.
    pub syscall: bool,
    /// Nop.
    pub nop: bool,
}

/// Immutable decoded form of an instruction, shared by every dynamic
/// instance created from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticInst {
    /// Mnemonic for logs and trace records.
    pub mnemonic: &'static str,
    /// Functional-unit class.
    pub op_class: OpClass,
    /// Boolean properties.
    pub flags: StaticFlags,
    /// Architectural source registers (at most [`MAX_INST_SRC_REGS`]).
    pub src_regs: Vec<RegId>,
    /// Architectural destination registers (at most [`MAX_INST_DEST_REGS`]).
    pub dest_regs: Vec<RegId>,
    /// Encoded length in bytes.
    pub size: u8,
    /// Target of a direct control transfer, relative to the instruction address.
    pub branch_offset: Option<i64>,
}

impl StaticInst {
    /// Creates a register-to-register ALU operation.
    pub fn alu(mnemonic: &'static str, srcs: &[RegId], dest: Option<RegId>) -> Self {
        Self::build(mnemonic, OpClass::IntAlu, StaticFlags::default(), srcs, dest)
    }

    /// Creates a load; the sources form its address.
    pub fn load(mnemonic: &'static str, srcs: &[RegId], dest: RegId) -> Self {
        let flags = StaticFlags {
            load: true,
            ..StaticFlags::default()
        };
        Self::build(mnemonic, OpClass::MemRead, flags, srcs, Some(dest))
    }

    /// Creates a store; the sources are address and data.
    pub fn store(mnemonic: &'static str, srcs: &[RegId]) -> Self {
        let flags = StaticFlags {
            store: true,
            ..StaticFlags::default()
        };
        Self::build(mnemonic, OpClass::MemWrite, flags, srcs, None)
    }

    /// Creates a conditional direct branch with a PC-relative target.
    pub fn branch(mnemonic: &'static str, srcs: &[RegId], offset: i64) -> Self {
        let flags = StaticFlags {
            control: true,
            direct_ctrl: true,
            cond_ctrl: true,
            ..StaticFlags::default()
        };
        let mut inst = Self::build(mnemonic, OpClass::IntAlu, flags, srcs, None);
        inst.branch_offset = Some(offset);
        inst
    }

    /// Creates an instruction with arbitrary flags.
    ///
    /// Operand lists longer than the record's fixed arrays are truncated.
    pub fn build(
        mnemonic: &'static str,
        op_class: OpClass,
        flags: StaticFlags,
        srcs: &[RegId],
        dest: Option<RegId>,
    ) -> Self {
        Self {
            mnemonic,
            op_class,
            flags,
            src_regs: srcs.iter().copied().take(MAX_INST_SRC_REGS).collect(),
            dest_regs: dest.into_iter().take(MAX_INST_DEST_REGS).collect(),
            size: 4,
            branch_offset: None,
        }
    }

    /// Returns true if the instruction accesses memory.
    pub const fn is_mem_ref(&self) -> bool {
        self.flags.load || self.flags.store
    }

    /// Number of source registers.
    pub fn num_src_regs(&self) -> usize {
        self.src_regs.len()
    }

    /// Number of destination registers.
    pub fn num_dest_regs(&self) -> usize {
        self.dest_regs.len()
    }

    /// Number of destination registers in `class`.
    pub fn num_dest_regs_of(&self, class: RegClass) -> usize {
        self.dest_regs.iter().filter(|r| r.class == class).count()
    }

    /// Computes the branch target for an instance at `pc`, if direct.
    pub const fn branch_target(&self, pc: u64) -> Option<u64> {
        match self.branch_offset {
            Some(off) => Some(pc.wrapping_add_signed(off)),
            None => None,
        }
    }
}
