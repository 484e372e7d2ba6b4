//! Static instruction descriptions.
//!
//! The core never decodes; it is handed decoded instructions whose static
//! properties (operation class, operand registers, control-flow and
//! serialization flags) are shared by every dynamic instance.

/// Decoded, immutable instruction properties.
pub mod static_inst;

pub use static_inst::{OpClass, RegClass, RegId, StaticFlags, StaticInst};
