//! Collaborator interfaces of the translation protocol.
//!
//! The instruction talks to exactly two outside parties during a memory
//! access: something that translates addresses and something that performs
//! the access. Both are injected when the CPU is built.

use crate::common::{AccessType, Fault, ThreadId, TranslationResult};

use super::request::{MemRequest, TranslatedAccess, TranslationToken};

/// A translation result delivered after `translate_timing` returned `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredCompletion {
    /// Token handed to the backend when the request was issued.
    pub token: TranslationToken,
    /// Outcome of the translation.
    pub result: TranslationResult,
}

/// Address translation service.
pub trait TranslationBackend {
    /// Begins translating `req` for an access of kind `mode`.
    ///
    /// Returns `Some` when the result is known immediately. Otherwise the
    /// backend keeps `token` and must deliver exactly one result for it
    /// later, either from [`TranslationBackend::tick`] or through
    /// `Cpu::complete_translation`.
    fn translate_timing(
        &mut self,
        req: &MemRequest,
        tid: ThreadId,
        mode: AccessType,
        token: TranslationToken,
    ) -> Option<TranslationResult>;

    /// Advances the backend to `cycle`, returning completions that became due.
    fn tick(&mut self, _cycle: u64) -> Vec<DeferredCompletion> {
        Vec::new()
    }
}

/// Memory access service.
///
/// Both calls return a fault raised while issuing the access, if any. Data
/// returns through the load/store queue, not through the instruction.
pub trait MemoryBackend {
    /// Issues a translated read on behalf of load-queue entry `lq_idx`.
    fn read(&mut self, access: &TranslatedAccess, lq_idx: u16) -> Option<Fault>;

    /// Issues a translated write of `data` on behalf of store-queue entry `sq_idx`.
    fn write(&mut self, access: &TranslatedAccess, data: &[u8], sq_idx: u16) -> Option<Fault>;
}
