//! Bookkeeping for one outstanding translation.
//!
//! A translation covers either one whole request or the two fragments of a
//! split request. Results may arrive in any order; the state collects them
//! and finishes once every fragment has reported.

use crate::common::{AccessType, Fault, RequestFlags, TranslationResult};

use super::request::{Fragment, MemRequest, TranslatedAccess};

/// Outcome of recording one fragment result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored; other fragments are still outstanding.
    Pending,
    /// Stored; every fragment has now reported.
    Complete,
    /// The fragment already reported, or does not belong to this translation.
    Rejected,
}

/// Result of a finished translation.
#[derive(Debug)]
pub struct FinishedTranslation {
    /// Translated access, or the first fault any fragment raised.
    pub outcome: Result<TranslatedAccess, Fault>,
    /// Any fragment was marked strictly ordered.
    pub strictly_ordered: bool,
    /// Caller flags merged with every backend-supplied flag.
    pub flags: RequestFlags,
}

/// State of one in-flight translation.
#[derive(Debug)]
pub struct TranslationState {
    mode: AccessType,
    generation: u32,
    main: MemRequest,
    halves: Option<(MemRequest, MemRequest)>,
    results: [Option<TranslationResult>; 2],
    cond_swap_data: Option<u64>,
}

impl TranslationState {
    /// Creates state for translating `main`, optionally split into `halves`.
    pub(crate) const fn new(
        main: MemRequest,
        halves: Option<(MemRequest, MemRequest)>,
        mode: AccessType,
        generation: u32,
        cond_swap_data: Option<u64>,
    ) -> Self {
        Self {
            mode,
            generation,
            main,
            halves,
            results: [None, None],
            cond_swap_data,
        }
    }

    /// Access mode.
    #[inline]
    pub const fn mode(&self) -> AccessType {
        self.mode
    }

    /// Translation attempt this state belongs to.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns true if the access was split.
    #[inline]
    pub const fn is_split(&self) -> bool {
        self.halves.is_some()
    }

    /// The unsplit request.
    #[inline]
    pub const fn main(&self) -> &MemRequest {
        &self.main
    }

    /// Requests that must each be translated, tagged with their fragment.
    pub fn fragments(&self) -> Vec<(Fragment, MemRequest)> {
        match &self.halves {
            Some((low, high)) => vec![(Fragment::Low, low.clone()), (Fragment::High, high.clone())],
            None => vec![(Fragment::Whole, self.main.clone())],
        }
    }

    /// Number of fragments still waiting for a result.
    pub fn outstanding(&self) -> usize {
        let expected = if self.is_split() { 2 } else { 1 };
        expected - self.results.iter().filter(|r| r.is_some()).count()
    }

    /// Returns true once every fragment has reported.
    pub fn is_complete(&self) -> bool {
        self.outstanding() == 0
    }

    const fn slot(&self, fragment: Fragment) -> Option<usize> {
        match (fragment, self.halves.is_some()) {
            (Fragment::Whole, false) | (Fragment::Low, true) => Some(0),
            (Fragment::High, true) => Some(1),
            _ => None,
        }
    }

    /// Records the result for one fragment.
    pub(crate) fn record(&mut self, fragment: Fragment, result: TranslationResult) -> RecordOutcome {
        let Some(slot) = self.slot(fragment) else {
            return RecordOutcome::Rejected;
        };
        if self.results[slot].is_some() {
            return RecordOutcome::Rejected;
        }
        self.results[slot] = Some(result);
        if self.is_complete() {
            RecordOutcome::Complete
        } else {
            RecordOutcome::Pending
        }
    }

    /// Consumes the state, merging fragment results.
    ///
    /// Must only be called once [`Self::is_complete`] holds; missing
    /// results are treated as faults on the unreported fragment.
    pub(crate) fn finish(self) -> FinishedTranslation {
        let Self {
            mode,
            main,
            halves,
            results: [first, second],
            cond_swap_data,
            ..
        } = self;

        let missing = |req: &MemRequest| TranslationResult::fault(Fault::page_fault(req.vaddr.0, mode));
        let (first, second) = match &halves {
            Some((low, high)) => (
                first.unwrap_or_else(|| missing(low)),
                Some(second.unwrap_or_else(|| missing(high))),
            ),
            None => (first.unwrap_or_else(|| missing(&main)), None),
        };

        let mut flags = main.flags.union(first.flags);
        let mut strictly_ordered = first.is_strictly_ordered();
        if let Some(second) = &second {
            flags = flags.union(second.flags);
            strictly_ordered |= second.is_strictly_ordered();
        }

        let fault = first
            .fault
            .clone()
            .or_else(|| second.as_ref().and_then(|s| s.fault.clone()));
        if let Some(fault) = fault {
            return FinishedTranslation {
                outcome: Err(fault),
                strictly_ordered,
                flags,
            };
        }

        let mut main = main;
        main.flags = flags;
        main.paddr = Some(first.paddr);
        if flags.contains(RequestFlags::COND_SWAP) {
            main.extra_data = cond_swap_data;
        }
        let fragments = match (halves, second) {
            (Some((mut low, mut high)), Some(second)) => {
                low.flags = flags;
                low.paddr = Some(first.paddr);
                high.flags = flags;
                high.paddr = Some(second.paddr);
                Some((low, high))
            }
            _ => None,
        };

        FinishedTranslation {
            outcome: Ok(TranslatedAccess { main, fragments }),
            strictly_ordered,
            flags,
        }
    }
}
