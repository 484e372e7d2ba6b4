//! Translation Protocol Unit Tests.
//!
//! Verifies synchronous and deferred translation, retry collapse, line
//! splits, fault handling, stale and late completions, and deferred
//! reclamation of removed records.

use pretty_assertions::assert_eq;
use rstest::rstest;
use specsim_core::common::{
    AccessType, Fault, InstSeqNum, PhysAddr, RequestFlags, TranslationResult, VirtAddr,
};
use specsim_core::config::CoreConfig;
use specsim_core::core::cpu::RemoveOutcome;
use specsim_core::core::inst::status::{Progress, SquashSite};
use specsim_core::core::translation::{CompletionOutcome, Fragment, TranslationPhase};

use crate::common::harness::{PHYS_OFFSET, TestContext};
use crate::common::mocks::translator::Reply;

fn split_core() -> CoreConfig {
    CoreConfig {
        cache_line_bytes: 64,
        unaligned_access: true,
        ..CoreConfig::default()
    }
}

// ══════════════════════════════════════════════════════════
// Synchronous path
// ══════════════════════════════════════════════════════════

#[test]
fn test_sync_read_reaches_memory() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    assert!(ctx.read(seq, 0x100, 8).is_none());

    let inst = &ctx.cpu[seq];
    assert!(inst.translation_started());
    assert!(inst.translation_completed());
    assert!(!inst.is_translation_delayed());
    assert_eq!(inst.phys_eff_addr_low(), Some(PhysAddr::new(PHYS_OFFSET + 0x100)));
    assert_eq!(inst.phys_eff_addr_high(), None);
    assert!(inst.eff_addr_valid());
    assert_eq!(inst.eff_addr(), VirtAddr::new(0x100));
    assert_eq!(inst.eff_size(), 8);
    assert!(inst.has_request());
    // Scheduler marks a successful read executed, not the access itself.
    assert_eq!(inst.progress(), Progress::Dispatched);

    let seen = ctx.memory.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, AccessType::Read);
    assert_eq!(seen[0].queue_idx, 0);
    assert_eq!(ctx.cpu.stats().translations_issued, 1);
    assert_eq!(ctx.cpu.stats().reads_issued, 1);
}

#[test]
fn test_write_carries_data_and_store_index() {
    let mut ctx = TestContext::new();
    let _ = ctx.load(None);
    let st = ctx.store(None);
    assert!(ctx.write(st, 0x200, &[1, 2, 3, 4]).is_none());

    let seen = ctx.memory.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, AccessType::Write);
    assert_eq!(seen[0].queue_idx, 1);
    assert_eq!(seen[0].data, vec![1, 2, 3, 4]);
    assert_eq!(ctx.translator.seen()[0].mode, AccessType::Write);
    assert_eq!(ctx.cpu.stats().writes_issued, 1);
}

#[test]
fn test_translated_access_is_reissued_on_each_call() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    let _ = ctx.read(seq, 0x100, 8);

    assert_eq!(ctx.translator.seen().len(), 1);
    assert_eq!(ctx.memory.count(), 2);
}

#[test]
fn test_strict_order_flag_is_recorded() {
    let mut ctx = TestContext::new();
    ctx.translator.set_strict(true);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);

    assert!(ctx.cpu[seq].strictly_ordered());
    assert!(ctx.cpu[seq].mem_req_flags().contains(RequestFlags::STRICT_ORDER));
}

#[test]
fn test_checker_keeps_a_copy_of_the_request() {
    let core = CoreConfig {
        checker_enabled: true,
        ..CoreConfig::default()
    };
    let mut ctx = TestContext::with_core(core, Reply::Sync);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x180, 4);

    let copy = ctx.cpu[seq].req_to_verify().unwrap();
    assert_eq!(copy.main.vaddr, VirtAddr::new(0x180));
    assert_eq!(copy.main.paddr, Some(PhysAddr::new(PHYS_OFFSET + 0x180)));
}

#[test]
fn test_no_checker_copy_by_default() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x180, 4);
    assert!(ctx.cpu[seq].req_to_verify().is_none());
}

#[test]
fn test_cond_swap_carries_extra_data() {
    let mut ctx = TestContext::new();
    let st = ctx.store(None);
    let _ = ctx.cpu.initiate_write(
        st,
        &[0; 8],
        8,
        VirtAddr::new(0x300),
        RequestFlags::COND_SWAP,
        Some(7),
    );
    assert_eq!(ctx.memory.seen()[0].extra_data, Some(7));
}

#[test]
fn test_plain_write_drops_extra_data() {
    let mut ctx = TestContext::new();
    let st = ctx.store(None);
    let _ = ctx
        .cpu
        .initiate_write(st, &[0; 8], 8, VirtAddr::new(0x300), RequestFlags::NONE, Some(7));
    assert_eq!(ctx.memory.seen()[0].extra_data, None);
}

// ══════════════════════════════════════════════════════════
// Faults
// ══════════════════════════════════════════════════════════

#[test]
fn test_translation_fault_is_recorded_and_read_executes() {
    let mut ctx = TestContext::with_reply(Reply::Fault);
    let seq = ctx.load(None);
    let fault = ctx.read(seq, 0x100, 8);

    assert_eq!(fault, Some(Fault::LoadPageFault(0x100)));
    let inst = &ctx.cpu[seq];
    assert_eq!(inst.fault(), Some(&Fault::LoadPageFault(0x100)));
    assert!(inst.is_executed());
    assert!(matches!(inst.translation_phase(), TranslationPhase::Released));
    assert_eq!(ctx.memory.count(), 0);
    assert_eq!(ctx.cpu.stats().translation_faults, 1);
}

#[test]
fn test_store_fault_does_not_reach_memory() {
    let mut ctx = TestContext::with_reply(Reply::Fault);
    let st = ctx.store(None);
    let fault = ctx.write(st, 0x200, &[9; 4]);
    assert_eq!(fault, Some(Fault::StorePageFault(0x200)));
    assert_eq!(ctx.memory.count(), 0);
}

#[test]
fn test_memory_fault_is_returned() {
    let mut ctx = TestContext::new();
    ctx.memory.fail_next(Fault::LoadAccessFault(0x100));
    let seq = ctx.load(None);
    assert_eq!(ctx.read(seq, 0x100, 8), Some(Fault::LoadAccessFault(0x100)));
}

#[rstest]
#[case::zero(0)]
#[case::too_wide(65)]
#[should_panic(expected = "not a valid access size")]
fn test_bad_access_size_panics(#[case] size: u32) {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, size);
}

#[rstest]
#[case::short(4)]
#[case::long(16)]
#[case::empty(0)]
#[should_panic(expected = "bytes of data")]
fn test_write_data_must_match_size(#[case] len: usize) {
    let mut ctx = TestContext::new();
    let st = ctx.store(None);
    let data = vec![0xab; len];
    let _ = ctx
        .cpu
        .initiate_write(st, &data, 8, VirtAddr::new(0x300), RequestFlags::NONE, None);
}

#[test]
#[should_panic(expected = "without a load/store queue slot")]
fn test_read_without_lsq_slot_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    ctx.cpu.inst_mut(seq).unwrap().clear_in_lsq();
    let _ = ctx.read(seq, 0x100, 8);
}

// ══════════════════════════════════════════════════════════
// Deferred path
// ══════════════════════════════════════════════════════════

#[test]
fn test_deferred_read_issues_after_completion() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    assert!(ctx.read(seq, 0x100, 8).is_none());
    assert!(ctx.cpu[seq].is_translation_delayed());
    assert!(!ctx.cpu[seq].translation_completed());
    assert_eq!(ctx.memory.count(), 0);

    assert_eq!(ctx.deliver_all(), vec![CompletionOutcome::Finished]);
    assert!(ctx.cpu[seq].translation_completed());
    assert_eq!(ctx.memory.count(), 0);

    assert!(ctx.read(seq, 0x100, 8).is_none());
    assert_eq!(ctx.memory.count(), 1);
    assert_eq!(ctx.translator.seen().len(), 1);
}

#[test]
fn test_retries_collapse_while_in_flight() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    for _ in 0..4 {
        let _ = ctx.read(seq, 0x100, 8);
    }
    assert_eq!(ctx.translator.seen().len(), 1);
    assert_eq!(ctx.cpu.stats().retry_collapses, 3);
    assert_eq!(ctx.cpu[seq].outstanding_fragments(), 1);
}

#[test]
fn test_deferred_fault_surfaces_on_retry() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    let (token, _) = ctx.translator.take_held().remove(0);
    let outcome = ctx.cpu.complete_translation(
        token,
        TranslationResult::fault(Fault::LoadPageFault(0x100)),
    );
    assert_eq!(outcome, CompletionOutcome::Finished);

    assert_eq!(ctx.read(seq, 0x100, 8), Some(Fault::LoadPageFault(0x100)));
    assert!(ctx.cpu[seq].is_executed());
    assert_eq!(ctx.memory.count(), 0);
}

// ══════════════════════════════════════════════════════════
// Line splits
// ══════════════════════════════════════════════════════════

#[test]
fn test_line_crossing_read_splits() {
    let mut ctx = TestContext::with_core(split_core(), Reply::Sync);
    let seq = ctx.load(None);
    assert!(ctx.read(seq, 0x13c, 8).is_none());

    let seen = ctx.translator.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].token.fragment, Fragment::Low);
    assert_eq!((seen[0].req.vaddr, seen[0].req.size), (VirtAddr::new(0x13c), 4));
    assert_eq!(seen[1].token.fragment, Fragment::High);
    assert_eq!((seen[1].req.vaddr, seen[1].req.size), (VirtAddr::new(0x140), 4));

    let inst = &ctx.cpu[seq];
    assert_eq!(inst.phys_eff_addr_low(), Some(PhysAddr::new(PHYS_OFFSET + 0x13c)));
    assert_eq!(inst.phys_eff_addr_high(), Some(PhysAddr::new(PHYS_OFFSET + 0x140)));
    assert_eq!(inst.eff_size(), 8);
    assert_eq!(ctx.cpu.stats().split_requests, 1);

    let mem = ctx.memory.seen();
    assert_eq!(mem.len(), 1);
    assert_eq!(mem[0].paddrs.len(), 2);
}

#[test]
fn test_split_halves_land_on_distinct_pages() {
    let mut ctx = TestContext::with_core(split_core(), Reply::Sync);
    ctx.translator.map_page(0, 0x9_0000);
    ctx.translator.map_page(1, 0x4_0000);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0xffc, 8);

    let inst = &ctx.cpu[seq];
    assert_eq!(inst.phys_eff_addr_low(), Some(PhysAddr::new(0x9_0000 * 4096 + 0xffc)));
    assert_eq!(inst.phys_eff_addr_high(), Some(PhysAddr::new(0x4_0000 * 4096)));
}

#[test]
fn test_aligned_isa_never_splits() {
    let core = CoreConfig {
        unaligned_access: false,
        ..split_core()
    };
    let mut ctx = TestContext::with_core(core, Reply::Sync);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x13c, 8);
    assert_eq!(ctx.translator.seen().len(), 1);
    assert_eq!(ctx.cpu[seq].phys_eff_addr_high(), None);
    assert_eq!(ctx.cpu.stats().split_requests, 0);
}

#[test]
fn test_split_completes_out_of_order() {
    let mut ctx = TestContext::with_core(split_core(), Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x13c, 8);
    let mut held = ctx.translator.take_held();
    assert_eq!(held.len(), 2);
    assert_eq!(ctx.cpu[seq].outstanding_fragments(), 2);

    let (lo_token, lo) = held.remove(0);
    let (hi_token, hi) = held.remove(0);
    assert_eq!(ctx.cpu.complete_translation(hi_token, hi), CompletionOutcome::Pending);
    assert!(ctx.cpu[seq].is_translation_delayed());
    assert_eq!(ctx.cpu.complete_translation(lo_token, lo), CompletionOutcome::Finished);
    assert_eq!(
        ctx.cpu[seq].phys_eff_addr_high(),
        Some(PhysAddr::new(PHYS_OFFSET + 0x140))
    );
}

#[test]
fn test_split_fault_in_one_half_faults_access() {
    let mut ctx = TestContext::with_core(split_core(), Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x13c, 8);
    let mut held = ctx.translator.take_held();
    let (lo_token, lo) = held.remove(0);
    let (hi_token, _) = held.remove(0);
    let _ = ctx.cpu.complete_translation(lo_token, lo);
    let _ = ctx.cpu.complete_translation(
        hi_token,
        TranslationResult::fault(Fault::LoadPageFault(0x140)),
    );

    assert_eq!(ctx.cpu[seq].fault(), Some(&Fault::LoadPageFault(0x140)));
    assert_eq!(ctx.cpu[seq].phys_eff_addr_low(), None);
}

#[test]
#[should_panic(expected = "crosses more than one line boundary")]
fn test_access_wider_than_line_panics() {
    let core = CoreConfig {
        cache_line_bytes: 16,
        ..split_core()
    };
    let mut ctx = TestContext::with_core(core, Reply::Sync);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 32);
}

// ══════════════════════════════════════════════════════════
// Stale and late completions
// ══════════════════════════════════════════════════════════

#[test]
fn test_duplicate_completion_is_stale() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    let (token, result) = ctx.translator.take_held().remove(0);

    assert_eq!(
        ctx.cpu.complete_translation(token, result.clone()),
        CompletionOutcome::Finished
    );
    assert_eq!(ctx.cpu.complete_translation(token, result), CompletionOutcome::Stale);
    assert_eq!(ctx.cpu.stats().stale_completions, 1);
}

#[test]
fn test_wrong_generation_is_stale() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    let (mut token, result) = ctx.translator.take_held().remove(0);
    token.generation = token.generation.wrapping_add(1);

    assert_eq!(ctx.cpu.complete_translation(token, result), CompletionOutcome::Stale);
    assert!(ctx.cpu[seq].is_translation_delayed());
}

#[test]
fn test_completion_for_unknown_instruction_is_stale() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    let (mut token, result) = ctx.translator.take_held().remove(0);
    token.seq = InstSeqNum(999);
    assert_eq!(ctx.cpu.complete_translation(token, result), CompletionOutcome::Stale);
}

#[test]
fn test_completion_after_squash_is_abandoned() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    ctx.cpu.squash(seq, SquashSite::LoadStoreQueue);

    assert_eq!(ctx.deliver_all(), vec![CompletionOutcome::Abandoned]);
    let inst = &ctx.cpu[seq];
    assert!(inst.translation_completed());
    assert!(!inst.is_translation_delayed());
    assert_eq!(inst.phys_eff_addr_low(), None);
    assert_eq!(inst.fault(), None);
    assert_eq!(inst.progress(), Progress::Dispatched);
    assert_eq!(ctx.memory.count(), 0);
    assert_eq!(ctx.cpu.stats().late_completions, 1);
}

// ══════════════════════════════════════════════════════════
// Deferred reclamation
// ══════════════════════════════════════════════════════════

#[test]
fn test_remove_with_translation_outstanding_defers_reclaim() {
    let mut ctx = TestContext::with_reply(Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x100, 8);
    ctx.cpu.squash(seq, SquashSite::ReorderBuffer);

    assert_eq!(ctx.release(seq), RemoveOutcome::Deferred);
    assert!(ctx.cpu.inst(seq).is_none());
    assert_eq!(ctx.cpu.draining(), 1);
    assert_eq!(ctx.cpu.stats().reclaimed, 0);

    assert_eq!(ctx.deliver_all(), vec![CompletionOutcome::Abandoned]);
    assert_eq!(ctx.cpu.draining(), 0);
    assert_eq!(ctx.cpu.stats().reclaimed, 1);
    assert_eq!(ctx.cpu.stats().deferred_reclaims, 1);
}

#[test]
fn test_split_drain_waits_for_both_halves() {
    let mut ctx = TestContext::with_core(split_core(), Reply::Deferred);
    let seq = ctx.load(None);
    let _ = ctx.read(seq, 0x13c, 8);
    ctx.cpu.squash(seq, SquashSite::Pipeline);
    assert_eq!(ctx.release(seq), RemoveOutcome::Deferred);

    let mut held = ctx.translator.take_held();
    let (t0, r0) = held.remove(0);
    assert_eq!(ctx.cpu.complete_translation(t0, r0), CompletionOutcome::Pending);
    assert_eq!(ctx.cpu.draining(), 1);
    let (t1, r1) = held.remove(0);
    assert_eq!(ctx.cpu.complete_translation(t1, r1), CompletionOutcome::Abandoned);
    assert_eq!(ctx.cpu.draining(), 0);
}
