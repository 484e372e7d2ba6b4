//! Lifecycle Unit Tests.
//!
//! Verifies the progress path, terminal states, squash sites, container
//! membership and the removal preconditions.

use pretty_assertions::assert_eq;
use rstest::rstest;
use specsim_core::common::{Fault, InstSeqNum};
use specsim_core::core::cpu::RemoveOutcome;
use specsim_core::core::inst::DynInst;
use specsim_core::core::inst::operands::{InstResult, PhysRegId};
use specsim_core::core::inst::status::{LsqSlot, Progress, SquashSite};
use specsim_core::isa::RegId;

use crate::common::harness::TestContext;

// ══════════════════════════════════════════════════════════
// Progress path
// ══════════════════════════════════════════════════════════

#[test]
fn test_progress_walks_forward() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    assert_eq!(inst.progress(), Progress::Dispatched);

    inst.set_can_issue();
    assert!(inst.ready_to_issue());
    inst.set_issued();
    inst.set_executed();
    assert!(inst.is_issued());
    assert!(inst.is_executed());
    assert!(!inst.can_commit());

    inst.set_can_commit();
    inst.set_at_commit();
    assert!(inst.is_at_commit());
    inst.set_committed();
    assert!(inst.is_committed());
    assert!(inst.is_terminal());
    assert!(!inst.ready_to_issue());
}

#[test]
fn test_progress_never_moves_backwards() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_executed();
    inst.set_issued();
    assert_eq!(inst.progress(), Progress::Executed);
}

#[test]
fn test_spec_completed_on_memory_op() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_spec_completed();
    assert!(inst.is_spec_completed());
    assert_eq!(inst.progress(), Progress::SpecCompleted);
}

#[test]
#[should_panic(expected = "non-memory")]
fn test_spec_completed_on_alu_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    ctx.cpu.inst_mut(seq).unwrap().set_spec_completed();
}

// ══════════════════════════════════════════════════════════
// Squash
// ══════════════════════════════════════════════════════════

#[rstest]
#[case(SquashSite::Pipeline)]
#[case(SquashSite::InstQueue)]
#[case(SquashSite::LoadStoreQueue)]
#[case(SquashSite::ReorderBuffer)]
fn test_any_squash_site_is_terminal(#[case] site: SquashSite) {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    ctx.cpu.squash(seq, site);

    let inst = &ctx.cpu[seq];
    assert!(inst.is_squashed());
    assert!(inst.is_terminal());
    assert!(!inst.is_committed());
    assert_eq!(inst.is_squashed_in_iq(), site == SquashSite::InstQueue);
    assert_eq!(inst.is_squashed_in_lsq(), site == SquashSite::LoadStoreQueue);
    assert_eq!(inst.is_squashed_in_rob(), site == SquashSite::ReorderBuffer);
}

#[test]
fn test_repeated_squash_accumulates_sites() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_squashed_in_iq();
    inst.set_squashed_in_rob();
    assert!(inst.is_squashed_in_iq());
    assert!(inst.is_squashed_in_rob());
    assert!(!inst.is_squashed_in_lsq());
}

#[test]
fn test_squash_younger_than_skips_older_and_terminal() {
    let mut ctx = TestContext::new();
    let a = ctx.alu(None);
    let b = ctx.alu(None);
    let c = ctx.alu(None);
    let d = ctx.alu(None);
    ctx.cpu.squash(c, SquashSite::Pipeline);

    let squashed = ctx.cpu.squash_younger_than(a, 0);
    assert_eq!(squashed, vec![b, d]);
    assert!(!ctx.cpu[a].is_squashed());
}

#[rstest]
#[case::issue("set_issued")]
#[case::lsq("set_in_lsq")]
#[case::unsquashable("mark_unsquashable")]
#[should_panic(expected = "already squashed")]
fn test_mutation_after_squash_panics(#[case] op: &str) {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    ctx.cpu.squash(seq, SquashSite::Pipeline);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    match op {
        "set_issued" => inst.set_issued(),
        "set_in_lsq" => inst.set_in_lsq(LsqSlot::Load(0)),
        _ => inst.mark_unsquashable(),
    }
}

#[test]
#[should_panic(expected = "already committed")]
fn test_squash_after_commit_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_committed();
    inst.set_squashed();
}

#[rstest]
#[case::completed(|i: &mut DynInst| i.set_completed())]
#[case::result_ready(|i: &mut DynInst| i.set_result_ready())]
#[case::expose_completed(|i: &mut DynInst| i.set_expose_completed())]
#[case::prev_brs_resolved(|i: &mut DynInst| i.set_prev_brs_resolved())]
#[case::prev_insts_committed(|i: &mut DynInst| i.set_prev_insts_committed())]
#[case::l1_hit(|i: &mut DynInst| i.set_l1_hit_low(true))]
#[case::serialize_before(|i: &mut DynInst| i.set_serialize_before())]
#[case::clear_serialize_after(|i: &mut DynInst| i.clear_serialize_after())]
#[case::serialize_handled(|i: &mut DynInst| i.set_serialize_handled())]
#[case::not_an_inst(|i: &mut DynInst| i.set_not_an_inst())]
#[case::load_violation(|i: &mut DynInst| i.set_possible_load_violation(true))]
#[case::snoop(|i: &mut DynInst| i.set_hit_external_snoop(true))]
#[case::validation_fail(|i: &mut DynInst| i.set_validation_fail(true))]
#[case::spec_tlb_miss(|i: &mut DynInst| i.set_spec_tlb_miss(true))]
#[case::mem_op_done(|i: &mut DynInst| i.set_mem_op_done(true))]
#[case::eff_addr_valid(|i: &mut DynInst| i.set_eff_addr_valid(true))]
#[case::predicate(|i: &mut DynInst| i.set_predicate(false))]
#[case::pred_taken(|i: &mut DynInst| i.set_pred_taken(true))]
#[case::pred_target(|i: &mut DynInst| i.set_pred_target(0x2000))]
#[case::resolved_npc(|i: &mut DynInst| i.set_resolved_next_pc(0x2000))]
#[case::args_tainted(|i: &mut DynInst| i.set_args_tainted(true))]
#[case::dest_tainted(|i: &mut DynInst| i.set_dest_tainted(true))]
#[case::addr_tainted(|i: &mut DynInst| i.set_addr_tainted(true))]
#[case::flows(|i: &mut DynInst| i.set_flows(true, false))]
#[case::pending_squash(|i: &mut DynInst| i.set_pending_squash(true))]
#[case::ready_to_expose(|i: &mut DynInst| i.set_ready_to_expose(false))]
#[case::fence_delay(|i: &mut DynInst| i.set_fence_delay(true))]
#[case::dopp_dbg(|i: &mut DynInst| i.set_dopp_dbg(true))]
#[case::dopp_executing(|i: &mut DynInst| i.set_dopp_load_executing(true))]
#[case::fault(|i: &mut DynInst| i.set_fault(Some(Fault::LoadPageFault(0))))]
#[case::record_result(|i: &mut DynInst| i.set_record_result(true))]
#[case::push_result(|i: &mut DynInst| i.push_result(InstResult::Scalar(1)))]
#[case::pop_result(|i: &mut DynInst| { let _ = i.pop_result(InstResult::Scalar(0)); })]
#[case::rename_dest(|i: &mut DynInst| i.rename_dest_reg(0, PhysRegId(3), PhysRegId(1)))]
#[case::rename_src(|i: &mut DynInst| i.rename_src_reg(0, PhysRegId(3)))]
#[case::flatten_dest(|i: &mut DynInst| i.flatten_dest_reg(0, RegId::int(5)))]
#[case::src_ready(|i: &mut DynInst| i.mark_src_reg_ready_idx(0))]
#[case::arg_producer(|i: &mut DynInst| i.set_arg_producer(0, InstSeqNum(0)))]
#[case::clear_producer(|i: &mut DynInst| i.clear_arg_producer(0))]
#[should_panic(expected = "already committed")]
fn test_setter_after_commit_panics(#[case] mutate: fn(&mut DynInst)) {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_committed();
    mutate(inst);
}

#[test]
fn test_containers_may_drop_a_committed_record() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_committed();
    inst.clear_in_iq();
    inst.clear_in_rob();
    inst.clear_in_lsq();
    inst.remove_from_stall_list();
    assert_eq!(inst.membership().holder(), None);
    assert!(inst.is_committed());
}

#[test]
#[should_panic(expected = "already committed")]
fn test_read_after_commit_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    ctx.cpu.inst_mut(seq).unwrap().set_committed();
    let _ = ctx.read(seq, 0x100, 8);
}

// ══════════════════════════════════════════════════════════
// Commit readiness
// ══════════════════════════════════════════════════════════

#[test]
fn test_pending_squash_blocks_commit_until_applied() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.set_can_commit();
    assert!(inst.ready_to_commit());

    inst.set_pending_squash(true);
    assert!(!inst.ready_to_commit());

    inst.set_squashed();
    assert!(inst.ready_to_commit());
}

// ══════════════════════════════════════════════════════════
// Membership
// ══════════════════════════════════════════════════════════

#[test]
fn test_queue_index_only_while_in_lsq() {
    let mut ctx = TestContext::new();
    let ld = ctx.load(None);
    let st = ctx.store(None);
    assert_eq!(ctx.cpu[ld].lq_idx(), Some(0));
    assert_eq!(ctx.cpu[ld].sq_idx(), None);
    assert_eq!(ctx.cpu[st].sq_idx(), Some(1));

    ctx.cpu.inst_mut(ld).unwrap().clear_in_lsq();
    assert!(!ctx.cpu[ld].is_in_lsq());
    assert_eq!(ctx.cpu[ld].lq_idx(), None);
}

#[test]
fn test_clear_membership_after_squash_is_allowed() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    ctx.cpu.inst_mut(seq).unwrap().set_in_iq();
    ctx.cpu.squash(seq, SquashSite::InstQueue);

    let inst = ctx.cpu.inst_mut(seq).unwrap();
    inst.clear_in_iq();
    inst.clear_in_lsq();
    inst.clear_in_rob();
    assert_eq!(inst.membership().holder(), None);
}

// ══════════════════════════════════════════════════════════
// Removal
// ══════════════════════════════════════════════════════════

#[test]
fn test_remove_committed_reclaims() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    assert_eq!(ctx.retire(seq), RemoveOutcome::Reclaimed);
    assert!(ctx.cpu.inst(seq).is_none());
    assert_eq!(ctx.cpu.stats().committed, 1);
    assert_eq!(ctx.cpu.stats().reclaimed, 1);
}

#[test]
fn test_remove_squashed_counts_squash() {
    let mut ctx = TestContext::new();
    let seq = ctx.load(None);
    ctx.cpu.squash(seq, SquashSite::ReorderBuffer);
    assert_eq!(ctx.release(seq), RemoveOutcome::Reclaimed);
    assert_eq!(ctx.cpu.stats().squashed, 1);
    assert!(ctx.cpu.window().is_empty());
}

#[test]
#[should_panic(expected = "removed before reaching a terminal state")]
fn test_remove_live_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let _ = ctx.release(seq);
}

#[test]
#[should_panic(expected = "still held by the reorder buffer")]
fn test_remove_while_queued_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    ctx.cpu.squash(seq, SquashSite::Pipeline);
    let _ = ctx.cpu.remove(seq);
}

#[test]
#[should_panic(expected = "does not name a live instruction")]
fn test_remove_twice_panics() {
    let mut ctx = TestContext::new();
    let seq = ctx.alu(None);
    let _ = ctx.retire(seq);
    let _ = ctx.cpu.remove(seq);
}

#[test]
fn test_removed_producer_no_longer_resolves() {
    let mut ctx = TestContext::new();
    let p = ctx.alu(None);
    let c = ctx.alu(Some(p));
    assert_eq!(ctx.cpu.producer(c, 0).map(DynInst::seq), Some(p));

    let _ = ctx.retire(p);
    assert!(ctx.cpu.producer(c, 0).is_none());
}
