//! Shadow Load Unit Tests.
//!
//! Verifies that a tainted load can run its translation and read early as
//! a shadow access, wakes dependents at most once, and retranslates for
//! its real access after a reset.

use pretty_assertions::assert_eq;
use specsim_core::common::{Fault, InstSeqNum, RequestFlags, VirtAddr};
use specsim_core::core::inst::status::SquashSite;
use specsim_core::core::shadow::{ShadowLoad, ShadowState};
use specsim_core::core::translation::CompletionOutcome;

use crate::common::harness::TestContext;
use crate::common::mocks::translator::Reply;

const ADDR: u64 = 0x240;

fn shadow_read(ctx: &mut TestContext, seq: InstSeqNum) -> Option<Fault> {
    ctx.cpu
        .initiate_shadow_read(seq, VirtAddr::new(ADDR), 8, RequestFlags::NONE)
}

/// A load whose address depends on an older, still squashable load.
fn tainted_load(ctx: &mut TestContext) -> (InstSeqNum, InstSeqNum) {
    let root = ctx.load(None);
    let dep = ctx.load(Some(root));
    assert!(!ctx.cpu[dep].may_expose_read());
    (root, dep)
}

#[test]
fn test_shadow_read_bypasses_closed_gate() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (_, dep) = tainted_load(&mut ctx);

    assert!(shadow_read(&mut ctx, dep).is_none());
    let inst = &ctx.cpu[dep];
    assert_eq!(ShadowLoad::state(inst), ShadowState::Executing);
    assert!(inst.dopp_translation_completed());
    assert!(!inst.is_executed());
    assert!(!inst.may_expose_read());
    assert_eq!(ctx.memory.count(), 1);
    assert_eq!(ctx.cpu.stats().shadow_reads_issued, 1);
    assert_eq!(ctx.cpu.stats().shadow_loads_started, 1);
}

#[test]
fn test_shadow_forwarding_stays_out_of_real_buffers() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (_, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);

    let buffers = ctx.cpu.inst_mut(dep).unwrap().forward_buffers_mut();
    buffers.st_fwd_data = Some(vec![1; 8]);
    buffers.already_forwarded = true;
    assert_eq!(ctx.cpu[dep].shadow_forward().st_fwd_data, Some(vec![1; 8]));
    assert!(ctx.cpu[dep].real_forward().st_fwd_data.is_none());
    assert!(!ctx.cpu[dep].real_forward().already_forwarded);

    let _ = ctx.cpu.finish_shadow_load(dep, true);
    ctx.cpu.inst_mut(dep).unwrap().forward_buffers_mut().mem_data = Some(vec![2; 8]);
    assert_eq!(ctx.cpu[dep].real_forward().mem_data, Some(vec![2; 8]));
    assert!(ctx.cpu[dep].shadow_forward().mem_data.is_none());

    let _ = shadow_read(&mut ctx, dep);
    assert!(ctx.cpu[dep].shadow_forward().st_fwd_data.is_none());
    assert_eq!(ctx.cpu[dep].real_forward().mem_data, Some(vec![2; 8]));
}

#[test]
fn test_successful_shadow_wakes_once() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (_, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);

    assert!(ctx.cpu.finish_shadow_load(dep, true));
    assert!(!ctx.cpu.finish_shadow_load(dep, true));
    assert_eq!(ShadowLoad::state(&ctx.cpu[dep]), ShadowState::Succeeded);
    assert!(ctx.cpu[dep].dopp_has_woken_dependents());
    assert_eq!(ctx.cpu.stats().shadow_wakeups, 1);
    assert_eq!(ctx.cpu.stats().shadow_loads_succeeded, 1);
}

#[test]
fn test_unsuccessful_shadow_never_wakes() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (_, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);

    assert!(!ctx.cpu.finish_shadow_load(dep, false));
    assert_eq!(
        ShadowLoad::state(&ctx.cpu[dep]),
        ShadowState::FinishedWithoutSuccess
    );
}

#[test]
fn test_reset_retranslates_for_real_access() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (root, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);
    let _ = ctx.cpu.finish_shadow_load(dep, true);

    ctx.cpu.reset_dopp(dep);
    assert!(!ctx.cpu[dep].translation_started());
    assert_eq!(ShadowLoad::state(&ctx.cpu[dep]), ShadowState::Succeeded);

    ctx.cpu.mark_unsquashable(root);
    assert_eq!(ctx.cpu.release_stalled(), vec![dep]);
    assert!(ctx.cpu[dep].may_expose_read());

    assert!(ctx.read(dep, ADDR, 8).is_none());
    assert_eq!(ctx.translator.seen().len(), 2);
    assert_eq!(ctx.memory.count(), 2);
    assert_eq!(ctx.cpu.stats().reads_issued, 2);
    assert_eq!(ctx.cpu.stats().shadow_reads_issued, 1);
}

#[test]
fn test_deferred_shadow_translation() {
    let mut ctx = TestContext::dopp(Reply::Deferred);
    let (_, dep) = tainted_load(&mut ctx);

    assert!(shadow_read(&mut ctx, dep).is_none());
    assert!(ctx.cpu[dep].is_translation_delayed());
    assert!(!ctx.cpu[dep].dopp_translation_completed());

    assert_eq!(ctx.deliver_all(), vec![CompletionOutcome::Finished]);
    assert!(ctx.cpu[dep].dopp_translation_completed());
    assert_eq!(ctx.memory.count(), 0);

    let _ = shadow_read(&mut ctx, dep);
    assert_eq!(ctx.memory.count(), 1);
    assert_eq!(ctx.cpu.stats().shadow_loads_started, 1);
}

#[test]
fn test_faulting_shadow_gives_up_quietly() {
    let mut ctx = TestContext::dopp(Reply::Fault);
    let (_, dep) = tainted_load(&mut ctx);

    assert!(shadow_read(&mut ctx, dep).is_some());
    let inst = &ctx.cpu[dep];
    assert_eq!(ShadowLoad::state(inst), ShadowState::FinishedWithoutSuccess);
    assert!(!inst.translation_started());
    assert!(!inst.is_executed());
    assert_eq!(ctx.memory.count(), 0);
    assert!(!ctx.cpu.finish_shadow_load(dep, true));
}

#[test]
fn test_squashed_shadow_does_not_wake() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let (_, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);
    ctx.cpu.squash(dep, SquashSite::LoadStoreQueue);

    assert!(!ctx.cpu.finish_shadow_load(dep, true));
    assert!(ctx.cpu[dep].dopp_finished());
}

#[test]
#[should_panic(expected = "shadow-load mechanism")]
fn test_shadow_on_disabled_core_panics() {
    let mut ctx = TestContext::new();
    let (_, dep) = tainted_load(&mut ctx);
    let _ = shadow_read(&mut ctx, dep);
}

#[test]
#[should_panic(expected = "not a load")]
fn test_shadow_on_store_panics() {
    let mut ctx = TestContext::dopp(Reply::Sync);
    let st = ctx.store(None);
    let _ = shadow_read(&mut ctx, st);
}
