//! MMU Unit Tests.
//!
//! Drives the reference MMU through the CPU: walk latency, out-of-order
//! walk completion, TLB hits and permission faults.

use pretty_assertions::assert_eq;
use specsim_core::common::{Fault, PhysAddr, RequestFlags};
use specsim_core::config::{Config, MmuConfig};
use specsim_core::core::units::mmu::Mmu;
use specsim_core::core::units::mmu::ptw::PageTableEntry;

use crate::common::harness::TestContext;

const VBASE: u64 = 0x4000_0000;
const PBASE: u64 = 0x8000_0000;
const PAGE: u64 = 4096;
const RO_PAGE: u64 = VBASE + 16 * PAGE;
const DEVICE_PAGE: u64 = VBASE + 17 * PAGE;

fn mmu_context(walk_latency: u64) -> TestContext {
    let config = Config {
        mmu: MmuConfig {
            walk_latency,
            ..MmuConfig::default()
        },
        ..Config::default()
    };
    let mut mmu = Mmu::new(&config.mmu);
    mmu.map_range(VBASE, PBASE, 16 * PAGE, |ppn| PageTableEntry::new(ppn, true, true));
    mmu.map_range(RO_PAGE, PBASE + 16 * PAGE, PAGE, |ppn| {
        PageTableEntry::new(ppn, true, false)
    });
    mmu.map_range(DEVICE_PAGE, PBASE + 17 * PAGE, PAGE, |ppn| {
        PageTableEntry::new(ppn, true, true).strictly_ordered()
    });
    TestContext::with_backend(&config, Box::new(mmu))
}

#[test]
fn test_walk_delivers_after_latency() {
    let mut ctx = mmu_context(3);
    let ld = ctx.load(None);
    assert!(ctx.read(ld, VBASE + 0x18, 8).is_none());
    assert!(ctx.cpu[ld].is_translation_delayed());

    assert_eq!(ctx.cpu.tick(), 0);
    assert_eq!(ctx.cpu.tick(), 0);
    assert!(ctx.cpu[ld].is_translation_delayed());
    assert_eq!(ctx.cpu.tick(), 1);
    assert!(ctx.cpu[ld].translation_completed());
    assert_eq!(ctx.cpu[ld].phys_eff_addr_low(), Some(PhysAddr::new(PBASE + 0x18)));

    assert!(ctx.read(ld, VBASE + 0x18, 8).is_none());
    assert_eq!(ctx.memory.count(), 1);
}

#[test]
fn test_younger_walk_can_finish_first() {
    let mut ctx = mmu_context(3);
    let older = ctx.load(None);
    let younger = ctx.load(None);

    let _ = ctx.read(younger, VBASE + 2 * PAGE, 8);
    let _ = ctx.cpu.tick();
    let _ = ctx.read(older, VBASE + 3 * PAGE, 8);
    let _ = ctx.cpu.tick();
    let _ = ctx.cpu.tick();

    assert!(ctx.cpu[younger].translation_completed());
    assert!(ctx.cpu[older].is_translation_delayed());
    let _ = ctx.cpu.tick();
    assert!(ctx.cpu[older].translation_completed());
}

#[test]
fn test_tlb_hit_after_walk_is_synchronous() {
    let mut ctx = mmu_context(2);
    let first = ctx.load(None);
    let _ = ctx.read(first, VBASE + 0x40, 8);
    let _ = ctx.cpu.tick();
    let _ = ctx.cpu.tick();

    let second = ctx.load(None);
    assert!(ctx.read(second, VBASE + 0x80, 8).is_none());
    assert!(!ctx.cpu[second].is_translation_delayed());
    assert_eq!(ctx.cpu[second].phys_eff_addr_low(), Some(PhysAddr::new(PBASE + 0x80)));
    assert_eq!(ctx.memory.count(), 1);
}

#[test]
fn test_store_to_read_only_page_faults() {
    let mut ctx = mmu_context(0);
    let st = ctx.store(None);
    let fault = ctx.write(st, RO_PAGE + 8, &[0; 8]);
    assert_eq!(fault, Some(Fault::StorePageFault(RO_PAGE + 8)));
    assert_eq!(ctx.memory.count(), 0);

    let ld = ctx.load(None);
    assert!(ctx.read(ld, RO_PAGE + 8, 8).is_none());
}

#[test]
fn test_unmapped_page_faults_after_walk() {
    let mut ctx = mmu_context(1);
    let ld = ctx.load(None);
    let addr = VBASE + 64 * PAGE;
    assert!(ctx.read(ld, addr, 8).is_none());
    let _ = ctx.cpu.tick();
    assert_eq!(ctx.read(ld, addr, 8), Some(Fault::LoadPageFault(addr)));
    assert!(ctx.cpu[ld].is_executed());
}

#[test]
fn test_device_page_is_strictly_ordered() {
    let mut ctx = mmu_context(0);
    let ld = ctx.load(None);
    let _ = ctx.read(ld, DEVICE_PAGE, 4);
    let inst = &ctx.cpu[ld];
    assert!(inst.strictly_ordered());
    assert!(inst.mem_req_flags().contains(RequestFlags::UNCACHEABLE));
}
