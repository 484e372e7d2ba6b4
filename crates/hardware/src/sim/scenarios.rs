//! Canonical instruction scenarios.
//!
//! Each scenario plays the scheduler's part against a [`Cpu`] wired to the
//! reference MMU and flat memory, and records a named check for every
//! property it expects:
//! 1. **A:** An untainted load executes without entering the stall list.
//! 2. **B:** A tainted load is stalled, runs as a shadow load, and performs
//!    its real access only after its producer becomes unsquashable.
//! 3. **C:** A load squashed while its translation is in flight releases the
//!    translation when the late completion arrives and is not mutated.
//! 4. **D:** An access straddling a line boundary is split in two and both
//!    halves map back onto the virtual range.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::{Fault, InstSeqNum, PhysAddr, RequestFlags, VirtAddr};
use crate::config::Config;
use crate::core::Cpu;
use crate::core::cpu::RemoveOutcome;
use crate::core::inst::DynInst;
use crate::core::inst::status::{LsqSlot, SquashSite};
use crate::core::units::lsu::FlatMemory;
use crate::core::units::mmu::Mmu;
use crate::core::units::mmu::ptw::PageTableEntry;
use crate::isa::{RegId, StaticInst};
use crate::stats::CoreStats;
use crate::trace::TraceSink;

/// Virtual base the reference memory is mapped at.
pub const VIRT_BASE: u64 = 0x4000_0000;

const PC_BASE: u64 = 0x1_0000;

/// Errors that stop a scenario before it can report.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario name is not one of `a`, `b`, `c`, `d` or `all`.
    #[error("unknown scenario '{0}' (expected a, b, c, d or all)")]
    Unknown(String),

    /// A translation never completed within the cycle budget.
    #[error("{seq} translation still outstanding after {cycles} cycles")]
    Stuck {
        /// Instruction whose translation hung.
        seq: InstSeqNum,
        /// Cycles waited.
        cycles: u64,
    },

    /// The configured memory cannot hold the scenario's accesses.
    #[error("reference memory of {0} bytes is too small for the scenarios")]
    MemoryTooSmall(u64),
}

/// One of the canonical scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Untainted load.
    A,
    /// Tainted load with a shadow access.
    B,
    /// Squash while translation is in flight.
    C,
    /// Line-crossing split access.
    D,
}

impl Scenario {
    /// Every scenario, in order.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Parses `a`, `b`, `c`, `d` or `all`.
    ///
    /// # Returns
    ///
    /// The selected scenarios in order.
    pub fn parse_selection(s: &str) -> Result<Vec<Self>, ScenarioError> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL.to_vec());
        }
        s.parse().map(|one| vec![one])
    }

    /// One-line description.
    pub const fn title(self) -> &'static str {
        match self {
            Self::A => "untainted load executes without stalling",
            Self::B => "tainted load stalls and runs a shadow access",
            Self::C => "squash before translation completes",
            Self::D => "line-crossing access splits in two",
        }
    }

    /// Runs the scenario on a fresh core.
    ///
    /// # Arguments
    ///
    /// * `config` - Base configuration; a scenario may override the options
    ///   it depends on (shadow loads for B, a non-zero walk latency for C,
    ///   a 64-byte line for D).
    /// * `sink` - Optional trace sink handed to the core.
    pub fn run(
        self,
        config: &Config,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Result<ScenarioReport, ScenarioError> {
        let mut config = config.clone();
        match self {
            Self::A => {}
            Self::B => config.core.dopp_enabled = true,
            Self::C => config.mmu.walk_latency = config.mmu.walk_latency.max(1),
            Self::D => {
                config.core.cache_line_bytes = 64;
                config.core.unaligned_access = true;
            }
        }
        if sink.is_some() {
            config.trace.enabled = true;
        }
        if config.memory.size < 2 * config.mmu.page_bytes {
            return Err(ScenarioError::MemoryTooSmall(config.memory.size));
        }

        let (cpu, memory) = build_cpu(&config);
        let mut cpu = match sink {
            Some(sink) => cpu.with_trace_sink(sink),
            None => cpu,
        };
        info!(scenario = %self, "running");

        let mut checks = Checklist::default();
        match self {
            Self::A => scenario_a(&mut cpu, &config, &mut checks)?,
            Self::B => scenario_b(&mut cpu, &config, &mut checks)?,
            Self::C => scenario_c(&mut cpu, &config, &mut checks)?,
            Self::D => scenario_d(&mut cpu, &config, &memory, &mut checks)?,
        }

        Ok(ScenarioReport {
            scenario: self,
            title: self.title(),
            checks: checks.0,
            stats: cpu.stats().clone(),
        })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
        };
        f.write_str(name)
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            _ => Err(ScenarioError::Unknown(s.to_string())),
        }
    }
}

/// A named expectation and whether it held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Check {
    /// What was expected.
    pub name: &'static str,
    /// Whether it held.
    pub passed: bool,
}

/// Outcome of one scenario run.
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    /// Which scenario ran.
    pub scenario: Scenario,
    /// Its description.
    pub title: &'static str,
    /// Every expectation, in the order checked.
    pub checks: Vec<Check>,
    /// Core counters at the end of the run.
    pub stats: CoreStats,
}

impl ScenarioReport {
    /// Returns true if every check held.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

#[derive(Default)]
struct Checklist(Vec<Check>);

impl Checklist {
    fn check(&mut self, name: &'static str, passed: bool) {
        if passed {
            debug!(check = name, "ok");
        } else {
            warn!(check = name, "failed");
        }
        self.0.push(Check { name, passed });
    }
}

/// Builds a core over the reference MMU and flat memory.
///
/// All of physical memory is mapped read/write at [`VIRT_BASE`].
///
/// # Returns
///
/// The core and a handle onto the memory it writes.
pub fn build_cpu(config: &Config) -> (Cpu, FlatMemory) {
    let mut mmu = Mmu::new(&config.mmu);
    mmu.map_range(VIRT_BASE, config.memory.base, config.memory.size, |ppn| {
        PageTableEntry::new(ppn, true, true)
    });
    let memory = FlatMemory::new(&config.memory);
    let cpu = Cpu::new(config, Box::new(mmu), Box::new(memory.clone()));
    (cpu, memory)
}

fn load_inst() -> Arc<StaticInst> {
    Arc::new(StaticInst::load("ld", &[RegId::int(10)], RegId::int(11)))
}

fn store_inst() -> Arc<StaticInst> {
    Arc::new(StaticInst::store("sd", &[RegId::int(10), RegId::int(12)]))
}

/// Dispatches a memory instruction, gives it a queue slot and marks its
/// operands ready.
fn dispatch_mem(
    cpu: &mut Cpu,
    si: Arc<StaticInst>,
    slot: LsqSlot,
    producers: &[Option<InstSeqNum>],
) -> InstSeqNum {
    let pc = PC_BASE + cpu.stats().dispatched * 4;
    let seq = cpu.dispatch(si, pc, pc + 4, 0, producers);
    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_in_lsq(slot);
        inst.set_in_rob();
        for idx in 0..inst.num_src_regs() {
            inst.mark_src_reg_ready_idx(idx);
        }
    }
    seq
}

/// Calls an entry point, and once more after its translation completes if
/// the first call left it in flight.
fn drive(
    cpu: &mut Cpu,
    config: &Config,
    seq: InstSeqNum,
    mut access: impl FnMut(&mut Cpu) -> Option<Fault>,
) -> Result<Option<Fault>, ScenarioError> {
    let delayed = |cpu: &Cpu| cpu.inst(seq).is_some_and(DynInst::is_translation_delayed);

    let fault = access(&mut *cpu);
    if !delayed(cpu) {
        return Ok(fault);
    }
    let budget = config.mmu.walk_latency + 2;
    let mut waited = 0;
    while delayed(cpu) {
        if waited == budget {
            return Err(ScenarioError::Stuck {
                seq,
                cycles: waited,
            });
        }
        let _ = cpu.tick();
        waited += 1;
    }
    Ok(access(&mut *cpu))
}

/// Commits `seq` and removes it from every container.
fn retire(cpu: &mut Cpu, seq: InstSeqNum) -> RemoveOutcome {
    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_can_commit();
        inst.set_at_commit();
        inst.set_committed();
        inst.clear_in_lsq();
        inst.clear_in_rob();
    }
    cpu.remove(seq)
}

fn scenario_a(cpu: &mut Cpu, config: &Config, checks: &mut Checklist) -> Result<(), ScenarioError> {
    let addr = VirtAddr::new(VIRT_BASE + 0x100);
    let seq = dispatch_mem(cpu, load_inst(), LsqSlot::Load(0), &[]);
    checks.check("untainted load is not stalled", !cpu[seq].is_in_stall_list());
    checks.check("generic issue gate admits the load", cpu.can_issue(seq));
    checks.check("load may expose its read", cpu[seq].may_expose_read());

    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_issued();
    }
    let fault = drive(cpu, config, seq, |cpu| {
        cpu.initiate_read(seq, addr, 8, RequestFlags::NONE)
    })?;
    checks.check("read completes without fault", fault.is_none());
    checks.check(
        "physical address follows the mapping",
        cpu[seq].phys_eff_addr_low() == Some(PhysAddr::new(config.memory.base + 0x100)),
    );

    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_executed();
    }
    checks.check("load reached executed", cpu[seq].is_executed());
    checks.check("load never entered the stall list", cpu.stats().stall_list_insertions == 0);
    checks.check("committed load is reclaimed", retire(cpu, seq) == RemoveOutcome::Reclaimed);
    Ok(())
}

fn scenario_b(cpu: &mut Cpu, config: &Config, checks: &mut Checklist) -> Result<(), ScenarioError> {
    let addr = VirtAddr::new(VIRT_BASE + 0x200);
    let producer = dispatch_mem(cpu, load_inst(), LsqSlot::Load(0), &[]);
    let seq = dispatch_mem(cpu, load_inst(), LsqSlot::Load(1), &[Some(producer)]);

    checks.check("dependent load has tainted arguments", cpu[seq].is_args_tainted());
    checks.check("tainted load is stalled on dispatch", cpu[seq].is_in_stall_list());
    checks.check("generic issue gate refuses it", !cpu.can_issue(seq));
    checks.check("taint alone never blocks a load", cpu.taint_permits_issue(seq));
    checks.check("expose gate is closed", !cpu[seq].may_expose_read());

    let shadow_fault = drive(cpu, config, seq, |cpu| {
        cpu.initiate_shadow_read(seq, addr, 8, RequestFlags::NONE)
    })?;
    checks.check("shadow load is executing", cpu[seq].is_dopp_load_executing());
    checks.check("shadow translation completed", cpu[seq].dopp_translation_completed());
    checks.check("shadow access completes without fault", shadow_fault.is_none());
    checks.check("shadow access reached memory", cpu.stats().shadow_reads_issued == 1);
    checks.check("real execution is deferred", !cpu[seq].is_executed());

    checks.check("shadow success wakes dependents", cpu.finish_shadow_load(seq, true));
    checks.check("wakeup happens only once", !cpu.finish_shadow_load(seq, true));

    if let Some(inst) = cpu.inst_mut(producer) {
        inst.set_prev_brs_resolved();
    }
    let released = cpu.release_stalled();
    checks.check("producer became unsquashable", cpu[producer].is_unsquashable());
    checks.check("dependent load left the stall list", released.contains(&seq));
    checks.check("expose gate opened", cpu[seq].may_expose_read());

    cpu.reset_dopp(seq);
    checks.check("reset clears translation progress", !cpu[seq].translation_started());
    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_issued();
    }
    let fault = drive(cpu, config, seq, |cpu| {
        cpu.initiate_read(seq, addr, 8, RequestFlags::NONE)
    })?;
    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_executed();
    }
    checks.check("real read completes", fault.is_none() && cpu[seq].is_executed());
    checks.check("two reads reached memory", cpu.stats().reads_issued == 2);

    checks.check("producer retires", retire(cpu, producer) == RemoveOutcome::Reclaimed);
    checks.check("dependent load retires", retire(cpu, seq) == RemoveOutcome::Reclaimed);
    Ok(())
}

fn scenario_c(cpu: &mut Cpu, config: &Config, checks: &mut Checklist) -> Result<(), ScenarioError> {
    let addr = VirtAddr::new(VIRT_BASE + 0x300);
    let seq = dispatch_mem(cpu, load_inst(), LsqSlot::Load(0), &[]);
    if let Some(inst) = cpu.inst_mut(seq) {
        inst.set_issued();
    }

    let _ = cpu.initiate_read(seq, addr, 8, RequestFlags::NONE);
    checks.check("translation is in flight", cpu[seq].is_translation_delayed());
    let _ = cpu.initiate_read(seq, addr, 8, RequestFlags::NONE);
    checks.check("retry issues nothing new", cpu.stats().translations_issued == 1);

    cpu.squash(seq, SquashSite::LoadStoreQueue);
    let progress = cpu[seq].progress();

    for _ in 0..=config.mmu.walk_latency {
        let _ = cpu.tick();
    }
    let inst = &cpu[seq];
    checks.check("instruction is squashed", inst.is_squashed() && inst.is_squashed_in_lsq());
    checks.check(
        "no request is held",
        inst.translation_completed() && !inst.is_translation_delayed(),
    );
    checks.check("progress did not move", inst.progress() == progress);
    checks.check("no address was recorded", inst.phys_eff_addr_low().is_none());
    checks.check("late completion was counted", cpu.stats().late_completions == 1);
    checks.check("nothing reached memory", cpu.stats().reads_issued == 0);

    if let Some(inst) = cpu.inst_mut(seq) {
        inst.clear_in_lsq();
        inst.clear_in_rob();
    }
    checks.check("squashed load is reclaimed", cpu.remove(seq) == RemoveOutcome::Reclaimed);

    // Removed while the walk is still outstanding.
    let early = dispatch_mem(cpu, load_inst(), LsqSlot::Load(1), &[]);
    let _ = cpu.initiate_read(early, VirtAddr::new(VIRT_BASE + 0x1300), 8, RequestFlags::NONE);
    cpu.squash(early, SquashSite::ReorderBuffer);
    if let Some(inst) = cpu.inst_mut(early) {
        inst.clear_in_lsq();
        inst.clear_in_rob();
    }
    checks.check("removal waits for the walk", cpu.remove(early) == RemoveOutcome::Deferred);
    for _ in 0..=config.mmu.walk_latency {
        let _ = cpu.tick();
    }
    checks.check("record is reclaimed once the walk returns", cpu.draining() == 0);
    checks.check("every record was reclaimed", cpu.stats().reclaimed == 2);
    Ok(())
}

fn scenario_d(
    cpu: &mut Cpu,
    config: &Config,
    memory: &FlatMemory,
    checks: &mut Checklist,
) -> Result<(), ScenarioError> {
    let line_base = 0x40;
    let addr = VirtAddr::new(VIRT_BASE + line_base - 4);
    let data = [1, 2, 3, 4, 5, 6, 7, 8];

    let store = dispatch_mem(cpu, store_inst(), LsqSlot::Store(0), &[]);
    let fault = drive(cpu, config, store, |cpu| {
        cpu.initiate_write(store, &data, 8, addr, RequestFlags::NONE, None)
    })?;
    checks.check("split write completes", fault.is_none());
    checks.check("access was split once", cpu.stats().split_requests == 1);
    checks.check("both fragments were translated", cpu.stats().translations_issued == 2);

    let low = PhysAddr::new(config.memory.base + line_base - 4);
    let high = PhysAddr::new(config.memory.base + line_base);
    checks.check("low half maps below the line", cpu[store].phys_eff_addr_low() == Some(low));
    checks.check("high half maps at the line", cpu[store].phys_eff_addr_high() == Some(high));
    checks.check("low piece holds 4 bytes", memory.peek(low, 4).as_deref() == Some(&data[..4]));
    checks.check("high piece holds 4 bytes", memory.peek(high, 4).as_deref() == Some(&data[4..]));

    let access = memory.accesses();
    checks.check(
        "memory saw one access with two pieces",
        access.len() == 1 && access[0].pieces == [(low, 4), (high, 4)],
    );
    checks.check("store retires", retire(cpu, store) == RemoveOutcome::Reclaimed);
    Ok(())
}
