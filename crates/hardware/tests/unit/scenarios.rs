//! Scenario Unit Tests.
//!
//! Runs the canonical scenarios over the reference MMU and memory, with
//! and without a trace sink, across configurations.

use pretty_assertions::assert_eq;
use rstest::rstest;
use specsim_core::config::Config;
use specsim_core::sim::scenarios::VIRT_BASE;
use specsim_core::sim::{Scenario, ScenarioError, ScenarioReport};
use specsim_core::trace::{CollectingSink, JsonLinesSink, TraceSink};

fn failed(report: &ScenarioReport) -> Vec<&'static str> {
    report
        .checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.name)
        .collect()
}

#[rstest]
#[case(Scenario::A)]
#[case(Scenario::B)]
#[case(Scenario::C)]
#[case(Scenario::D)]
fn test_scenario_passes_with_trace(#[case] scenario: Scenario) {
    crate::common::harness::init_logging();
    let sink = CollectingSink::new();
    let report = scenario
        .run(&Config::default(), Some(Box::new(sink.clone())))
        .unwrap();
    assert_eq!(failed(&report), Vec::<&str>::new());
    assert!(!sink.records().is_empty());
}

#[rstest]
#[case::sync_walks(0)]
#[case::short_walks(1)]
#[case::long_walks(50)]
fn test_scenarios_pass_across_walk_latencies(#[case] walk_latency: u64) {
    let mut config = Config::default();
    config.mmu.walk_latency = walk_latency;
    for scenario in Scenario::ALL {
        let report = scenario.run(&config, None).unwrap();
        assert!(report.passed(), "{scenario}: {:?}", failed(&report));
    }
}

#[test]
fn test_scenario_a_trace_records_commit() {
    let sink = CollectingSink::new();
    let report = Scenario::A
        .run(&Config::default(), Some(Box::new(sink.clone())))
        .unwrap();
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, Some("committed"));
    assert_eq!(records[0].mnemonic, "ld");
    let mem = records[0].mem.as_ref().unwrap();
    assert_eq!(mem.vaddr.val(), VIRT_BASE + 0x100);
    assert_eq!(mem.paddr.map(|p| p.val()), Some(0x8000_0100));
    assert_eq!(report.stats.committed, 1);
}

#[test]
fn test_scenario_c_traces_squashes_after_drain() {
    let sink = CollectingSink::new();
    let report = Scenario::C
        .run(&Config::default(), Some(Box::new(sink.clone())))
        .unwrap();
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.outcome == Some("squashed")));
    assert!(records.iter().all(|r| r.mem.as_ref().is_some_and(|m| m.paddr.is_none())));
    assert_eq!(report.stats.deferred_reclaims, 1);
}

#[test]
fn test_trace_renders_as_json_lines() {
    let sink = CollectingSink::new();
    let _ = Scenario::D
        .run(&Config::default(), Some(Box::new(sink.clone())))
        .unwrap();

    let mut out = JsonLinesSink::new(Vec::new());
    for rec in sink.records() {
        out.record(&rec);
    }
    let text = String::from_utf8(out.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["mnemonic"], "sd");
    assert_eq!(lines[0]["outcome"], "committed");
}

#[test]
fn test_tiny_memory_is_rejected() {
    let mut config = Config::default();
    config.memory.size = 4096;
    let err = Scenario::A.run(&config, None).unwrap_err();
    assert!(matches!(err, ScenarioError::MemoryTooSmall(4096)));
}

#[test]
fn test_report_serializes() {
    let report = Scenario::A.run(&Config::default(), None).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenario"], "a");
    assert!(json["checks"].as_array().is_some_and(|c| !c.is_empty()));
}

#[rstest]
#[case("all", 4)]
#[case("ALL", 4)]
#[case("c", 1)]
#[case("D", 1)]
fn test_selection(#[case] text: &str, #[case] count: usize) {
    assert_eq!(Scenario::parse_selection(text).unwrap().len(), count);
}

#[test]
fn test_unknown_selection() {
    let err = Scenario::parse_selection("e").unwrap_err();
    assert_eq!(err.to_string(), "unknown scenario 'e' (expected a, b, c, d or all)");
}
