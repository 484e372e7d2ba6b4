//! End-to-end drivers.
//!
//! Builds a core over the reference backends and walks it through the
//! canonical instruction scenarios, reporting what held.

pub mod scenarios;

pub use scenarios::{Check, Scenario, ScenarioError, ScenarioReport, build_cpu};
