//! Speculative core CLI.
//!
//! This binary provides two entry points. It performs:
//! 1. **Scenarios:** Drives the core through the canonical instruction
//!    scenarios over the reference MMU and memory, optionally with a JSON
//!    configuration and a JSON-lines trace of every retired or squashed
//!    instruction.
//! 2. **Bench:** A host cache-timing microbenchmark. Each iteration loads
//!    through an index read from a second buffer and flushes the line
//!    holding the loop's condition, which is the timing channel shadow
//!    loads exist to hide.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use specsim_core::config::Config;
use specsim_core::sim::{Scenario, ScenarioReport};
use specsim_core::trace::{CollectingSink, JsonLinesSink, TraceSink};

mod bench;

#[derive(Parser, Debug)]
#[command(
    name = "specsim",
    author,
    version,
    about = "Speculative instruction core: scenarios and timing microbenchmark",
    long_about = "Drive the speculative core through its canonical scenarios, or run the host cache-timing microbenchmark.\n\nLogging is controlled with RUST_LOG (e.g. RUST_LOG=specsim_core=debug).\n\nExamples:\n  specsim scenario all\n  specsim scenario b --config core.json --trace trace.jsonl\n  specsim bench 2000000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one scenario (a, b, c, d) or all of them.
    Scenario {
        /// Scenario to run: a, b, c, d or all.
        #[arg(default_value = "all")]
        name: String,

        /// JSON configuration file; built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write a JSON-lines trace of every removed instruction here.
        #[arg(short, long)]
        trace: Option<PathBuf>,

        /// Print the reports as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Run the cache-timing microbenchmark on the host.
    Bench {
        /// Iteration budget; rounded down to whole passes over the buffers.
        #[arg(default_value_t = bench::DEFAULT_ITERS)]
        iters: usize,
    },
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed arguments");
    match cli.command {
        Commands::Scenario {
            name,
            config,
            trace,
            json,
        } => cmd_scenario(&name, config.as_deref(), trace.as_deref(), json),
        Commands::Bench { iters } => {
            let y = bench::run(iters);
            println!("y: {y}");
        }
    }
}

/// Loads the configuration file, or the defaults when none is given.
///
/// Exits the process with an error message if the file cannot be read or parsed.
fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("[!] FATAL: could not read config '{}': {e}", path.display());
        process::exit(1);
    });
    Config::from_json(&text).unwrap_or_else(|e| {
        eprintln!("[!] FATAL: {}: {e}", path.display());
        process::exit(1);
    })
}

/// Runs the selected scenarios and reports; exits with code 1 if any check fails.
fn cmd_scenario(name: &str, config_path: Option<&Path>, trace_path: Option<&Path>, json: bool) {
    let selection = Scenario::parse_selection(name).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(2);
    });
    let config = load_config(config_path);
    let collector = trace_path.map(|_| CollectingSink::new());

    let mut reports = Vec::with_capacity(selection.len());
    for scenario in selection {
        let sink = collector
            .clone()
            .map(|c| Box::new(c) as Box<dyn TraceSink>);
        match scenario.run(&config, sink) {
            Ok(report) => reports.push(report),
            Err(e) => {
                eprintln!("[!] scenario {scenario}: {e}");
                process::exit(1);
            }
        }
    }

    if let (Some(path), Some(collector)) = (trace_path, collector) {
        write_trace(path, &collector);
    }

    if json {
        match serde_json::to_string_pretty(&reports) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("[!] could not render reports: {e}");
                process::exit(1);
            }
        }
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if !reports.iter().all(ScenarioReport::passed) {
        process::exit(1);
    }
}

fn write_trace(path: &Path, collector: &CollectingSink) {
    let file = File::create(path).unwrap_or_else(|e| {
        eprintln!("[!] FATAL: could not create trace '{}': {e}", path.display());
        process::exit(1);
    });
    let mut sink = JsonLinesSink::new(BufWriter::new(file));
    let records = collector.records();
    for rec in &records {
        sink.record(rec);
    }
    if let Err(e) = sink.into_inner().flush() {
        eprintln!("[!] could not flush trace '{}': {e}", path.display());
        process::exit(1);
    }
    println!("[*] {} trace records written to {}", records.len(), path.display());
}

fn print_report(report: &ScenarioReport) {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    println!("[*] scenario {}: {} ... {verdict}", report.scenario, report.title);
    for check in &report.checks {
        let mark = if check.passed { "ok  " } else { "FAIL" };
        println!("    {mark} {}", check.name);
    }
    print!("{}", report.stats.render_sections(&[]));
    println!();
}
