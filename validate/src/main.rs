//! Definition file validator and scenario replay tool.
//!
//! `check` parses a condition set definition file and reports structural
//! problems. `replay` feeds a scripted telemetry scenario through an
//! engine and prints every output transition, optionally asserting the
//! final output value for scripted regression checks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Duration;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use vigil_core::conditions::{ConditionSetEngine, EngineOptions, OutputState, load_config};
use vigil_core::telemetry::{NullProvider, TelemetrySample};
use vigil_core::TelemetryValue;

#[derive(Parser)]
#[command(version, about = "Condition set definition tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a definition file and report structural problems
    Check {
        /// Definition file (TOML)
        path: PathBuf,
    },
    /// Replay a telemetry scenario against a condition set
    Replay {
        /// Definition file (TOML); the first set in the file is used
        #[arg(long)]
        set: PathBuf,
        /// Scenario file (TOML) with [[sample]] tables
        #[arg(long)]
        scenario: PathBuf,
        /// Assert the final output value (use "---" for blank)
        #[arg(long)]
        expect: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default, rename = "sample")]
    samples: Vec<ScenarioSample>,
}

#[derive(Debug, Deserialize)]
struct ScenarioSample {
    source: String,
    field: String,
    value: TelemetryValue,
    /// Milliseconds after scenario start
    #[serde(default)]
    at_ms: u64,
    #[serde(default = "default_valid")]
    valid: bool,
}

fn default_valid() -> bool {
    true
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { path } => check(&path),
        Commands::Replay {
            set,
            scenario,
            expect,
        } => replay(&set, &scenario, expect.as_deref()),
    }
}

fn check(path: &Path) -> ExitCode {
    // load_config validates every set structurally after parsing
    match load_config(path) {
        Ok(config) => {
            if config.condition_sets.is_empty() {
                eprintln!("{}: no condition sets defined", path.display());
                return ExitCode::FAILURE;
            }
            for set in &config.condition_sets {
                let criteria: usize = set.conditions.iter().map(|c| c.criteria.len()).sum();
                println!(
                    "ok: {} ({} conditions, {} criteria)",
                    set.id,
                    set.conditions.len(),
                    criteria
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn replay(set_path: &Path, scenario_path: &Path, expect: Option<&str>) -> ExitCode {
    let config = match load_config(set_path) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };
    let Some(definition) = config.condition_sets.into_iter().next() else {
        eprintln!("{}: no condition sets defined", set_path.display());
        return ExitCode::FAILURE;
    };

    let scenario = match std::fs::read_to_string(scenario_path)
        .map_err(|e| e.to_string())
        .and_then(|s| toml::from_str::<Scenario>(&s).map_err(|e| e.to_string()))
    {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("{}: {}", scenario_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut engine = match ConditionSetEngine::new(
        definition,
        Arc::new(NullProvider),
        EngineOptions::default(),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}: {}", set_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let start = chrono::Local::now().naive_local();
    print_state(0, engine.current_output());

    for sample in scenario.samples {
        let timestamp = start + Duration::milliseconds(sample.at_ms as i64);
        let mut inbound =
            TelemetrySample::new(sample.source, sample.field, sample.value, timestamp);
        inbound.valid = sample.valid;

        let before = engine.current_output().clone();
        engine.handle_sample(inbound);
        if *engine.current_output() != before {
            print_state(sample.at_ms, engine.current_output());
        }
    }

    let final_value = engine.current_output().value.to_string();
    println!("final: {final_value}");

    if let Some(expected) = expect {
        if final_value != expected {
            eprintln!("expected final output '{expected}', got '{final_value}'");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn report_error(error: &dyn std::error::Error) {
    eprintln!("error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn print_state(at_ms: u64, state: &OutputState) {
    let active = state.active_condition.as_deref().unwrap_or("-");
    if use_color() {
        // Green for a concrete value, yellow for blank/unavailable
        let code = if state.active_condition.is_some() { 32 } else { 33 };
        println!("[{at_ms:>8}ms] \x1b[{code}m{}\x1b[0m (active: {active})", state.value);
    } else {
        println!("[{at_ms:>8}ms] {} (active: {active})", state.value);
    }
}

fn use_color() -> bool {
    atty::is(atty::Stream::Stdout)
}
