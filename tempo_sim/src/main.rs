//! Tempo scenario CLI
//!
//! Run built-in scenarios in oracle or live mode, grade them, and export or
//! replay traces.

use clap::{Parser, ValueEnum};
use std::time::Duration;
use tempo_core::RunMode;
use tempo_sim::scenarios::ScenarioId;
use tempo_sim::{AgentChoice, ClockMode, ScenarioResult, ScenarioRunner, SimError, TraceExport};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
    Simulated,
    Wall,
}

/// Tempo event-graph scenario runner
#[derive(Parser, Debug)]
#[command(name = "tempo-sim")]
#[command(about = "Run and grade timed event-graph scenarios", long_about = None)]
struct Args {
    /// Base seed (0 derives one from the wall clock)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (kv_demo, email_calendar_series, timed_inbox, fault_isolation,
    /// email_calendar_manager, commitment_tracking, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// oracle: expected agent actions run automatically; live: the scripted agent acts
    #[arg(short, long, default_value = "oracle")]
    mode: RunMode,

    /// Run each scenario with this many consecutive seeds
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Override the scenario time budget, in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// simulated: time jumps between triggers; wall: waits really happen
    #[arg(long, value_enum, default_value = "simulated")]
    pacing: Pacing,

    /// Pacing speed (simulated seconds per wall second)
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Live mode without any agent
    #[arg(long)]
    no_agent: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Print a JSON summary instead of log lines
    #[arg(long)]
    json: bool,

    /// Export the run trace to a JSON file (single scenario only)
    #[arg(long)]
    export: Option<String>,

    /// Replay the agent actions of an exported trace in live mode
    #[arg(long)]
    replay: Option<String>,
}

fn build_runner(args: &Args, seed: u64) -> Result<ScenarioRunner, SimError> {
    let mut runner = ScenarioRunner::new(seed)?.with_mode(args.mode);

    if let Some(secs) = args.duration {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(SimError::Runtime(format!("duration must be positive, got {}", secs)));
        }
        runner = runner.with_duration(Duration::from_secs_f64(secs));
    }
    if args.pacing == Pacing::Wall {
        runner = runner.with_pacing(ClockMode::WallPaced { speed: args.speed });
    }

    if let Some(path) = &args.replay {
        let trace = TraceExport::read_from_file(path)?;
        info!("Replaying {} agent actions from {}", trace.agent_descriptors().len(), path);
        runner = runner
            .with_mode(RunMode::Live)
            .with_agent(AgentChoice::Replay(trace.agent_descriptors()));
    } else if args.no_agent {
        runner = runner.with_agent(AgentChoice::Absent);
    }

    Ok(runner)
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED: {}",
            result.scenario.name(),
            result.seed,
            result.rationale.as_deref().unwrap_or("ok")
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("tempo-sim {} | mode={} | seeds={}", env!("CARGO_PKG_VERSION"), args.mode, args.seeds);
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|id| id.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(2);
            }
        }
    };

    if (args.export.is_some() || args.replay.is_some()) && scenarios.len() > 1 {
        eprintln!("Error: --export and --replay only support a single scenario, not 'all'");
        std::process::exit(2);
    }

    // seed 0 picks one from the wall clock
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = match build_runner(&args, seed) {
            Ok(runner) => runner,
            Err(e) => {
                error!("Could not set up runner: {}", e);
                std::process::exit(2);
            }
        };

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    if let (Some(path), Some(result)) = (&args.export, all_results.last()) {
        match result.export.write_to_file(path) {
            Ok(()) => info!("Exported {} log entries to {}", result.export.entries.len(), path),
            Err(e) => warn!("Failed to write export: {}", e),
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "mode": r.export.mode,
                    "passed": r.passed,
                    "rationale": r.rationale,
                    "error": r.error,
                    "termination": r.report.as_ref().map(|rep| rep.termination),
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("---");
        if failed_count == 0 {
            info!("{}/{} scenario runs passed", passed, total);
        } else {
            error!("{}/{} scenario runs failed", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}
