//! ZeroDrift Simulator CLI
//!
//! Run deterministic check scenarios, export proof receipts, and verify
//! replay manifests.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zerodrift_core::{EngineConfig, ReplayManifest, ReplayVerdict, TopologyMode};
use zerodrift_env::EnvError;
use zerodrift_sim::scenarios::ScenarioId;
use zerodrift_sim::{export_session, DirectorySink, ScenarioResult, ScenarioRunner, SeedSchedule, Session, SimContext};

/// ZeroDrift deterministic lattice simulator
#[derive(Parser, Debug)]
#[command(name = "zerodrift-sim")]
#[command(about = "Run deterministic replay and energy checks for ZeroDrift", long_about = None)]
struct Args {
    /// Master seed [default: 1337]
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of lattice nodes [default: 64]
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Initial topology (chain, ring, grid) [default: chain]
    #[arg(short, long)]
    topology: Option<TopologyMode>,

    /// Steps per scenario
    #[arg(long, default_value = "300")]
    steps: u64,

    /// Scenario to run (canonical, replay, topology_swap, baseline_drift, grid_remainder, rewind, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of seeds to sweep (derived from the master seed)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Engine configuration file (JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a plain session and write proof receipt + replay manifest to this directory
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verify a replay manifest and exit
    #[arg(long)]
    verify: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.verify {
        return match verify_manifest(path, args.json).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!("Verification failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !args.json {
        info!("ZeroDrift Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "seed={} N={} topology={} hash={} tolerance={:e}",
            config.seed, config.nodes, config.mode, config.hash, config.energy_tolerance
        );
    }

    if let Some(dir) = &args.export {
        return match run_export(config, args.steps, dir).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!("Export failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                error!("{}", e);
                error!("Available scenarios: canonical, replay, topology_swap, baseline_drift, grid_remainder, rewind, all");
                return ExitCode::FAILURE;
            }
        }
    };

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    // Run scenarios
    for seed in SeedSchedule::new(config.seed).seeds(args.seeds) {
        let runner = ScenarioRunner::new(config.clone().with_seed(seed)).with_steps(args.steps);

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Config file (or defaults) with command-line overrides applied.
async fn load_config(args: &Args) -> Result<EngineConfig, EnvError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| EnvError::ContextError(format!("{}: {}", path.display(), e)))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(nodes) = args.nodes {
        config = config.with_nodes(nodes);
    }
    if let Some(mode) = args.topology {
        config = config.with_mode(mode);
    }
    config.validate()?;
    Ok(config)
}

/// Runs `steps` steps, verifies them by replay, and exports the receipts.
async fn run_export(config: EngineConfig, steps: u64, dir: &Path) -> Result<bool, EnvError> {
    let ctx = SimContext::shared(config.seed);
    let dt = std::time::Duration::from_secs_f64(config.dt.to_f64());
    let mut session = Session::new(config, ctx.clone())?;
    for _ in 0..steps {
        session.advance()?;
        ctx.advance_time(dt);
    }
    debug!("Ran {} steps, max |dH| = {:e}", steps, session.monitor().max_abs_delta().to_f64());

    let verdict = session.verify_live().await?;
    if !verdict.is_verified() {
        warn!("Not exporting: live run did not verify");
        return Ok(false);
    }

    let receipt = export_session(&mut session, &DirectorySink::new(dir)).await?;
    info!("Verify later with: zerodrift-sim --verify {}", receipt.replay_manifest);
    Ok(true)
}

/// Loads a manifest, replays it and reports the verdict.
async fn verify_manifest(path: &Path, json: bool) -> Result<bool, EnvError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EnvError::ContextError(format!("{}: {}", path.display(), e)))?;
    let manifest = ReplayManifest::from_json(&text)?;
    info!(
        "Replaying seed={} N={} to step {} ({} swaps)",
        manifest.seed,
        manifest.nodes,
        manifest.step,
        manifest.schedule.swaps().len()
    );

    let verdict = manifest.verify()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    }
    match &verdict {
        ReplayVerdict::Verified { step, tip } => info!("✓ Verified step {}: {}", step, tip),
        ReplayVerdict::Mismatch {
            step,
            expected,
            actual,
        } => error!("✗ Mismatch at step {}: recorded {} replayed {}", step, expected, actual),
    }
    Ok(verdict.is_verified())
}
