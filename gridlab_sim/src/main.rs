//! GridLab Virtual Lab Simulator CLI
//!
//! Inject attacks into a simulated cyber-physical grid and report how the
//! detector and the grid health indicators respond.

use clap::Parser;
use gridlab_core::LabConfig;
use gridlab_env::AttackType;
use gridlab_sim::{load_lab_config, LabRunner, Observability, RunExport, RunResult, SimConfig, SimError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// GridLab Virtual Lab simulator
#[derive(Parser, Debug)]
#[command(name = "gridlab-sim")]
#[command(about = "Run attack-injection scenarios against a simulated grid", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Topology preset (ieee14, ieee30) or path to a topology JSON file
    #[arg(short, long, default_value = "ieee14")]
    topology: String,

    /// Attack type (RW, FDI, RS, BF, BD)
    #[arg(short, long, default_value = "FDI")]
    attack: String,

    /// Attack target node id (default depends on the attack)
    #[arg(long)]
    target: Option<String>,

    /// Detector observability (full, partial)
    #[arg(short, long, default_value = "full")]
    observability: String,

    /// Run every attack type at its default target
    #[arg(long)]
    all_attacks: bool,

    /// Lab configuration JSON (status thresholds, inference policy)
    #[arg(short, long)]
    config: Option<String>,

    /// Base detector latency in milliseconds (virtual time)
    #[arg(long, default_value = "500")]
    latency_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the finished run to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn usage_error(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(2);
}

fn parse_attack(code: &str) -> Result<AttackType, SimError> {
    code.parse().map_err(|_| SimError::UnknownAttack(code.to_string()))
}

fn report(result: &RunResult) {
    let m = &result.metrics;
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario, result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    info!(
        "  critical {} -> {} | warning {} -> {} | avg score {:.3} -> {:.3}",
        m.before.critical_count,
        m.after.critical_count,
        m.before.warning_count,
        m.after.warning_count,
        m.before.avg_anomaly_score,
        m.after.avg_anomaly_score
    );
    info!(
        "  security index {:.1}% ({:?}) | grid reliability {:.1}% ({:?}) | detection {:.1}%",
        m.after_health.security_index,
        m.after_health.security_band(),
        m.after_health.grid_reliability,
        m.after_health.reliability_band(),
        result.detection_rate()
    );
    if let Some(summary) = &result.view.inference {
        info!(
            "  inference: {:?} p={:.2} confidence={:.1}% in {:.1}ms",
            summary.classification,
            summary.probability,
            summary.confidence_score * 100.0,
            summary.inference_time_ms
        );
    }
    for step in &result.view.mitigations {
        info!("  → {}", step);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("GridLab Virtual Lab Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let attack = parse_attack(&args.attack).unwrap_or_else(|e| usage_error(e));
    let observability: Observability = args.observability.parse().unwrap_or_else(|e| usage_error(e));

    let lab_config = match &args.config {
        Some(path) => load_lab_config(path).unwrap_or_else(|e| usage_error(e)),
        None => LabConfig::default(),
    };

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let sim_config = SimConfig {
        seed,
        topology: args.topology.clone(),
        observability,
        attack,
        target: args.target.clone(),
        latency_ms: args.latency_ms,
        ..Default::default()
    };
    if let Err(e) = sim_config.validate() {
        usage_error(e);
    }

    if args.all_attacks && args.export.is_some() {
        usage_error("--export only supports a single attack, not --all-attacks");
    }

    let runner = LabRunner::new(sim_config, lab_config);
    let outcomes = if args.all_attacks {
        runner.run_all().await
    } else {
        vec![runner.run(runner.configured_scenario()).await]
    };

    let mut results: Vec<RunResult> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => {
                if !args.json {
                    report(&result);
                }
                results.push(result);
            }
            Err(e) => {
                error!("Run failed: {}", e);
                errors.push(e.to_string());
            }
        }
    }

    if let (Some(path), Some(result)) = (&args.export, results.first()) {
        let export = RunExport::from_result(result, &args.topology, observability.name());
        match export.write_to_file(path) {
            Ok(()) => info!("Exported run {} to {}", result.run_id, path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                errors.push(e.to_string());
            }
        }
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "errors": errors,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "runId": r.run_id,
                    "passed": r.passed,
                    "elapsedMs": r.elapsed_ms,
                    "detectionRate": r.detection_rate(),
                    "metrics": r.metrics,
                    "failureReason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 && errors.is_empty() {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed, {} errored", failed, total, errors.len());
        }
    }

    // Exit with proper code for CI
    if !errors.is_empty() || failed > 0 {
        std::process::exit(1);
    }
}
