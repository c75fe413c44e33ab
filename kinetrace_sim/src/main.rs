//! kinetrace Simulator CLI
//!
//! Run kinematics replay scenarios against the reference engine.

use clap::Parser;
use kinetrace_core::DisplayConfig;
use kinetrace_sim::scenarios::ScenarioId;
use kinetrace_sim::{save_scene, ReplayExport, ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// kinetrace replay scenario CLI
#[derive(Parser, Debug)]
#[command(name = "kinetrace-sim")]
#[command(about = "Record, scrub and replay 2-D physics scenarios", long_about = None)]
struct Args {
    /// Master seed for generated scenes (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (free_fall, constant_force, projectile, spring, spin, rewind, scatter, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "2")]
    duration: f64,

    /// Engine timestep in seconds
    #[arg(short, long, default_value_t = 1.0 / 60.0)]
    timestep: f64,

    /// Decimal places of exported and charted values
    #[arg(long, default_value = "3")]
    decimals: u32,

    /// Mirror the world X axis
    #[arg(long)]
    mirror_x: bool,

    /// Mirror the world Y axis (world Y then points down, like the engine)
    #[arg(long)]
    mirror_y: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the recorded history to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Save the final scene document to a JSON file
    #[arg(long)]
    save_scene: Option<String>,
}

/// Runs one scenario and writes the requested files from its world.
fn run_with_files(runner: &ScenarioRunner, scenario: ScenarioId, args: &Args, seed: u64) -> ScenarioResult {
    let (result, world) = match runner.run_world(scenario) {
        Ok(done) => done,
        Err(e) => {
            error!("Scenario {} aborted: {}", scenario, e);
            return ScenarioResult::aborted(scenario, seed, &e);
        }
    };

    if let Some(path) = &args.export {
        match ReplayExport::from_session(scenario.name(), seed, world.session()) {
            Ok(mut export) => {
                export.finalize(result.passed, Some(result.metrics.max_error));
                if let Err(e) = export.write_to_file(path) {
                    error!("Failed to write export: {:?}", e);
                } else {
                    info!("Exported {} frames to {}", export.frames.len(), path);
                }
            }
            Err(e) => error!("Failed to build export: {}", e),
        }
    }

    if let Some(path) = &args.save_scene {
        if let Err(e) = save_scene(world.session(), path) {
            error!("Failed to save scene: {}", e);
        }
    }

    result
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("kinetrace Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: free_fall, constant_force, projectile, spring, spin, rewind, scatter, all");
            std::process::exit(1);
        })]
    };

    let writes_files = args.export.is_some() || args.save_scene.is_some();
    if writes_files && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export and --save-scene only support a single scenario and seed");
        std::process::exit(1);
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let display = DisplayConfig {
        decimals: args.decimals,
        ..Default::default()
    };

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let runner = ScenarioRunner::new(seed)
            .with_timestep(args.timestep)
            .with_duration(args.duration)
            .with_display(display)
            .with_mirror(args.mirror_x, args.mirror_y);

        for scenario in &scenarios {
            let result = if writes_files {
                run_with_files(&runner, *scenario, &args, seed)
            } else {
                runner.run(*scenario)
            };

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED | frames={} seeks={} max_error={:.2e}",
                        scenario.name(),
                        seed,
                        result.metrics.frames_recorded,
                        result.metrics.seeks,
                        result.metrics.max_error
                    );
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
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "objects": r.final_object_count,
                    "frames": r.metrics.frames_recorded,
                    "seeks": r.metrics.seeks,
                    "max_error": r.metrics.max_error,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
