//! Headless match runner.
//!
//! Plays controller-vs-controller matches on the in-memory grid world.
//! Designed for CI, threshold sweeps and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # One match of the standard preset, metrics to a file
//! cargo run -p bc_headless -- run --output match.json
//!
//! # Batch over 200 seeds
//! cargo run -p bc_headless -- batch --scenario small --count 200 --output results/
//!
//! # Determinism check
//! cargo run -p bc_headless -- verify --scenario standard --seed 7 --runs 3
//! ```
//!
//! Logs go to stderr. `RUST_LOG` overrides `--verbose` when set.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bc_core::config::AgentConfig;
use bc_headless::{
    batch::{run_batch, run_match, verify_determinism, BatchConfig},
    scenario::Scenario,
    MatchMetrics,
};

#[derive(Parser)]
#[command(name = "bc_headless")]
#[command(about = "Headless match runner for controller testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single match
    Run {
        /// Scenario file or preset name
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed (defaults to the scenario's)
        #[arg(long)]
        seed: Option<u64>,

        /// Rounds to play (defaults to the scenario's)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Controller config (RON) applied to both teams
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write match metrics as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play a batch of matches over consecutive seeds
    Batch {
        /// Scenario file or preset name
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Number of matches to play
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Controller config (RON) applied to both teams
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Verify determinism by replaying one seed
    Verify {
        /// Scenario file or preset name
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed to replay
        #[arg(long, default_value = "3407")]
        seed: u64,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs on stderr, stdout stays free for piping metrics
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            rounds,
            config,
            output,
        }) => {
            cmd_run(&scenario, seed, rounds, config.as_deref(), output.as_deref());
        }
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            config,
        }) => {
            cmd_batch(&scenario, count, parallel, output, seed, config.as_deref());
        }
        Some(Commands::Verify { scenario, seed, runs }) => {
            cmd_verify(&scenario, seed, runs);
        }
        None => {
            cmd_run("standard", None, None, None, None);
        }
    }
}

/// Print `message` and exit with status 1.
fn fatal(message: impl std::fmt::Display) -> ! {
    tracing::error!("{message}");
    eprintln!("FATAL: {message}");
    std::process::exit(1);
}

fn load_scenario(name: &str, config: Option<&Path>) -> Scenario {
    let scenario = Scenario::resolve(name).unwrap_or_else(|e| fatal(e));
    match config {
        Some(path) => {
            let config = AgentConfig::load(path)
                .unwrap_or_else(|e| fatal(format!("{}: {e}", path.display())));
            scenario.with_config(config)
        }
        None => scenario,
    }
}

fn print_match(metrics: &MatchMetrics) {
    eprintln!("Scenario: {} (seed {})", metrics.scenario, metrics.seed);
    eprintln!(
        "Rounds: {}  Ticks: {}  Moves: {}  Actions: {}",
        metrics.rounds, metrics.ticks, metrics.moves, metrics.actions
    );
    for team in [&metrics.team_a, &metrics.team_b] {
        eprintln!(
            "  Team {:?}: {} painted, {} towers, {} units, {} patterns, {} money",
            team.team,
            team.painted_tiles,
            team.towers,
            team.units,
            team.resource_patterns,
            team.money
        );
    }
    match metrics.paint_leader() {
        Some(team) => eprintln!("Paint leader: Team {team:?}"),
        None => eprintln!("Paint leader: tie"),
    }
    if !metrics.is_clean() {
        eprintln!(
            "WARNING: {} faults, {} overruns, {} refused actions",
            metrics.faults, metrics.overruns, metrics.violations
        );
        if let Some(fault) = &metrics.first_fault {
            eprintln!("  First fault: {fault}");
        }
    }
    eprintln!("State hash: {:016x}", metrics.final_state_hash);
}

/// Play a single match
fn cmd_run(
    scenario: &str,
    seed: Option<u64>,
    rounds: Option<u32>,
    config: Option<&Path>,
    output: Option<&Path>,
) {
    let mut scenario = load_scenario(scenario, config);
    if let Some(rounds) = rounds {
        scenario.rounds = rounds;
    }
    let seed = seed.unwrap_or(scenario.seed);
    tracing::info!(scenario = %scenario.name, seed, rounds = scenario.rounds, "Starting match");

    let metrics = run_match(&scenario, seed).unwrap_or_else(|e| fatal(e));
    print_match(&metrics);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&metrics).unwrap_or_else(|e| fatal(e));
        if let Err(e) = std::fs::write(path, json) {
            fatal(format!("Failed to write {}: {e}", path.display()));
        }
        tracing::info!(path = %path.display(), "Metrics written");
    }
}

/// Play a batch of matches
fn cmd_batch(
    scenario: &str,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    config: Option<&Path>,
) {
    let scenario = load_scenario(scenario, config);
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario.name,
        count,
        parallel,
        seed,
        output = %output.display(),
        cpus_available = num_cpus,
        rounds = scenario.rounds,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        fatal(format!("Cannot create output directory '{}': {e}", output.display()));
    }

    let config = BatchConfig::new(count)
        .with_output(output.clone())
        .with_seed(seed)
        .with_parallel(parallel);
    let results = run_batch(&scenario, &config).unwrap_or_else(|e| fatal(e));

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        fatal(format!("Failed to save results: {e}"));
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches played: {}", summary.matches);
    eprintln!(
        "Paint leads: A {} / B {} / tie {} (A rate {:.1}%)",
        summary.team_a_leads,
        summary.team_b_leads,
        summary.ties,
        summary.team_a_lead_rate() * 100.0
    );
    eprintln!("Avg painted: A {:.1} / B {:.1}", summary.avg_painted_a, summary.avg_painted_b);
    eprintln!("Avg towers:  A {:.2} / B {:.2}", summary.avg_towers_a, summary.avg_towers_b);
    eprintln!(
        "Faults: {}  Overruns: {}  Refused actions: {}",
        summary.total_faults, summary.total_overruns, summary.total_violations
    );
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Results: {}", results_path.display());
}

/// Check that a seed replays identically
fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario, None);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    let result = verify_determinism(&scenario, seed, runs).unwrap_or_else(|e| fatal(e));

    if result.is_deterministic {
        eprintln!(
            "PASS: All {} runs produced identical results ({:016x})",
            result.hashes.len(),
            result.hashes.first().copied().unwrap_or_default()
        );
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        eprintln!("  Unique hashes: {:?}", result.unique_hashes());
        std::process::exit(1);
    }
}
