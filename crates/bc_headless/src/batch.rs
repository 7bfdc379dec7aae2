//! Batch match runner.
//!
//! Plays one scenario over a range of seeds in parallel using rayon, and
//! checks determinism by replaying a seed several times.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bc_test_utils::determinism::{self, DeterminismResult};
use bc_test_utils::Sandbox;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{BatchSummary, MatchMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of matches to play.
    pub game_count: u32,
    /// Worker threads (0 = rayon default).
    pub parallel_games: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// Seed of the first match; match `i` uses `seed_start + i`.
    pub seed_start: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
        }
    }
}

impl BatchConfig {
    /// Play `game_count` matches.
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the worker count.
    pub fn with_parallel(mut self, threads: u32) -> Self {
        self.parallel_games = threads;
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario played.
    pub scenario: Scenario,
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual match metrics, in seed order.
    pub games: Vec<MatchMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Play one match of `scenario` with `seed`.
pub fn run_match(scenario: &Scenario, seed: u64) -> Result<MatchMetrics, ScenarioError> {
    let mut sandbox = scenario.sandbox(seed)?;
    sandbox.run(scenario.rounds);
    let metrics = MatchMetrics::collect(&scenario.name, seed, &sandbox);
    if !metrics.is_clean() {
        warn!(
            seed,
            faults = metrics.faults,
            overruns = metrics.overruns,
            violations = metrics.violations,
            "match was not clean"
        );
    }
    Ok(metrics)
}

/// Play `config.game_count` matches over consecutive seeds.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    // Fail once up front rather than once per seed.
    scenario.map.build()?;

    info!(
        scenario = %scenario.name,
        games = config.game_count,
        seed_start = config.seed_start,
        "Starting batch run"
    );

    let play = || -> Result<Vec<MatchMetrics>, ScenarioError> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let metrics = run_match(scenario, seed)?;
                debug!(
                    seed,
                    painted_a = metrics.team_a.painted_tiles,
                    painted_b = metrics.team_b.painted_tiles,
                    "match done"
                );
                Ok(metrics)
            })
            .collect()
    };

    let games = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(play)?,
            Err(err) => {
                warn!(%err, "Could not build thread pool, using the global one");
                play()?
            }
        }
    } else {
        play()?
    };

    let summary = BatchSummary::from_matches(&games);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        games = games.len(),
        team_a_leads = summary.team_a_leads,
        team_b_leads = summary.team_b_leads,
        faults = summary.total_faults,
        duration_secs = format!("{duration_seconds:.1}"),
        "Batch finished"
    );

    Ok(BatchResults {
        scenario: scenario.clone(),
        config: config.clone(),
        games,
        summary,
        duration_seconds,
    })
}

/// Replay `scenario` with `seed` `runs` times and compare final hashes.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
) -> Result<DeterminismResult, ScenarioError> {
    let world = scenario.map.build()?;
    let setup = || {
        Sandbox::with_configs(
            world.clone(),
            scenario.team_a.clone(),
            scenario.team_b.clone(),
            seed,
        )
    };
    let result = determinism::verify_determinism(
        runs.max(2) as usize,
        scenario.rounds,
        &setup,
        |sandbox| {
            sandbox.step();
        },
        Sandbox::state_hash,
    );
    if !result.is_deterministic {
        if let Some(round) = determinism::find_first_divergence(&setup, scenario.rounds) {
            warn!(round, "Runs diverged");
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::scenario::MapSpec;

    use super::*;

    fn quick() -> Scenario {
        Scenario {
            name: "quick".to_string(),
            map: MapSpec::TwoTowers(16),
            rounds: 15,
            ..Scenario::default()
        }
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_parallel(2);

        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.parallel_games, 2);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new(4).with_seed(10).with_parallel(2);
        let results = run_batch(&quick(), &config).expect("batch");
        assert_eq!(results.games.len(), 4);
        let seeds: Vec<u64> = results.games.iter().map(|game| game.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
        assert_eq!(results.summary.matches, 4);
        assert!(results.games.iter().all(|game| game.rounds == 15));
    }

    #[test]
    fn test_batch_matches_single_runs() {
        let scenario = quick();
        let results = run_batch(&scenario, &BatchConfig::new(2).with_seed(7)).expect("batch");
        let single = run_match(&scenario, 8).expect("match");
        assert_eq!(results.games[1], single);
    }

    #[test]
    fn test_empty_map_fails_before_playing() {
        let scenario = Scenario {
            map: MapSpec::Ascii(String::new()),
            ..quick()
        };
        assert!(matches!(
            run_batch(&scenario, &BatchConfig::new(3)),
            Err(ScenarioError::EmptyMap)
        ));
    }

    #[test]
    fn test_results_round_trip_through_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("batch_results.json");
        let results = run_batch(&quick(), &BatchConfig::new(2)).expect("batch");

        results.save(&path).expect("save");
        let loaded = BatchResults::load(&path).expect("load");
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.summary.matches, 2);
    }

    #[test]
    fn test_verify_determinism() {
        let result = verify_determinism(&quick(), 3407, 3).expect("verify");
        assert!(result.is_deterministic);
        assert_eq!(result.hashes.len(), 3);
    }
}
