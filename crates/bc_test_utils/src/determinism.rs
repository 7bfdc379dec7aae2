//! Determinism testing utilities.
//!
//! Provides a harness for verifying that sandbox matches produce identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Controllers carry seeded randomness for tie-breaks, so a match is a pure
//! function of the map, the team configs and the seed. Sources of
//! non-determinism to guard against:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Units, contexts and pattern sets live in ordered maps.
//!
//! - **System randomness**: every random choice draws from the sandbox's
//!   seeded `ChaCha8Rng`.
//!
//! - **Thread scheduling**: the parallel helpers run whole matches per
//!   thread and compare the final hashes.

use std::thread;

use crate::sandbox::Sandbox;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of rounds simulated.
    pub rounds: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic match).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the match was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Rounds: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.rounds,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel match runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each match.
    pub hashes: Vec<u64>,
    /// Number of rounds each match ran.
    pub rounds: u32,
    /// Number of matches run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all matches produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all matches agreed.
    ///
    /// # Panics
    ///
    /// Panics if matches produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel matches diverged!\n\
                 Matches: {}\n\
                 Rounds: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.rounds,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `rounds` - Number of rounds to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance by one round
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use bc_test_utils::determinism::verify_determinism;
/// use bc_test_utils::{fixtures, Sandbox};
///
/// let result = verify_determinism(
///     3,
///     100,
///     || Sandbox::new(fixtures::standard_match(), AgentConfig::default()),
///     |sandbox| { sandbox.step(); },
///     Sandbox::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    rounds: u32,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..rounds {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        rounds,
    }
}

/// Play the same sandbox twice and compare final hashes.
pub fn verify_sandbox_determinism<F>(setup_fn: F, rounds: u32) -> bool
where
    F: Fn() -> Sandbox,
{
    verify_determinism(
        2,
        rounds,
        &setup_fn,
        |sandbox| {
            sandbox.step();
        },
        Sandbox::state_hash,
    )
    .is_deterministic
}

/// Run N matches on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// variations or different memory layouts.
///
/// # Panics
///
/// Panics if a match thread panicked.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    rounds: u32,
) -> ParallelSimResult
where
    F: Fn() -> Sandbox + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sandbox = setup_fn();
                    sandbox.run(rounds);
                    sandbox.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| panic!("match thread panicked")))
            .collect()
    });

    ParallelSimResult {
        hashes,
        rounds,
        num_sims,
    }
}

/// Compare two runs round by round, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(round)` for the first round
/// after which the hashes differ (0 for the initial state).
pub fn find_first_divergence<F>(setup_fn: F, rounds: u32) -> Option<u32>
where
    F: Fn() -> Sandbox,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for round in 1..=rounds {
        first.step();
        second.step();

        if first.state_hash() != second.state_hash() {
            return Some(round);
        }
    }

    None
}

/// Proptest strategies for controller inputs.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of navigation, codecs and matches.
pub mod strategies {
    use bc_core::comms::{RoleCommand, TileReport, UnitReport};
    use bc_core::geometry::{Direction, MapLocation};
    use bc_core::world::{PaintType, Team, TowerKind, UnitType};
    use proptest::prelude::*;

    /// Largest coordinate the message codec accepts.
    pub const MAX_COORD: i32 = 63;

    /// Location on a `width` x `height` map.
    pub fn arb_location(width: i32, height: i32) -> impl Strategy<Value = MapLocation> {
        (0..width, 0..height).prop_map(|(x, y)| MapLocation::new(x, y))
    }

    /// Any codec-representable location.
    pub fn arb_codec_location() -> impl Strategy<Value = MapLocation> {
        arb_location(MAX_COORD + 1, MAX_COORD + 1)
    }

    /// One of the eight compass directions.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        proptest::sample::select(Direction::ALL.to_vec())
    }

    /// Any paint value.
    pub fn arb_paint() -> impl Strategy<Value = PaintType> {
        prop_oneof![
            Just(PaintType::Empty),
            Just(PaintType::AllyPrimary),
            Just(PaintType::AllySecondary),
            Just(PaintType::EnemyPrimary),
            Just(PaintType::EnemySecondary),
        ]
    }

    /// Any unit type.
    pub fn arb_unit_type() -> impl Strategy<Value = UnitType> {
        prop_oneof![
            Just(UnitType::Soldier),
            Just(UnitType::Mopper),
            Just(UnitType::Splasher),
            Just(UnitType::Tower(TowerKind::Paint)),
            Just(UnitType::Tower(TowerKind::Money)),
            Just(UnitType::Tower(TowerKind::Defense)),
        ]
    }

    /// Any role command.
    pub fn arb_role_command() -> impl Strategy<Value = RoleCommand> {
        prop_oneof![
            Just(RoleCommand::Develop),
            Just(RoleCommand::Advance),
            Just(RoleCommand::Attack),
            Just(RoleCommand::Mopper),
            Just(RoleCommand::Splasher),
        ]
    }

    /// A tile report with codec-representable fields.
    pub fn arb_tile_report() -> impl Strategy<Value = TileReport> {
        (arb_codec_location(), arb_paint(), arb_paint(), any::<[bool; 3]>()).prop_map(
            |(location, paint, mark, [passable, wall, ruin])| TileReport {
                location,
                paint,
                mark,
                passable,
                wall,
                ruin,
            },
        )
    }

    /// A unit report with codec-representable fields.
    pub fn arb_unit_report() -> impl Strategy<Value = UnitReport> {
        (
            arb_codec_location(),
            arb_unit_type(),
            prop_oneof![Just(Team::A), Just(Team::B)],
            0u8..=100,
            0u8..=100,
        )
            .prop_map(|(location, unit_type, team, health_percent, paint_percent)| UnitReport {
                location,
                unit_type,
                team,
                health_percent,
                paint_percent,
            })
    }

    /// Open-map navigation problem: `(width, height, start, target)`.
    pub fn arb_open_trip() -> impl Strategy<Value = (i32, i32, MapLocation, MapLocation)> {
        (8..40i32, 8..40i32).prop_flat_map(|(width, height)| {
            (
                Just(width),
                Just(height),
                arb_location(width, height),
                arb_location(width, height),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use bc_core::config::AgentConfig;

    use super::*;
    use crate::fixtures;

    fn standard_sandbox() -> Sandbox {
        Sandbox::new(fixtures::standard_match(), AgentConfig::default())
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |x| *x += 1, |x| *x);
        assert!(result.is_deterministic);
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_nondeterminism_is_reported() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |x| *x,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_empty_map_determinism() {
        assert!(verify_sandbox_determinism(
            || Sandbox::new(fixtures::open_map(10, 10), AgentConfig::default()),
            20,
        ));
    }

    #[test]
    fn test_standard_match_determinism() {
        assert!(verify_sandbox_determinism(standard_sandbox, 60));
    }

    #[test]
    fn test_find_divergence_on_deterministic_match() {
        assert_eq!(find_first_divergence(standard_sandbox, 30), None);
    }

    #[test]
    fn test_parallel_matches_agree() {
        run_parallel_simulations_scoped(standard_sandbox, 4, 40).assert_deterministic();
    }

    #[test]
    fn test_same_seed_same_hash() {
        let hash = |seed| {
            let mut sandbox =
                Sandbox::with_seed(fixtures::standard_match(), AgentConfig::default(), seed);
            sandbox.run(1);
            sandbox.state_hash()
        };
        assert_eq!(hash(7), hash(7));
    }
}
