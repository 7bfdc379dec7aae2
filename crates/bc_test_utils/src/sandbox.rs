//! Round-by-round scheduler over a [`GridWorld`].
//!
//! The sandbox owns one [`UnitContext`] per live unit and calls
//! [`controller::tick`] for each of them every round, in unit id order.
//! Units built during a round start ticking the round after. All
//! randomness comes from one seeded [`ChaCha8Rng`], so two sandboxes
//! built from the same world, configs and seed play out identically.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use bc_core::config::AgentConfig;
use bc_core::context::UnitContext;
use bc_core::controller::{self, TickReport};
use bc_core::world::{Team, UnitId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::grid_world::{team_index, GridWorld};

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 3407;

/// Counters for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Round number.
    pub round: u32,
    /// Units ticked.
    pub ticks: u32,
    /// Ticks that moved.
    pub moves: u32,
    /// Non-move actions issued.
    pub actions: u32,
    /// Ticks that faulted and were rolled back.
    pub faults: u32,
    /// Ticks that ran past their round.
    pub overruns: u32,
}

impl RoundStats {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.moves += u32::from(report.moved.is_some());
        self.actions += report.actions;
        self.faults += u32::from(report.fault.is_some());
        self.overruns += u32::from(report.overran);
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Rounds played.
    pub rounds: u32,
    /// Units ticked.
    pub ticks: u64,
    /// Ticks that moved.
    pub moves: u64,
    /// Non-move actions issued.
    pub actions: u64,
    /// Ticks that faulted.
    pub faults: u64,
    /// Ticks that ran past their round.
    pub overruns: u64,
    /// Reports of every faulting tick, oldest first.
    pub fault_reports: Vec<TickReport>,
}

impl MatchStats {
    fn absorb(&mut self, round: &RoundStats) {
        self.rounds = round.round;
        self.ticks += u64::from(round.ticks);
        self.moves += u64::from(round.moves);
        self.actions += u64::from(round.actions);
        self.faults += u64::from(round.faults);
        self.overruns += u64::from(round.overruns);
    }
}

/// A world plus the controllers playing on it.
pub struct Sandbox {
    world: GridWorld,
    contexts: BTreeMap<UnitId, UnitContext>,
    configs: [AgentConfig; 2],
    rng: ChaCha8Rng,
    stats: MatchStats,
}

impl Sandbox {
    /// Both teams use `config`, default seed.
    #[must_use]
    pub fn new(world: GridWorld, config: AgentConfig) -> Self {
        Self::with_configs(world, config.clone(), config, DEFAULT_SEED)
    }

    /// Both teams use `config`.
    #[must_use]
    pub fn with_seed(world: GridWorld, config: AgentConfig, seed: u64) -> Self {
        Self::with_configs(world, config.clone(), config, seed)
    }

    /// One config per team.
    #[must_use]
    pub fn with_configs(
        world: GridWorld,
        team_a: AgentConfig,
        team_b: AgentConfig,
        seed: u64,
    ) -> Self {
        Self {
            world,
            contexts: BTreeMap::new(),
            configs: [team_a, team_b],
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: MatchStats::default(),
        }
    }

    /// The world being played.
    #[must_use]
    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Mutable access for test setup between rounds.
    pub fn world_mut(&mut self) -> &mut GridWorld {
        &mut self.world
    }

    /// Controller state of a unit that has ticked at least once.
    #[must_use]
    pub fn context(&self, id: UnitId) -> Option<&UnitContext> {
        self.contexts.get(&id)
    }

    /// Totals so far.
    #[must_use]
    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    /// Config used by `team`.
    #[must_use]
    pub fn config(&self, team: Team) -> &AgentConfig {
        &self.configs[team_index(team)]
    }

    /// Play one round.
    pub fn step(&mut self) -> RoundStats {
        self.world.begin_round();
        let mut round = RoundStats {
            round: self.world.round(),
            ..RoundStats::default()
        };
        for id in self.world.unit_ids() {
            let Some(report) = self.tick_unit(id) else {
                continue;
            };
            round.record(&report);
            if report.fault.is_some() {
                self.stats.fault_reports.push(report);
            }
        }
        self.world.end_round();
        let world = &self.world;
        self.contexts.retain(|id, _| world.unit(*id).is_some());
        self.stats.absorb(&round);
        tracing::trace!(
            round = round.round,
            ticks = round.ticks,
            actions = round.actions,
            faults = round.faults,
            "round complete"
        );
        round
    }

    /// Play `rounds` rounds.
    pub fn run(&mut self, rounds: u32) -> &MatchStats {
        for _ in 0..rounds {
            self.step();
        }
        &self.stats
    }

    /// Tick one unit in the current round, creating its context on first
    /// use. `None` when the unit no longer exists.
    pub fn tick_unit(&mut self, id: UnitId) -> Option<TickReport> {
        let (team, unit_type) = {
            let unit = self.world.unit(id)?;
            (unit.team, unit.unit_type)
        };
        let config = &self.configs[team_index(team)];
        let ctx = self
            .contexts
            .entry(id)
            .or_insert_with(|| UnitContext::new(id, unit_type.archetype(), config.clone()));
        let mut view = self.world.view(id)?;
        Some(controller::tick(ctx, &mut view, &mut self.rng))
    }

    /// Hash of the world together with every controller's state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.state_hash().hash(&mut hasher);
        match bincode::serialize(&self.contexts) {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => tracing::warn!(%err, "context snapshot failed"),
        }
        hasher.finish()
    }
}
