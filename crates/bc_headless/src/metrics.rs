//! Match metrics collection.
//!
//! One [`MatchMetrics`] per played match, built from the sandbox's
//! counters and the final world, and a [`BatchSummary`] over many.

use bc_core::world::Team;
use bc_test_utils::Sandbox;
use serde::{Deserialize, Serialize};

/// Final standing of one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Team measured.
    pub team: Team,
    /// Tiles carrying the team's paint.
    pub painted_tiles: usize,
    /// Towers standing.
    pub towers: usize,
    /// Live units, towers included.
    pub units: usize,
    /// Completed resource patterns.
    pub resource_patterns: usize,
    /// Money at the end.
    pub money: i32,
}

impl TeamMetrics {
    fn measure(sandbox: &Sandbox, team: Team) -> Self {
        let world = sandbox.world();
        Self {
            team,
            painted_tiles: world.painted_count(team),
            towers: world.tower_count(team),
            units: world.units().filter(|unit| unit.team == team).count(),
            resource_patterns: world.resource_pattern_count(team),
            money: world.money(team),
        }
    }
}

/// Complete metrics for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Rounds played.
    pub rounds: u32,
    /// Unit ticks.
    pub ticks: u64,
    /// Ticks that moved.
    pub moves: u64,
    /// Non-move actions.
    pub actions: u64,
    /// Ticks rolled back after an error.
    pub faults: u64,
    /// Ticks that overran their round.
    pub overruns: u64,
    /// Illegal actions the world refused.
    pub violations: usize,
    /// First fault message, if any.
    pub first_fault: Option<String>,
    /// Team A standing.
    pub team_a: TeamMetrics,
    /// Team B standing.
    pub team_b: TeamMetrics,
    /// Final state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl MatchMetrics {
    /// Snapshot a finished sandbox.
    #[must_use]
    pub fn collect(scenario: &str, seed: u64, sandbox: &Sandbox) -> Self {
        let stats = sandbox.stats();
        Self {
            scenario: scenario.to_string(),
            seed,
            rounds: stats.rounds,
            ticks: stats.ticks,
            moves: stats.moves,
            actions: stats.actions,
            faults: stats.faults,
            overruns: stats.overruns,
            violations: sandbox.world().violations().len(),
            first_fault: stats.fault_reports.iter().find_map(|report| report.fault.clone()),
            team_a: TeamMetrics::measure(sandbox, Team::A),
            team_b: TeamMetrics::measure(sandbox, Team::B),
            final_state_hash: sandbox.state_hash(),
        }
    }

    /// Team with more painted tiles, `None` on a tie.
    #[must_use]
    pub fn paint_leader(&self) -> Option<Team> {
        match self.team_a.painted_tiles.cmp(&self.team_b.painted_tiles) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// No faults, overruns or refused actions.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.faults == 0 && self.overruns == 0 && self.violations == 0
    }
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Matches summarised.
    pub matches: usize,
    /// Matches team A led on paint.
    pub team_a_leads: usize,
    /// Matches team B led on paint.
    pub team_b_leads: usize,
    /// Matches tied on paint.
    pub ties: usize,
    /// Mean painted tiles of team A.
    pub avg_painted_a: f64,
    /// Mean painted tiles of team B.
    pub avg_painted_b: f64,
    /// Mean towers of team A.
    pub avg_towers_a: f64,
    /// Mean towers of team B.
    pub avg_towers_b: f64,
    /// Faults over all matches.
    pub total_faults: u64,
    /// Overruns over all matches.
    pub total_overruns: u64,
    /// Refused actions over all matches.
    pub total_violations: usize,
}

impl BatchSummary {
    /// Summarise `games`.
    #[must_use]
    pub fn from_matches(games: &[MatchMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let n = games.len() as f64;
        let mean = |f: fn(&MatchMetrics) -> usize| games.iter().map(f).sum::<usize>() as f64 / n;

        let mut summary = Self {
            matches: games.len(),
            avg_painted_a: mean(|m| m.team_a.painted_tiles),
            avg_painted_b: mean(|m| m.team_b.painted_tiles),
            avg_towers_a: mean(|m| m.team_a.towers),
            avg_towers_b: mean(|m| m.team_b.towers),
            ..Self::default()
        };
        for game in games {
            match game.paint_leader() {
                Some(Team::A) => summary.team_a_leads += 1,
                Some(Team::B) => summary.team_b_leads += 1,
                None => summary.ties += 1,
            }
            summary.total_faults += game.faults;
            summary.total_overruns += game.overruns;
            summary.total_violations += game.violations;
        }
        summary
    }

    /// Share of matches team A led, in `[0, 1]`.
    #[must_use]
    pub fn team_a_lead_rate(&self) -> f64 {
        if self.matches == 0 {
            0.0
        } else {
            self.team_a_leads as f64 / self.matches as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use bc_core::config::AgentConfig;
    use bc_test_utils::fixtures;

    use super::*;

    fn played(rounds: u32) -> MatchMetrics {
        let mut sandbox = Sandbox::new(fixtures::standard_match(), AgentConfig::default());
        sandbox.run(rounds);
        MatchMetrics::collect("standard", 3407, &sandbox)
    }

    fn with_paint(a: usize, b: usize) -> MatchMetrics {
        let mut game = played(0);
        game.team_a.painted_tiles = a;
        game.team_b.painted_tiles = b;
        game
    }

    #[test]
    fn test_collect_reads_the_world() {
        let game = played(20);
        assert_eq!(game.rounds, 20);
        assert!(game.team_a.towers >= 1);
        assert!(game.team_b.towers >= 1);
        assert!(game.team_a.units > 1, "tower spawned");
        assert!(game.is_clean(), "{game:?}");
    }

    #[test]
    fn test_paint_leader() {
        assert_eq!(with_paint(5, 3).paint_leader(), Some(Team::A));
        assert_eq!(with_paint(2, 3).paint_leader(), Some(Team::B));
        assert_eq!(with_paint(4, 4).paint_leader(), None);
    }

    #[test]
    fn test_summary_counts_leads() {
        let games = vec![with_paint(5, 3), with_paint(6, 3), with_paint(1, 3), with_paint(2, 2)];
        let summary = BatchSummary::from_matches(&games);
        assert_eq!(summary.matches, 4);
        assert_eq!(summary.team_a_leads, 2);
        assert_eq!(summary.team_b_leads, 1);
        assert_eq!(summary.ties, 1);
        assert!((summary.avg_painted_a - 3.5).abs() < f64::EPSILON);
        assert!((summary.team_a_lead_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_matches(&[]);
        assert_eq!(summary.matches, 0);
        assert_eq!(summary.team_a_lead_rate(), 0.0);
    }
}
