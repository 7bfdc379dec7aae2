//! Layered single-step pathfinding.
//!
//! [`Navigator::pathfind`] never plans a whole route. Each call looks only at
//! the eight neighbours of the unit and a few cells straight ahead, and
//! returns at most one direction. Persistent per-unit counters choose between
//! three strategies:
//!
//! 1. **Greedy**: step to the movable neighbour closest to the target, with
//!    paint ownership and recent visits as tie-breaks.
//! 2. **Wall probe**: after `stall_limit` calls without strict progress, look
//!    a few cells along the target vector for a wall and pick the first
//!    passable cell beyond it as the cross-point.
//! 3. **Tracing**: follow the obstacle boundary toward the cross-point until
//!    it is reached, the closest-approach cell is revisited, or the step
//!    bound `2 * (width + height)` runs out.
//!
//! The exploration helpers in [`explore`] build on top of `pathfind`.

pub mod explore;
mod greedy;
mod trace;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::geometry::{Direction, MapLocation};
use crate::world::WorldQuery;

pub use explore::WanderState;
use trace::{Trace, TraceOutcome};

/// Fixed-capacity ring of recently occupied cells, oldest evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentVisits {
    cells: VecDeque<MapLocation>,
    capacity: usize,
}

impl RecentVisits {
    /// Create an empty ring holding at most `capacity` cells.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Remember a cell, evicting the oldest when full.
    pub fn record(&mut self, loc: MapLocation) {
        if self.cells.len() == self.capacity {
            self.cells.pop_front();
        }
        self.cells.push_back(loc);
    }

    /// Whether `loc` is among the remembered cells.
    #[must_use]
    pub fn contains(&self, loc: MapLocation) -> bool {
        self.cells.contains(&loc)
    }

    /// Number of remembered cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Which strategy the next `pathfind` call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavPhase {
    /// Greedy neighbour selection.
    #[default]
    Greedy,
    /// Obstacle tracing toward a cross-point.
    Tracing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Phase {
    Greedy {
        best_distance: Option<i32>,
        stalls: u32,
    },
    Tracing {
        cross_point: MapLocation,
        trace: Option<Trace>,
    },
}

impl Default for Phase {
    fn default() -> Self {
        Self::Greedy {
            best_distance: None,
            stalls: 0,
        }
    }
}

/// Navigation limits copied out of [`AgentConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavSettings {
    /// Non-improving greedy calls before escalation.
    pub stall_limit: u32,
    /// Cells probed for a wall on escalation.
    pub wall_probe_depth: i32,
    /// Probability that an unstick step is a random walk.
    pub random_step_probability: f64,
    /// Frontier score that drops a provisional explore target.
    pub explore_break_score: i32,
    /// Corner target reached radius.
    pub corner_reached_distance_sq: i32,
    /// Rounds after which a corner target is recomputed.
    pub corner_refresh_rounds: u32,
}

impl From<&AgentConfig> for NavSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            stall_limit: config.stall_limit,
            wall_probe_depth: config.wall_probe_depth,
            random_step_probability: config.random_step_probability,
            explore_break_score: config.explore_break_score,
            corner_reached_distance_sq: config.corner_reached_distance_sq,
            corner_refresh_rounds: config.corner_refresh_rounds,
        }
    }
}

/// Per-unit navigation memory and the strategies that use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navigator {
    settings: NavSettings,
    goal: Option<MapLocation>,
    phase: Phase,
    recent: RecentVisits,
    wander: WanderState,
}

impl Navigator {
    /// Create a navigator with fresh memory.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            settings: NavSettings::from(config),
            goal: None,
            phase: Phase::default(),
            recent: RecentVisits::new(config.recent_capacity),
            wander: WanderState::default(),
        }
    }

    /// Current strategy.
    #[must_use]
    pub fn phase(&self) -> NavPhase {
        match self.phase {
            Phase::Greedy { .. } => NavPhase::Greedy,
            Phase::Tracing { .. } => NavPhase::Tracing,
        }
    }

    /// Consecutive greedy calls without strict progress.
    #[must_use]
    pub fn stall_count(&self) -> u32 {
        match self.phase {
            Phase::Greedy { stalls, .. } => stalls,
            Phase::Tracing { .. } => 0,
        }
    }

    /// Aim point of the active trace, if tracing.
    #[must_use]
    pub fn cross_point(&self) -> Option<MapLocation> {
        match self.phase {
            Phase::Greedy { .. } => None,
            Phase::Tracing { cross_point, .. } => Some(cross_point),
        }
    }

    /// Target of the current navigation attempt.
    #[must_use]
    pub fn goal(&self) -> Option<MapLocation> {
        self.goal
    }

    /// Recently occupied cells.
    #[must_use]
    pub fn recent(&self) -> &RecentVisits {
        &self.recent
    }

    /// Exploration targets that survive [`Navigator::reset`].
    #[must_use]
    pub fn wander(&self) -> &WanderState {
        &self.wander
    }

    /// Record the cell the unit ended its tick on.
    pub fn record_visit(&mut self, loc: MapLocation) {
        self.recent.record(loc);
    }

    /// Abandon the current navigation attempt.
    ///
    /// Clears the goal, the greedy counters, the trace, the cross-point and
    /// the recent-visit ring, so the next call behaves exactly like the first
    /// call of a freshly spawned unit. Only the wander targets survive.
    pub fn reset(&mut self) {
        self.goal = None;
        self.phase = Phase::default();
        self.recent.clear();
    }

    /// Choose one step toward `target`, or `None` when no progress is possible.
    pub fn pathfind<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        target: MapLocation,
    ) -> Option<Direction> {
        let current = world.current_location();
        if current == target {
            self.reset();
            return None;
        }
        if self.goal != Some(target) {
            self.restart(target);
        }

        if let Phase::Greedy {
            best_distance,
            stalls,
        } = &mut self.phase
        {
            if *stalls < self.settings.stall_limit {
                let distance = current.distance_squared_to(target);
                match *best_distance {
                    Some(best) if distance < best => {
                        *best_distance = Some(distance);
                        *stalls = 0;
                    }
                    Some(_) => *stalls += 1,
                    None => *best_distance = Some(distance),
                }
                return greedy::step(world, target, &self.recent);
            }

            let cross_point =
                greedy::probe_cross_point(world, target, self.settings.wall_probe_depth);
            tracing::debug!(
                from = %current,
                target = %target,
                cross_point = %cross_point,
                "greedy stalled, tracing obstacle"
            );
            self.phase = Phase::Tracing {
                cross_point,
                trace: None,
            };
        }

        let Phase::Tracing { cross_point, trace } = &mut self.phase else {
            return None;
        };
        if current == *cross_point {
            self.restart(target);
            return self.pathfind(world, target);
        }
        match trace::step(world, trace, *cross_point) {
            TraceOutcome::Step(dir) => Some(dir),
            TraceOutcome::Finished => {
                tracing::debug!(at = %current, "trace finished, back to greedy");
                self.restart(target);
                self.pathfind(world, target)
            }
            TraceOutcome::Blocked => greedy::fallback(world, &self.recent),
        }
    }

    /// Step toward `target`, favouring ally-painted cells so a unit with
    /// almost no paint loses none on the way.
    pub fn painted_step<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        target: MapLocation,
    ) -> Option<Direction> {
        let current = world.current_location();
        let toward = current.direction_to(target);
        if toward == Direction::Center {
            return None;
        }
        let on_ally = |dir: Direction| {
            world.can_move(dir)
                && world
                    .sense_tile(current.add(dir))
                    .is_some_and(|tile| tile.paint.is_ally())
        };
        for dir in [toward, toward.rotate_left(), toward.rotate_right()] {
            if on_ally(dir) {
                return Some(dir);
            }
        }
        Direction::ALL
            .into_iter()
            .find(|&dir| on_ally(dir) && !self.recent.contains(current.add(dir)))
            .or_else(|| greedy::fallback(world, &self.recent))
    }

    /// Start a new attempt toward `target` within the same walk. The
    /// recent-visit ring is kept so a retargeted unit still avoids the cells
    /// it just left.
    fn restart(&mut self, target: MapLocation) {
        self.phase = Phase::default();
        self.goal = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_visits_evicts_oldest() {
        let mut recent = RecentVisits::new(3);
        for x in 0..4 {
            recent.record(MapLocation::new(x, 0));
        }
        assert_eq!(recent.len(), 3);
        assert!(!recent.contains(MapLocation::new(0, 0)));
        assert!(recent.contains(MapLocation::new(3, 0)));
        recent.clear();
        assert!(recent.is_empty());
    }

    #[test]
    fn test_reset_clears_attempt_and_history() {
        let mut nav = Navigator::new(&AgentConfig::default());
        nav.record_visit(MapLocation::new(1, 1));
        nav.goal = Some(MapLocation::new(4, 4));
        nav.phase = Phase::Tracing {
            cross_point: MapLocation::new(4, 4),
            trace: None,
        };
        nav.reset();
        assert_eq!(nav.phase(), NavPhase::Greedy);
        assert_eq!(nav.goal(), None);
        assert_eq!(nav.cross_point(), None);
        assert_eq!(nav.stall_count(), 0);
        assert!(nav.recent().is_empty());
    }

    #[test]
    fn test_retarget_keeps_recent_visits() {
        let mut nav = Navigator::new(&AgentConfig::default());
        nav.record_visit(MapLocation::new(1, 1));
        nav.restart(MapLocation::new(4, 4));
        assert_eq!(nav.goal(), Some(MapLocation::new(4, 4)));
        assert!(nav.recent().contains(MapLocation::new(1, 1)));
    }
}
