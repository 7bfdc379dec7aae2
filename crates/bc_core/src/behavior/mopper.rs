//! Mopper state machine: clears enemy paint and sweeps enemy units.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{self, Reporter};
use super::{BehaviorState, Common, StateMachine};
use crate::comms::{self, Payload};
use crate::error::Result;
use crate::geometry::{Direction, MapLocation};
use crate::world::{Team, WorldQuery};

/// Enemies that must stand in one swing strip before swinging is worth it.
const SWING_MIN_TARGETS: usize = 2;

/// Mutable state of one mopper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MopperBrain {
    machine: StateMachine,
    target: Option<MapLocation>,
    reporter: Reporter,
    inbox_round: u32,
}

impl MopperBrain {
    /// Fresh mopper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current behavior state.
    #[must_use]
    pub fn state(&self) -> BehaviorState {
        self.machine.state()
    }

    /// Reported target, if any.
    #[must_use]
    pub fn target(&self) -> Option<MapLocation> {
        self.target
    }

    /// Run one tick.
    pub fn tick<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        for envelope in comms::decode_inbox(world.drain_inbox(self.inbox_round)) {
            if let Payload::Tile(report) = envelope.payload {
                self.target = Some(report.location);
            }
        }
        self.inbox_round = world.round();
        common
            .resupply
            .update(&*world, common.config.resupply_stale_distance_sq);

        let threshold = common.config.mopper_low_paint_threshold;
        if world.paint() < threshold && self.machine.enter_low_resource() {
            common.nav.reset();
        }

        match self.machine.state() {
            BehaviorState::LowOnResource => {
                if common::low_resource_step(world, common, threshold, rng)? {
                    let preempt = self.reporter.delivery_preempt(&self.machine);
                    self.machine.leave_low_resource(preempt);
                    common.nav.reset();
                }
            }
            BehaviorState::DeliveringMessage => {
                common::deliver_step(
                    world,
                    common,
                    &mut self.machine,
                    &mut self.reporter,
                    BehaviorState::Exploring,
                )?;
            }
            BehaviorState::Stuck => self.stuck(world, common, rng)?,
            BehaviorState::Exploring
            | BehaviorState::FillingStructure
            | BehaviorState::FillingPattern => self.explore(world, common)?,
        }
        common::try_complete_resource_patterns(world)?;
        Ok(())
    }

    fn explore<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
    ) -> Result<()> {
        self.machine.transition(BehaviorState::Exploring);
        if common.resupply.location.is_some()
            && self
                .reporter
                .detect(&*world, common.config.enemy_report_cooldown)
                .is_some()
        {
            self.machine.begin_delivery();
            common.nav.reset();
            return Ok(());
        }

        let acted = swing_or_mop(world)?;

        let current = world.current_location();
        if let Some(target) = self.target {
            let cleared = world.sense_tile(target).is_some_and(|tile| !tile.paint.is_enemy());
            if cleared || current == target {
                self.target = None;
            }
        }
        let chase = common::enemy_paint_tiles(&*world)
            .into_iter()
            .map(|tile| tile.location)
            .min_by_key(|loc| loc.distance_squared_to(current))
            .or(self.target);
        let Some(chase) = chase else {
            self.machine.transition(BehaviorState::Stuck);
            return Ok(());
        };

        if !current.is_within_distance_squared(chase, 2) {
            let dir = common.nav.pathfind(&*world, chase);
            common::step(world, dir)?;
        }
        if !acted {
            swing_or_mop(world)?;
        }
        Ok(())
    }

    fn stuck<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        if self.target.is_some() || !common::enemy_paint_tiles(&*world).is_empty() {
            self.machine.transition(BehaviorState::Exploring);
            common.nav.reset();
            return self.explore(world, common);
        }
        let dir = common.nav.unstick(&*world, rng);
        common::step(world, dir)?;
        Ok(())
    }
}

/// Cells hit by a swing in cardinal direction `dir`: two rows deep, three wide.
fn swing_area(origin: MapLocation, dir: Direction) -> impl Iterator<Item = MapLocation> {
    let (sx, sy) = dir.rotate_right().rotate_right().offset();
    (1..=2).flat_map(move |depth| {
        let row = origin.step(dir, depth);
        (-1..=1).map(move |side| row.translate(sx * side, sy * side))
    })
}

fn enemies_in_swing<W: WorldQuery + ?Sized>(world: &W, enemy: Team, dir: Direction) -> usize {
    swing_area(world.current_location(), dir)
        .filter(|&loc| {
            world
                .sense_unit_at(loc)
                .is_some_and(|unit| unit.team == enemy && !unit.unit_type.is_tower())
        })
        .count()
}

/// Swing if enough enemies line up, otherwise mop the best enemy-painted
/// tile in reach, preferring one with an enemy standing on it.
fn swing_or_mop<W: WorldQuery + ?Sized>(world: &mut W) -> Result<bool> {
    let enemy = world.team().opponent();
    let swing = Direction::CARDINAL
        .into_iter()
        .map(|dir| (enemies_in_swing(&*world, enemy, dir), dir))
        .filter(|&(count, dir)| count >= SWING_MIN_TARGETS && world.can_swing(dir))
        .max_by_key(|&(count, _)| count);
    if let Some((count, dir)) = swing {
        world.swing(dir)?;
        tracing::debug!(dir = ?dir, count, "mop swing");
        return Ok(true);
    }

    let current = world.current_location();
    let radius = world.unit_type().action_radius_sq();
    let target = world
        .sense_tiles_in_radius(current, radius)
        .into_iter()
        .filter(|tile| tile.paint.is_enemy() && world.can_act_on(tile.location))
        .max_by_key(|tile| {
            let occupied = world
                .sense_unit_at(tile.location)
                .is_some_and(|unit| unit.team == enemy);
            (occupied, -tile.location.distance_squared_to(current))
        })
        .map(|tile| tile.location);
    match target {
        Some(loc) => {
            world.act(loc, false)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swing_area_is_two_by_three() {
        let origin = MapLocation::new(5, 5);
        let cells: Vec<_> = swing_area(origin, Direction::North).collect();
        assert_eq!(cells.len(), 6);
        assert!(cells.contains(&MapLocation::new(4, 6)));
        assert!(cells.contains(&MapLocation::new(6, 7)));
        assert!(!cells.contains(&origin));

        let east: Vec<_> = swing_area(origin, Direction::East).collect();
        assert!(east.contains(&MapLocation::new(7, 4)));
        assert!(east.contains(&MapLocation::new(6, 6)));
    }
}
