//! Splasher state machine: area painting over enemy territory.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{self, Reporter};
use super::{BehaviorState, Common, StateMachine};
use crate::comms::{self, Payload};
use crate::error::Result;
use crate::geometry::MapLocation;
use crate::world::WorldQuery;

/// Mutable state of one splasher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplasherBrain {
    machine: StateMachine,
    target: Option<MapLocation>,
    reporter: Reporter,
    inbox_round: u32,
}

impl SplasherBrain {
    /// Fresh splasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current behavior state.
    #[must_use]
    pub fn state(&self) -> BehaviorState {
        self.machine.state()
    }

    /// Current splash target.
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

        let threshold = common.config.splasher_low_paint_threshold;
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
            BehaviorState::Stuck => {
                if self.pick_target(&*world).is_some() {
                    self.machine.transition(BehaviorState::Exploring);
                    common.nav.reset();
                    self.explore(world, common)?;
                } else {
                    let dir = common.nav.unstick(&*world, rng);
                    common::step(world, dir)?;
                }
            }
            BehaviorState::Exploring
            | BehaviorState::FillingStructure
            | BehaviorState::FillingPattern => {
                self.machine.transition(BehaviorState::Exploring);
                self.explore(world, common)?;
            }
        }
        common::try_complete_resource_patterns(world)?;
        Ok(())
    }

    /// Keep the current target unless it has turned ally, otherwise take the
    /// farthest visible enemy-painted tile.
    fn pick_target<W: WorldQuery + ?Sized>(&mut self, world: &W) -> Option<MapLocation> {
        if let Some(target) = self.target {
            if world.sense_tile(target).is_some_and(|tile| tile.paint.is_ally()) {
                self.target = None;
            }
        }
        if self.target.is_none() {
            let current = world.current_location();
            self.target = common::enemy_paint_tiles(world)
                .into_iter()
                .map(|tile| tile.location)
                .max_by_key(|loc| loc.distance_squared_to(current));
        }
        self.target
    }

    fn explore<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
    ) -> Result<()> {
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
        common::attack_enemy_tower(world)?;

        let Some(target) = self.pick_target(&*world) else {
            self.machine.transition(BehaviorState::Stuck);
            return Ok(());
        };
        if world.can_act_on(target) {
            world.act(target, false)?;
            tracing::trace!(at = %target, "splash");
            return Ok(());
        }
        let dir = common.nav.pathfind(&*world, target);
        common::step(world, dir)?;
        if world.can_act_on(target) {
            world.act(target, false)?;
        }
        Ok(())
    }
}
