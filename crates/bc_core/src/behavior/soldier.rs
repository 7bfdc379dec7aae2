//! Soldier state machine: painting, structure filling, scouting and siege.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::common::{self, Reporter};
use super::{BehaviorState, Common, SoldierRole, StateMachine};
use crate::comms::{self, Payload, RoleCommand};
use crate::error::Result;
use crate::geometry::{Direction, MapLocation};
use crate::navigation::explore::far_corner;
use crate::patterns;
use crate::world::{PaintType, TowerKind, UnitType, WorldQuery, VISION_RADIUS_SQ};

/// Rounds during which a fresh soldier opens as a scout.
const SCOUT_SPAWN_ROUNDS: u32 = 3;

/// Maps with more cells than this send some developers to pattern filling.
const LARGE_MAP_AREA: i32 = 900;

/// Squared distance at which a wander target counts as reached.
const WANDER_REACHED_SQ: i32 = 8;

/// Squared distance from a pattern center that still lies inside its 5x5 block.
const PATTERN_REACH_SQ: i32 = 8;

/// Mutable state of one soldier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoldierBrain {
    machine: StateMachine,
    role: SoldierRole,
    ruin: Option<MapLocation>,
    tower_kind: Option<TowerKind>,
    wander_target: Option<MapLocation>,
    enemy_tower: Option<MapLocation>,
    pattern_center: Option<MapLocation>,
    stuck_turns: u32,
    reporter: Reporter,
    inbox_round: u32,
}

impl SoldierBrain {
    /// Fresh soldier, developing territory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh soldier already assigned to `role`.
    #[must_use]
    pub fn with_role(role: SoldierRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Current behavior state.
    #[must_use]
    pub fn state(&self) -> BehaviorState {
        self.machine.state()
    }

    /// Current role.
    #[must_use]
    pub fn role(&self) -> SoldierRole {
        self.role
    }

    /// The state machine, for inspection.
    #[must_use]
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Ruin being filled, if any.
    #[must_use]
    pub fn ruin(&self) -> Option<MapLocation> {
        self.ruin
    }

    /// Run one tick.
    pub fn tick<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        self.read_messages(world, common, rng);
        if common.turns_alive == 1 {
            common::paint_current_tile(world)?;
            if world.round() <= SCOUT_SPAWN_ROUNDS {
                let (width, height) = world.map_bounds();
                let spawn = world.current_location();
                self.set_role(SoldierRole::InitialScout, common);
                self.wander_target =
                    Some(MapLocation::new(width - 1 - spawn.x, height - 1 - spawn.y));
            }
        }
        common
            .resupply
            .update(&*world, common.config.resupply_stale_distance_sq);

        if world.paint() < common.config.low_paint_threshold && self.machine.enter_low_resource() {
            tracing::debug!(
                paint = world.paint(),
                resume = ?self.machine.resume_after_low(),
                "soldier low on paint"
            );
            common.nav.reset();
        }

        if self.machine.is(BehaviorState::LowOnResource) {
            self.recover(world, common, rng)?;
        } else {
            match self.role {
                SoldierRole::InitialScout => self.scout(world, common)?,
                SoldierRole::SiegeAttacker => self.siege(world, common)?,
                SoldierRole::PatternFiller => self.pattern_filler(world, common, rng)?,
                SoldierRole::AreaDeveloper | SoldierRole::FrontierAdvancer => {
                    self.builder(world, common, rng)?;
                }
            }
        }
        common::try_complete_resource_patterns(world)?;
        Ok(())
    }

    fn read_messages<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R)
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        let envelopes = comms::decode_inbox(world.drain_inbox(self.inbox_round));
        self.inbox_round = world.round();
        let (width, height) = world.map_bounds();
        for envelope in envelopes {
            match envelope.payload {
                Payload::Role(RoleCommand::Develop) => {
                    let role = if width * height > LARGE_MAP_AREA && rng.gen_bool(0.5) {
                        SoldierRole::PatternFiller
                    } else {
                        SoldierRole::AreaDeveloper
                    };
                    self.set_role(role, common);
                }
                Payload::Role(RoleCommand::Advance) => {
                    self.set_role(SoldierRole::FrontierAdvancer, common);
                }
                Payload::Role(RoleCommand::Attack) => {
                    self.set_role(SoldierRole::SiegeAttacker, common);
                }
                Payload::Tile(report)
                    if matches!(
                        self.role,
                        SoldierRole::FrontierAdvancer | SoldierRole::SiegeAttacker
                    ) =>
                {
                    if report.ruin {
                        self.enemy_tower = Some(report.location);
                        if self.role != SoldierRole::SiegeAttacker {
                            self.set_role(SoldierRole::SiegeAttacker, common);
                        }
                    } else {
                        self.wander_target = Some(report.location);
                    }
                }
                Payload::Role(RoleCommand::Mopper | RoleCommand::Splasher)
                | Payload::Tile(_)
                | Payload::Unit(_) => {}
            }
        }
    }

    fn set_role(&mut self, role: SoldierRole, common: &mut Common<'_>) {
        if role != self.role {
            tracing::debug!(from = ?self.role, to = ?role, "soldier role change");
        }
        self.role = role;
        self.stuck_turns = 0;
        self.ruin = None;
        self.tower_kind = None;
        self.pattern_center = None;
        common.nav.reset();
        if !self.machine.is(BehaviorState::LowOnResource) {
            self.machine.transition(BehaviorState::Exploring);
        }
    }

    fn recover<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        let threshold = common.config.low_paint_threshold;
        if !common::low_resource_step(world, common, threshold, rng)? {
            return Ok(());
        }
        let preempt = self.reporter.delivery_preempt(&self.machine).or_else(|| {
            if self.ruin.is_some() || self.role != SoldierRole::AreaDeveloper {
                return None;
            }
            common::find_best_ruin(&*world).map(|ruin| {
                self.ruin = Some(ruin);
                self.tower_kind = None;
                BehaviorState::FillingStructure
            })
        });
        let next = self.machine.leave_low_resource(preempt);
        tracing::debug!(paint = world.paint(), next = ?next, "soldier recovered");
        common.nav.reset();
        Ok(())
    }

    fn builder<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        match self.machine.state() {
            BehaviorState::DeliveringMessage => {
                let fallback = if self.ruin.is_some() {
                    BehaviorState::FillingStructure
                } else {
                    BehaviorState::Stuck
                };
                common::deliver_step(world, common, &mut self.machine, &mut self.reporter, fallback)
            }
            BehaviorState::FillingStructure => self.fill_structure(world, common, rng),
            BehaviorState::Stuck => self.stuck(world, common, rng),
            BehaviorState::Exploring
            | BehaviorState::FillingPattern
            | BehaviorState::LowOnResource => self.explore(world, common, rng),
        }
    }

    fn explore<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
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
        if let Some(ruin) = common::find_best_ruin(&*world) {
            tracing::debug!(ruin = %ruin, "claiming ruin");
            self.ruin = Some(ruin);
            self.tower_kind = None;
            self.machine.transition(BehaviorState::FillingStructure);
            common.nav.reset();
            return self.fill_structure(world, common, rng);
        }

        common::paint_current_tile(world)?;
        let dir = match self.role {
            SoldierRole::FrontierAdvancer => {
                let target = self.advance_target(&*world);
                common.nav.explore_toward(&*world, target, true, rng)
            }
            _ => {
                if common::sees_paintable_tile(&*world) {
                    common.nav.explore_unpainted(&*world, rng)
                } else {
                    None
                }
            }
        };
        if common::step(world, dir)? {
            self.stuck_turns = 0;
            common::paint_current_tile(world)?;
        } else {
            self.machine.transition(BehaviorState::Stuck);
        }
        Ok(())
    }

    fn advance_target<W: WorldQuery + ?Sized>(&mut self, world: &W) -> MapLocation {
        let current = world.current_location();
        let (width, height) = world.map_bounds();
        match self.wander_target {
            Some(target) if !current.is_within_distance_squared(target, WANDER_REACHED_SQ) => {
                target
            }
            _ => {
                let target = far_corner(current, width, height);
                self.wander_target = Some(target);
                target
            }
        }
    }

    fn stuck<W, R>(&mut self, world: &mut W, common: &mut Common<'_>, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        self.stuck_turns += 1;
        let limit = match self.role {
            SoldierRole::FrontierAdvancer => common.config.advancer_lifecycle_turns,
            _ => common.config.developer_lifecycle_turns,
        };
        if self.stuck_turns >= limit {
            self.set_role(SoldierRole::PatternFiller, common);
            return Ok(());
        }
        let dir = match self.role {
            SoldierRole::FrontierAdvancer => common.nav.unstick(&*world, rng),
            _ => common.nav.unstick_exploring(&*world, rng),
        };
        if common::step(world, dir)? {
            common::paint_current_tile(world)?;
        }
        if common::sees_paintable_tile(&*world) || common::find_best_ruin(&*world).is_some() {
            self.stuck_turns = 0;
            self.machine.transition(BehaviorState::Exploring);
            common.nav.reset();
        }
        Ok(())
    }

    fn fill_structure<W, R>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
        rng: &mut R,
    ) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        let Some(ruin) = self.ruin else {
            self.machine.transition(BehaviorState::Exploring);
            return Ok(());
        };
        if world.can_sense(ruin) && !common::can_build_tower(&*world, ruin) {
            tracing::debug!(ruin = %ruin, "abandoning ruin");
            self.abandon_ruin(common);
            return Ok(());
        }

        let beside_ruin = world.current_location().is_within_distance_squared(ruin, 2);
        if self.tower_kind.is_none() && !beside_ruin {
            let dir = common.nav.pathfind(&*world, ruin);
            common::step(world, dir)?;
        }

        let Some(kind) = self.resolve_tower_kind(world, ruin, common, rng)? else {
            return Ok(());
        };

        let current = world.current_location();
        let mut mismatches = patterns::tower_mismatches(ruin, kind, |loc| {
            world
                .sense_tile(loc)
                .filter(|tile| tile.passable)
                .map(|tile| tile.paint)
        });
        mismatches.sort_by_key(|(loc, _)| loc.distance_squared_to(current));
        if let Some(index) = mismatches.iter().position(|(loc, _)| world.can_act_on(*loc)) {
            let (loc, required) = mismatches.remove(index);
            world.act(loc, required.is_secondary())?;
        }

        walk_to_mismatch(world, common, &mismatches, ruin)?;

        let tower = UnitType::Tower(kind);
        if world.can_build(tower, ruin) {
            world.build(tower, ruin)?;
            tracing::debug!(ruin = %ruin, kind = ?kind, "structure completed");
            self.ruin = None;
            self.tower_kind = None;
            common.nav.reset();
            self.machine.transition(BehaviorState::Exploring);
            self.machine.enter_low_resource();
        }
        Ok(())
    }

    /// The structure type for `ruin`, from its markers or freshly chosen and
    /// marked. `None` while the marker cell is still out of reach.
    fn resolve_tower_kind<W, R>(
        &mut self,
        world: &mut W,
        ruin: MapLocation,
        common: &Common<'_>,
        rng: &mut R,
    ) -> Result<Option<TowerKind>>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        if let Some(kind) = self.tower_kind {
            return Ok(Some(kind));
        }
        let north = world.read_marker(ruin.add(Direction::North));
        let north_east = world.read_marker(ruin.add(Direction::NorthEast));
        if let (Some(north), Some(north_east)) = (north, north_east) {
            if let Some(kind) = patterns::kind_from_markers(north, north_east) {
                self.tower_kind = Some(kind);
                return Ok(Some(kind));
            }
        }

        let kind = common::choose_tower_kind(
            &*world,
            ruin,
            common.resupply.seen_paint_tower,
            common.config.paint_tower_share,
            rng,
        );
        let (cell, secondary) = patterns::marker_for(ruin, kind);
        if !world.can_mark(cell) {
            return Ok(None);
        }
        world.mark(cell, secondary)?;
        tracing::debug!(ruin = %ruin, kind = ?kind, "marked ruin");
        self.tower_kind = Some(kind);
        Ok(Some(kind))
    }

    fn abandon_ruin(&mut self, common: &mut Common<'_>) {
        self.ruin = None;
        self.tower_kind = None;
        common.nav.reset();
        self.machine.transition(BehaviorState::Exploring);
    }

    fn scout<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
    ) -> Result<()> {
        let (width, height) = world.map_bounds();
        let current = world.current_location();
        let sees_enemy = !world.enemies_in_radius(VISION_RADIUS_SQ).is_empty();
        let reportable_tower = common.resupply.location.is_some()
            && world
                .enemies_in_radius(VISION_RADIUS_SQ)
                .iter()
                .any(|unit| unit.unit_type.is_tower());
        let blocked_ruin = world
            .sense_tiles_in_radius(current, VISION_RADIUS_SQ)
            .iter()
            .any(|tile| tile.ruin && !common::can_build_tower(&*world, tile.location));
        let late = world.round() >= ((width + height) / 2) as u32;
        let target = self
            .wander_target
            .unwrap_or_else(|| far_corner(current, width, height));

        if late || sees_enemy || reportable_tower || blocked_ruin || current == target {
            tracing::debug!(late, sees_enemy, reportable_tower, blocked_ruin, "scout promoted");
            self.set_role(SoldierRole::FrontierAdvancer, common);
            self.wander_target = Some(target);
            return Ok(());
        }

        let dir = common.nav.pathfind(&*world, target);
        if common::step(world, dir)? {
            common::paint_current_tile(world)?;
        }
        Ok(())
    }

    fn siege<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
    ) -> Result<()> {
        let Some(tower) = self.enemy_tower else {
            self.set_role(SoldierRole::FrontierAdvancer, common);
            return Ok(());
        };
        if world.can_sense(tower) {
            let standing = world
                .sense_unit_at(tower)
                .is_some_and(|unit| unit.team != world.team() && unit.unit_type.is_tower());
            if !standing {
                tracing::debug!(at = %tower, "siege target gone");
                self.enemy_tower = None;
                self.set_role(SoldierRole::FrontierAdvancer, common);
                return Ok(());
            }
        }

        if world.can_act_on(tower) {
            world.act(tower, false)?;
            let back = world.current_location().direction_to(tower).opposite();
            common::step(world, Some(back))?;
        } else {
            let dir = common.nav.pathfind(&*world, tower);
            common::step(world, dir)?;
            if world.can_act_on(tower) {
                world.act(tower, false)?;
            }
        }
        Ok(())
    }

    fn pattern_filler<W, R>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
        rng: &mut R,
    ) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        if self.machine.is(BehaviorState::FillingPattern) {
            return self.fill_pattern(world, common);
        }
        if self.machine.is(BehaviorState::DeliveringMessage) {
            return common::deliver_step(
                world,
                common,
                &mut self.machine,
                &mut self.reporter,
                BehaviorState::Stuck,
            );
        }

        self.machine.transition(BehaviorState::Stuck);
        self.stuck_turns += 1;
        if self.stuck_turns >= common.config.pattern_lifecycle_turns {
            self.set_role(SoldierRole::FrontierAdvancer, common);
            return Ok(());
        }
        if let Some(center) = choose_pattern_center(&*world) {
            tracing::debug!(center = %center, "filling resource pattern");
            self.pattern_center = Some(center);
            self.stuck_turns = 0;
            common.nav.reset();
            self.machine.transition(BehaviorState::FillingPattern);
            return self.fill_pattern(world, common);
        }
        let dir = common.nav.unstick(&*world, rng);
        if common::step(world, dir)? {
            common::paint_current_tile(world)?;
        }
        Ok(())
    }

    fn fill_pattern<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        common: &mut Common<'_>,
    ) -> Result<()> {
        let Some(center) = self.pattern_center else {
            self.machine.transition(BehaviorState::Stuck);
            return Ok(());
        };
        if world.can_sense(center) && !pattern_site_clear(&*world, center) {
            self.finish_pattern(common);
            return Ok(());
        }

        if !world.current_location().is_within_distance_squared(center, PATTERN_REACH_SQ) {
            let dir = common.nav.pathfind(&*world, center);
            common::step(world, dir)?;
        }
        if world.read_marker(center) == Some(PaintType::Empty) && world.can_mark(center) {
            world.mark(center, false)?;
        }

        let current = world.current_location();
        let mut mismatches = patterns::resource_mismatches(center, |loc| {
            world
                .sense_tile(loc)
                .filter(|tile| tile.passable)
                .map(|tile| tile.paint)
        });
        mismatches.sort_by_key(|(loc, _)| loc.distance_squared_to(current));
        if let Some(index) = mismatches.iter().position(|(loc, _)| world.can_act_on(*loc)) {
            let (loc, required) = mismatches.remove(index);
            world.act(loc, required.is_secondary())?;
        }
        walk_to_mismatch(world, common, &mismatches, center)?;

        if world.can_complete_resource_pattern(center) {
            world.complete_resource_pattern(center)?;
            tracing::debug!(center = %center, "resource pattern completed");
            self.finish_pattern(common);
        } else if mismatches.is_empty() && world.can_sense(center) {
            self.finish_pattern(common);
        }
        Ok(())
    }

    fn finish_pattern(&mut self, common: &mut Common<'_>) {
        self.pattern_center = None;
        common.nav.reset();
        self.machine.transition(BehaviorState::Stuck);
    }
}

/// Walk around a 5x5 pattern. No single cell reaches the whole footprint,
/// so once every remaining cell in `mismatches` (nearest first) is out of
/// reach, step toward the nearest one. With nothing left, close in on
/// `anchor`.
fn walk_to_mismatch<W: WorldQuery + ?Sized>(
    world: &mut W,
    common: &mut Common<'_>,
    mismatches: &[(MapLocation, PaintType)],
    anchor: MapLocation,
) -> Result<bool> {
    let current = world.current_location();
    let reach = world.unit_type().action_radius_sq();
    let all_out_of_reach = mismatches
        .iter()
        .all(|(loc, _)| !current.is_within_distance_squared(*loc, reach));
    let next = match mismatches.first() {
        Some(&(loc, _)) if all_out_of_reach => Some(loc),
        Some(_) => None,
        None => (!current.is_within_distance_squared(anchor, 2)).then_some(anchor),
    };
    match next {
        Some(next) => {
            let dir = common.nav.pathfind(&*world, next);
            common::step(world, dir)
        }
        None => Ok(false),
    }
}

/// Whether a resource pattern at `center` can still be painted: every
/// footprint cell visible, passable and free of enemy paint, and no ruin
/// close enough for the structure footprint to overlap.
fn pattern_site_clear<W: WorldQuery + ?Sized>(world: &W, center: MapLocation) -> bool {
    let footprint_ok = patterns::footprint().all(|(dx, dy)| {
        world
            .sense_tile(center.translate(dx, dy))
            .is_some_and(|tile| tile.passable && !tile.paint.is_enemy())
    });
    footprint_ok
        && !world
            .sense_tiles_in_radius(center, 32)
            .iter()
            .any(|tile| {
                tile.ruin
                    && (tile.location.x - center.x).abs() <= 4
                    && (tile.location.y - center.y).abs() <= 4
            })
}

/// Pick a resource pattern center to work on. A center already claimed with
/// a marker wins, otherwise the nearest aligned center that still needs paint.
fn choose_pattern_center<W: WorldQuery + ?Sized>(world: &W) -> Option<MapLocation> {
    let current = world.current_location();
    let mut candidates: Vec<(bool, i32, MapLocation)> = world
        .sense_tiles_in_radius(current, VISION_RADIUS_SQ)
        .into_iter()
        .filter(|tile| patterns::is_resource_center(tile.location))
        .filter(|tile| pattern_site_clear(world, tile.location))
        .filter(|tile| {
            let paint_at = |loc: MapLocation| world.sense_tile(loc).map(|t| t.paint);
            !patterns::resource_mismatches(tile.location, paint_at).is_empty()
        })
        .map(|tile| {
            let claimed = tile.mark == PaintType::AllyPrimary;
            (!claimed, tile.location.distance_squared_to(current), tile.location)
        })
        .collect();
    candidates.sort_unstable();
    candidates.first().map(|&(_, _, loc)| loc)
}
