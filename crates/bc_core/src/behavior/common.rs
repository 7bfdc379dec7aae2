//! Helpers shared by the mobile state machines.
//!
//! Everything here goes through the paired `can_*` check before acting, so a
//! helper that cannot act simply does nothing this tick.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{BehaviorState, Common, StateMachine};
use crate::comms::{Payload, TileReport};
use crate::error::Result;
use crate::geometry::{Direction, MapLocation};
use crate::patterns;
use crate::world::{TileObservation, TowerKind, UnitType, WorldQuery, VISION_RADIUS_SQ};

/// Squared radius in which resource patterns are completed opportunistically.
const RESOURCE_COMPLETE_RADIUS_SQ: i32 = 16;

/// Squared radius in which an enemy structure is reported.
const ENEMY_TOWER_REPORT_RADIUS_SQ: i32 = 20;

/// Last known friendly resupply point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResupplyCache {
    /// Where it was last seen.
    pub location: Option<MapLocation>,
    /// Whether this unit has ever seen a friendly paint tower.
    pub seen_paint_tower: bool,
}

impl ResupplyCache {
    /// Refresh from what is visible this tick.
    ///
    /// The nearest visible paint tower always wins. Any other friendly tower
    /// is remembered only while nothing better is known. A remembered point
    /// that is visible but empty, or that should be visible at
    /// `stale_distance_sq` but is not, is forgotten.
    pub fn update<W: WorldQuery + ?Sized>(&mut self, world: &W, stale_distance_sq: i32) {
        let current = world.current_location();
        let towers: Vec<_> = world
            .allies_in_radius(VISION_RADIUS_SQ)
            .into_iter()
            .filter(|unit| unit.unit_type.is_tower())
            .collect();

        let nearest_paint = towers
            .iter()
            .filter(|unit| unit.unit_type == UnitType::Tower(TowerKind::Paint))
            .min_by_key(|unit| unit.location.distance_squared_to(current));
        if let Some(tower) = nearest_paint {
            self.location = Some(tower.location);
            self.seen_paint_tower = true;
            return;
        }

        if let Some(known) = self.location {
            let visible = world.can_sense(known);
            let occupied = world
                .sense_unit_at(known)
                .is_some_and(|unit| unit.team == world.team() && unit.unit_type.is_tower());
            let stale = (visible && !occupied)
                || (!visible && current.is_within_distance_squared(known, stale_distance_sq));
            if stale {
                tracing::debug!(at = %known, "forgetting resupply point");
                self.location = None;
            }
        }

        if self.location.is_none() {
            self.location = towers
                .iter()
                .min_by_key(|unit| unit.location.distance_squared_to(current))
                .map(|unit| unit.location);
        }
    }
}

/// Pending enemy sighting and the report cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    /// Fact waiting to be delivered.
    pub pending: Option<TileReport>,
    last_report_round: Option<u32>,
}

impl Reporter {
    /// Look for an enemy fact worth carrying home.
    ///
    /// Enemy structures come first, enemy paint second. Nothing is reported
    /// within `cooldown` rounds of the previous report. A found fact is
    /// stored as pending and returned.
    pub fn detect<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        cooldown: u32,
    ) -> Option<TileReport> {
        let round = world.round();
        if self
            .last_report_round
            .is_some_and(|last| round < last.saturating_add(cooldown))
        {
            return None;
        }
        let current = world.current_location();
        let tower = world
            .enemies_in_radius(ENEMY_TOWER_REPORT_RADIUS_SQ)
            .into_iter()
            .filter(|unit| unit.unit_type.is_tower())
            .min_by_key(|unit| unit.location.distance_squared_to(current))
            .and_then(|unit| world.sense_tile(unit.location));
        let tile = tower.or_else(|| {
            world
                .sense_tiles_in_radius(current, VISION_RADIUS_SQ)
                .into_iter()
                .filter(|tile| tile.paint.is_enemy())
                .min_by_key(|tile| tile.location.distance_squared_to(current))
        })?;
        let report = TileReport::from(tile);
        self.pending = Some(report);
        self.last_report_round = Some(round);
        Some(report)
    }

    /// State that should preempt the one stashed by `machine` when leaving
    /// low-resource recovery: a delivery while a report is pending, unless
    /// the stash already resumes one.
    #[must_use]
    pub fn delivery_preempt(&self, machine: &StateMachine) -> Option<BehaviorState> {
        let resumes_delivery = machine.resume_after_low() == Some(BehaviorState::DeliveringMessage);
        (self.pending.is_some() && !resumes_delivery).then_some(BehaviorState::DeliveringMessage)
    }
}

/// Take one step in `dir` if the engine allows it. Returns whether the unit moved.
pub fn step<W: WorldQuery + ?Sized>(world: &mut W, dir: Option<Direction>) -> Result<bool> {
    match dir {
        Some(dir) if world.can_move(dir) => {
            world.move_unit(dir)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Attack the nearest enemy structure in range.
pub fn attack_enemy_tower<W: WorldQuery + ?Sized>(world: &mut W) -> Result<bool> {
    let current = world.current_location();
    let radius = world.unit_type().action_radius_sq();
    let target = world
        .enemies_in_radius(radius)
        .into_iter()
        .filter(|unit| unit.unit_type.is_tower())
        .map(|unit| unit.location)
        .filter(|&loc| world.can_act_on(loc))
        .min_by_key(|loc| loc.distance_squared_to(current));
    match target {
        Some(loc) => {
            world.act(loc, false)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Complete the first resource pattern within reach.
pub fn try_complete_resource_patterns<W: WorldQuery + ?Sized>(world: &mut W) -> Result<bool> {
    let current = world.current_location();
    let center = world
        .sense_tiles_in_radius(current, RESOURCE_COMPLETE_RADIUS_SQ)
        .into_iter()
        .map(|tile| tile.location)
        .find(|&loc| world.can_complete_resource_pattern(loc));
    match center {
        Some(center) => {
            world.complete_resource_pattern(center)?;
            tracing::debug!(center = %center, "completed resource pattern");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Paint the tile under the unit if it is empty and unmarked. The color
/// follows the resource grid so stray paint never blocks a future pattern.
pub fn paint_current_tile<W: WorldQuery + ?Sized>(world: &mut W) -> Result<bool> {
    let current = world.current_location();
    let bare = world
        .sense_tile(current)
        .is_some_and(|tile| !tile.paint.is_painted() && !tile.mark.is_painted());
    if bare && world.can_act_on(current) {
        world.act(current, patterns::resource_secondary(current))?;
        return Ok(true);
    }
    Ok(false)
}

/// Whether any visible tile is empty, passable and free of units, the same
/// cells exploration weighs as open ground.
pub fn sees_paintable_tile<W: WorldQuery + ?Sized>(world: &W) -> bool {
    world
        .sense_tiles_in_radius(world.current_location(), VISION_RADIUS_SQ)
        .iter()
        .any(|tile| {
            tile.passable
                && !tile.paint.is_painted()
                && world.sense_unit_at(tile.location).is_none()
        })
}

/// Visible enemy-painted tiles.
pub fn enemy_paint_tiles<W: WorldQuery + ?Sized>(world: &W) -> Vec<TileObservation> {
    world
        .sense_tiles_in_radius(world.current_location(), VISION_RADIUS_SQ)
        .into_iter()
        .filter(|tile| tile.paint.is_enemy())
        .collect()
}

/// One tick of low-resource recovery.
///
/// Attacks an enemy structure if one is in range, heads for the resupply
/// point (along ally paint when almost empty), and trades paint with it on
/// arrival. With no resupply point known the unit wanders over its own
/// paint. Returns `true` once paint is back at `threshold`, before or after
/// acting.
pub fn low_resource_step<W, R>(
    world: &mut W,
    common: &mut Common<'_>,
    threshold: i32,
    rng: &mut R,
) -> Result<bool>
where
    W: WorldQuery + ?Sized,
    R: Rng,
{
    if world.paint() >= threshold {
        return Ok(true);
    }
    attack_enemy_tower(world)?;

    match common.resupply.location {
        Some(home) => {
            let current = world.current_location();
            if !current.is_within_distance_squared(home, 2) {
                let dir = if world.paint() < common.config.critical_paint {
                    common.nav.painted_step(&*world, home)
                } else {
                    common.nav.pathfind(&*world, home)
                };
                step(world, dir)?;
            }
            request_paint(world, home, common.config.min_paint_give)?;
        }
        None => {
            let dir = common
                .nav
                .random_painted_walk(&*world, rng)
                .or_else(|| common.nav.random_walk(&*world, rng));
            step(world, dir)?;
        }
    }
    Ok(world.paint() >= threshold)
}

/// Trade paint with the structure at `home`: give back any overflow, take
/// what is missing if the structure has it, or drain the structure when it
/// holds more than `min_give`.
fn request_paint<W: WorldQuery + ?Sized>(
    world: &mut W,
    home: MapLocation,
    min_give: i32,
) -> Result<()> {
    let Some(tower) = world.sense_unit_at(home) else {
        return Ok(());
    };
    let capacity = world.unit_type().paint_capacity();
    let held = world.paint();
    let amount = if held > capacity {
        held - capacity
    } else {
        let wanted = capacity - held;
        if tower.paint >= wanted {
            -wanted
        } else if tower.paint > min_give {
            -tower.paint
        } else {
            0
        }
    };
    if amount != 0 && world.can_transfer_paint(home, amount) {
        world.transfer_paint(home, amount)?;
        tracing::debug!(at = %home, amount, "paint transfer");
    }
    Ok(())
}

/// One tick of carrying the pending report home.
///
/// Attacks structures on the way. Once the report is sent (or dropped
/// because it cannot be encoded or there is nowhere to send it) the stashed
/// state resumes, or `fallback` if nothing was stashed.
pub fn deliver_step<W: WorldQuery + ?Sized>(
    world: &mut W,
    common: &mut Common<'_>,
    machine: &mut StateMachine,
    reporter: &mut Reporter,
    fallback: BehaviorState,
) -> Result<()> {
    attack_enemy_tower(world)?;
    let (Some(report), Some(home)) = (reporter.pending, common.resupply.location) else {
        reporter.pending = None;
        common.nav.reset();
        machine.finish_delivery(fallback);
        return Ok(());
    };

    if !world.can_send_message(home) {
        let dir = common.nav.pathfind(&*world, home);
        step(world, dir)?;
    }
    if world.can_send_message(home) {
        match Payload::Tile(report).encode() {
            Ok(raw) => {
                world.send_message(home, raw)?;
                tracing::debug!(to = %home, about = %report.location, "report delivered");
            }
            Err(err) => tracing::warn!(%err, "dropping unencodable report"),
        }
        reporter.pending = None;
        common.nav.reset();
        machine.finish_delivery(fallback);
    }
    Ok(())
}

/// Whether a structure can still be completed at `ruin`: nothing stands on
/// it and no visible footprint cell carries enemy paint.
pub fn can_build_tower<W: WorldQuery + ?Sized>(world: &W, ruin: MapLocation) -> bool {
    if world.sense_unit_at(ruin).is_some() {
        return false;
    }
    !patterns::footprint().any(|(dx, dy)| {
        world
            .sense_tile(ruin.translate(dx, dy))
            .is_some_and(|tile| tile.paint.is_enemy())
    })
}

/// Nearest visible ruin worth filling: unbuilt, buildable, and without
/// another friendly unit already working next to it.
pub fn find_best_ruin<W: WorldQuery + ?Sized>(world: &W) -> Option<MapLocation> {
    let current = world.current_location();
    let me = world.id();
    world
        .sense_tiles_in_radius(current, VISION_RADIUS_SQ)
        .into_iter()
        .filter(|tile| tile.ruin)
        .map(|tile| tile.location)
        .filter(|&ruin| can_build_tower(world, ruin))
        .filter(|&ruin| {
            !world
                .sense_units_in_radius(ruin, 2, Some(world.team()))
                .iter()
                .any(|unit| unit.id != me && !unit.unit_type.is_tower())
        })
        .min_by_key(|ruin| ruin.distance_squared_to(current))
}

/// Pick the structure type for a ruin nobody has marked yet.
///
/// Until a paint tower has been seen the answer is paint. With few towers
/// the economy wins. Later, defense becomes likelier the more towers exist
/// and the more central the ruin is, and the rest is split between paint
/// and money.
pub fn choose_tower_kind<W, R>(
    world: &W,
    ruin: MapLocation,
    seen_paint_tower: bool,
    paint_share: f64,
    rng: &mut R,
) -> TowerKind
where
    W: WorldQuery + ?Sized,
    R: Rng,
{
    if !seen_paint_tower {
        return TowerKind::Paint;
    }
    let towers = world.tower_count() as f64;
    if towers <= 3.0 {
        return TowerKind::Money;
    }
    let (width, height) = world.map_bounds();
    let span = f64::from(width + height);
    let off_center = f64::from((width / 2 - ruin.x).abs() + (height / 2 - ruin.y).abs());
    let centrality = (1.0 - 2.5 * off_center / span).max(0.0);
    let defense = ((towers / span) * 7.0).min(1.0) * centrality;
    if rng.gen_bool(defense.clamp(0.0, 1.0)) {
        return TowerKind::Defense;
    }
    let paint = (towers / span.sqrt()).min(paint_share);
    if rng.gen_bool(paint.clamp(0.0, 1.0)) {
        TowerKind::Paint
    } else {
        TowerKind::Money
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_default_is_idle() {
        let reporter = Reporter::default();
        assert_eq!(reporter.pending, None);
        assert_eq!(reporter.last_report_round, None);
        assert_eq!(reporter.delivery_preempt(&StateMachine::default()), None);
    }

    #[test]
    fn test_pending_report_preempts_recovery_exit() {
        let reporter = Reporter {
            pending: Some(TileReport::from(TileObservation::open(MapLocation::new(4, 7)))),
            ..Reporter::default()
        };
        let mut machine = StateMachine::new(BehaviorState::Exploring);
        machine.enter_low_resource();
        let preempt = reporter.delivery_preempt(&machine);
        assert_eq!(preempt, Some(BehaviorState::DeliveringMessage));
        assert_eq!(machine.leave_low_resource(preempt), BehaviorState::DeliveringMessage);
        assert_eq!(
            machine.finish_delivery(BehaviorState::Stuck),
            BehaviorState::Exploring
        );
    }

    #[test]
    fn test_stashed_delivery_is_not_preempted_twice() {
        let reporter = Reporter {
            pending: Some(TileReport::from(TileObservation::open(MapLocation::new(4, 7)))),
            ..Reporter::default()
        };
        let mut machine = StateMachine::new(BehaviorState::Exploring);
        machine.begin_delivery();
        machine.enter_low_resource();
        assert_eq!(reporter.delivery_preempt(&machine), None);
    }
}
