//! The sensing and action surface the controller runs against.
//!
//! The engine owns the map, combat and resource accounting. The controller
//! only ever sees it through [`WorldQuery`], from the point of view of the
//! unit whose tick is running. Observations are snapshots that are valid for
//! the current tick only.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::geometry::{Direction, MapLocation};

/// Engine-assigned unit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    /// First team.
    A,
    /// Second team.
    B,
}

impl Team {
    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Paint (or marker) ownership of a tile, relative to the observing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaintType {
    /// Unpainted.
    #[default]
    Empty,
    /// Our primary color.
    AllyPrimary,
    /// Our secondary color.
    AllySecondary,
    /// Opponent's primary color.
    EnemyPrimary,
    /// Opponent's secondary color.
    EnemySecondary,
}

impl PaintType {
    /// Painted by our team.
    #[must_use]
    pub const fn is_ally(self) -> bool {
        match self {
            Self::AllyPrimary | Self::AllySecondary => true,
            Self::Empty | Self::EnemyPrimary | Self::EnemySecondary => false,
        }
    }

    /// Painted by the opponent.
    #[must_use]
    pub const fn is_enemy(self) -> bool {
        match self {
            Self::EnemyPrimary | Self::EnemySecondary => true,
            Self::Empty | Self::AllyPrimary | Self::AllySecondary => false,
        }
    }

    /// Secondary color of either team.
    #[must_use]
    pub const fn is_secondary(self) -> bool {
        match self {
            Self::AllySecondary | Self::EnemySecondary => true,
            Self::Empty | Self::AllyPrimary | Self::EnemyPrimary => false,
        }
    }

    /// Any paint at all.
    #[must_use]
    pub const fn is_painted(self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// The ally color for a primary/secondary flag.
    #[must_use]
    pub const fn ally(secondary: bool) -> Self {
        if secondary {
            Self::AllySecondary
        } else {
            Self::AllyPrimary
        }
    }

    /// Swap ally and enemy, for translating between team viewpoints.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::AllyPrimary => Self::EnemyPrimary,
            Self::AllySecondary => Self::EnemySecondary,
            Self::EnemyPrimary => Self::AllyPrimary,
            Self::EnemySecondary => Self::AllySecondary,
        }
    }
}

/// Kind of stationary structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    /// Produces paint and refills units.
    Paint,
    /// Produces money.
    Money,
    /// Extra firepower.
    Defense,
}

/// Concrete unit type, as reported by sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    /// Builder that paints and fills structure patterns.
    Soldier,
    /// Cleaner that removes enemy paint.
    Mopper,
    /// Area painter.
    Splasher,
    /// Stationary structure.
    Tower(TowerKind),
}

impl UnitType {
    /// The state machine family driving this unit.
    #[must_use]
    pub const fn archetype(self) -> UnitArchetype {
        match self {
            Self::Soldier => UnitArchetype::Soldier,
            Self::Mopper => UnitArchetype::Mopper,
            Self::Splasher => UnitArchetype::Splasher,
            Self::Tower(_) => UnitArchetype::Tower,
        }
    }

    /// True for structures.
    #[must_use]
    pub const fn is_tower(self) -> bool {
        matches!(self, Self::Tower(_))
    }

    /// Maximum paint a unit of this type can hold.
    #[must_use]
    pub const fn paint_capacity(self) -> i32 {
        match self {
            Self::Soldier => 200,
            Self::Mopper => 100,
            Self::Splasher => 300,
            Self::Tower(_) => 1000,
        }
    }

    /// Squared radius of the unit's single-target action.
    #[must_use]
    pub const fn action_radius_sq(self) -> i32 {
        match self {
            Self::Soldier | Self::Tower(_) => 9,
            Self::Mopper => 2,
            Self::Splasher => 4,
        }
    }
}

/// Tag fixed at spawn selecting the state machine for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitArchetype {
    /// Builder.
    Soldier,
    /// Cleaner.
    Mopper,
    /// Area denial.
    Splasher,
    /// Stationary structure.
    Tower,
}

/// Snapshot of one map cell as sensed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileObservation {
    /// Cell coordinate.
    pub location: MapLocation,
    /// Paint ownership.
    pub paint: PaintType,
    /// Planning marker left by an ally (never enemy-colored).
    pub mark: PaintType,
    /// Units may stand here.
    pub passable: bool,
    /// Permanent obstacle.
    pub wall: bool,
    /// Structure site (built or not).
    pub ruin: bool,
}

impl TileObservation {
    /// An empty passable tile at `location`.
    #[must_use]
    pub const fn open(location: MapLocation) -> Self {
        Self {
            location,
            paint: PaintType::Empty,
            mark: PaintType::Empty,
            passable: true,
            wall: false,
            ruin: false,
        }
    }
}

/// Snapshot of a unit as sensed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitObservation {
    /// Engine identifier.
    pub id: UnitId,
    /// Where it stands.
    pub location: MapLocation,
    /// Its type.
    pub unit_type: UnitType,
    /// Its team.
    pub team: Team,
    /// Remaining health.
    pub health: i32,
    /// Paint held.
    pub paint: i32,
}

/// A message as delivered to the recipient's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Sending unit.
    pub sender: UnitId,
    /// Round in which it was sent.
    pub round: u32,
    /// Encoded payload, see [`crate::comms`].
    pub payload: u32,
}

/// Sensing and action API of the engine, scoped to the unit currently ticking.
///
/// Every action has a `can_*` check; calling an action whose check fails
/// produces an [`ActionError`].
pub trait WorldQuery {
    /// Current game round, starting at 1.
    fn round(&self) -> u32;
    /// Identifier of the ticking unit.
    fn id(&self) -> UnitId;
    /// Team of the ticking unit.
    fn team(&self) -> Team;
    /// Type of the ticking unit.
    fn unit_type(&self) -> UnitType;
    /// Location of the ticking unit.
    fn current_location(&self) -> MapLocation;
    /// Map `(width, height)`.
    fn map_bounds(&self) -> (i32, i32);
    /// Paint held by the ticking unit.
    fn paint(&self) -> i32;
    /// Team money.
    fn money(&self) -> i32;
    /// Number of friendly structures.
    fn tower_count(&self) -> usize;
    /// The unit may move this tick.
    fn is_movement_ready(&self) -> bool;
    /// The unit may act this tick.
    fn is_action_ready(&self) -> bool;

    /// Sense one tile; `None` outside vision or off the map.
    fn sense_tile(&self, loc: MapLocation) -> Option<TileObservation>;
    /// All visible tiles within `radius_sq` of `center`.
    fn sense_tiles_in_radius(&self, center: MapLocation, radius_sq: i32) -> Vec<TileObservation>;
    /// All visible units within `radius_sq` of `center`, optionally of one team.
    fn sense_units_in_radius(
        &self,
        center: MapLocation,
        radius_sq: i32,
        team: Option<Team>,
    ) -> Vec<UnitObservation>;
    /// The unit standing on `loc`, if visible.
    fn sense_unit_at(&self, loc: MapLocation) -> Option<UnitObservation>;

    /// Movement check.
    fn can_move(&self, dir: Direction) -> bool;
    /// Move one step.
    fn move_unit(&mut self, dir: Direction) -> Result<(), ActionError>;

    /// Paint/attack check for a single target.
    fn can_act_on(&self, loc: MapLocation) -> bool;
    /// Paint/attack a single target. `secondary` picks the paint color.
    fn act(&mut self, loc: MapLocation, secondary: bool) -> Result<(), ActionError>;

    /// Directional mop swing check.
    fn can_swing(&self, dir: Direction) -> bool;
    /// Mop swing in a cardinal direction.
    fn swing(&mut self, dir: Direction) -> Result<(), ActionError>;

    /// Tower area attack check.
    fn can_area_attack(&self) -> bool;
    /// Tower area attack.
    fn area_attack(&mut self) -> Result<(), ActionError>;

    /// Marker placement check.
    fn can_mark(&self, loc: MapLocation) -> bool;
    /// Place an ally marker.
    fn mark(&mut self, loc: MapLocation, secondary: bool) -> Result<(), ActionError>;

    /// Construction check; towers are built on ruins, mobile units next to towers.
    fn can_build(&self, kind: UnitType, loc: MapLocation) -> bool;
    /// Complete a structure pattern or spawn a unit.
    fn build(&mut self, kind: UnitType, loc: MapLocation) -> Result<(), ActionError>;

    /// Resource pattern completion check.
    fn can_complete_resource_pattern(&self, center: MapLocation) -> bool;
    /// Complete a resource pattern centered at `center`.
    fn complete_resource_pattern(&mut self, center: MapLocation) -> Result<(), ActionError>;

    /// Transfer check; positive gives paint, negative takes it.
    fn can_transfer_paint(&self, loc: MapLocation, amount: i32) -> bool;
    /// Transfer paint with a structure.
    fn transfer_paint(&mut self, loc: MapLocation, amount: i32) -> Result<(), ActionError>;

    /// Message delivery check for the unit at `loc`.
    fn can_send_message(&self, loc: MapLocation) -> bool;
    /// Send a payload to the unit at `loc`.
    fn send_message(&mut self, loc: MapLocation, payload: u32) -> Result<(), ActionError>;
    /// Tower-to-all-towers broadcast check.
    fn can_broadcast(&self) -> bool;
    /// Broadcast a payload to every friendly tower.
    fn broadcast(&mut self, payload: u32) -> Result<(), ActionError>;
    /// Remove and return every message received since `since_round`.
    fn drain_inbox(&mut self, since_round: u32) -> Vec<Message>;

    /// Permanently deactivate the unit.
    fn resign(&mut self);

    /// Marker on `loc`, if the tile is visible.
    fn read_marker(&self, loc: MapLocation) -> Option<PaintType> {
        self.sense_tile(loc).map(|tile| tile.mark)
    }

    /// Whether `loc` is inside the map.
    fn on_the_map(&self, loc: MapLocation) -> bool {
        let (width, height) = self.map_bounds();
        loc.is_on_map(width, height)
    }

    /// Whether `loc` is currently visible.
    fn can_sense(&self, loc: MapLocation) -> bool {
        self.sense_tile(loc).is_some()
    }

    /// Visible units of the opposing team within `radius_sq` of the unit.
    fn enemies_in_radius(&self, radius_sq: i32) -> Vec<UnitObservation> {
        self.sense_units_in_radius(
            self.current_location(),
            radius_sq,
            Some(self.team().opponent()),
        )
    }

    /// Visible friendly units within `radius_sq` of the unit.
    fn allies_in_radius(&self, radius_sq: i32) -> Vec<UnitObservation> {
        self.sense_units_in_radius(self.current_location(), radius_sq, Some(self.team()))
    }
}

/// Vision radius shared by every unit type.
pub const VISION_RADIUS_SQ: i32 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_predicates_are_total() {
        let all = [
            PaintType::Empty,
            PaintType::AllyPrimary,
            PaintType::AllySecondary,
            PaintType::EnemyPrimary,
            PaintType::EnemySecondary,
        ];
        for paint in all {
            assert!(!(paint.is_ally() && paint.is_enemy()));
            assert_eq!(paint.flipped().flipped(), paint);
            assert_eq!(paint.is_ally(), paint.flipped().is_enemy());
        }
        assert!(!PaintType::Empty.is_painted());
        assert_eq!(PaintType::ally(true), PaintType::AllySecondary);
    }

    #[test]
    fn test_unit_type_archetype() {
        assert_eq!(UnitType::Soldier.archetype(), UnitArchetype::Soldier);
        assert_eq!(
            UnitType::Tower(TowerKind::Money).archetype(),
            UnitArchetype::Tower
        );
        assert!(UnitType::Tower(TowerKind::Paint).is_tower());
        assert_eq!(Team::A.opponent(), Team::B);
    }
}
