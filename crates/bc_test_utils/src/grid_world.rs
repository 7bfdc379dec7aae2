//! In-memory engine stand-in.
//!
//! [`GridWorld`] owns the whole match: terrain, paint, marks, units, money
//! and inboxes. Controllers never touch it directly; they run against a
//! [`UnitView`], which implements [`WorldQuery`] from one unit's point of
//! view and enforces every action precondition. An action attempted without
//! its precondition holding is rejected with an [`ActionError`] and recorded
//! as a [`Violation`], so tests can assert that none ever happened.
//!
//! The rules are a compact approximation of the real game, enough to make
//! movement, painting, structure building and resupply meaningful:
//!
//! - vision radius² 20, one move and one action per round;
//! - soldiers paint single tiles (5 paint) but never over enemy paint;
//! - splashers paint radius² 4 (50 paint), overriding enemy paint within radius² 2;
//! - moppers clear enemy paint and drain enemy units;
//! - mobile units standing on enemy paint lose 2 paint at the end of the round;
//! - messages become readable the round after they are sent.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use bc_core::error::ActionError;
use bc_core::geometry::{Direction, MapLocation};
use bc_core::patterns;
use bc_core::world::{
    Message, PaintType, Team, TileObservation, TowerKind, UnitId, UnitObservation, UnitType,
    WorldQuery, VISION_RADIUS_SQ,
};
use serde::{Deserialize, Serialize};

/// Money each team starts with.
pub const STARTING_MONEY: i32 = 2500;
/// Paint a soldier spends per painted tile.
pub const SOLDIER_PAINT_COST: i32 = 5;
/// Paint a splasher spends per splash.
pub const SPLASH_PAINT_COST: i32 = 50;
/// Money needed to complete a structure.
pub const TOWER_MONEY_COST: i32 = 1000;
/// Money needed to complete a resource pattern.
pub const RESOURCE_PATTERN_COST: i32 = 200;

const SPLASH_RADIUS_SQ: i32 = 4;
const SPLASH_OVERRIDE_RADIUS_SQ: i32 = 2;
const MARK_RADIUS_SQ: i32 = 9;
const BUILD_RADIUS_SQ: i32 = 8;
const SPAWN_RADIUS_SQ: i32 = 4;
const TRANSFER_RADIUS_SQ: i32 = 2;
const ENEMY_PAINT_DRAIN: i32 = 2;

/// One map cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Permanent obstacle.
    pub wall: bool,
    /// Structure site.
    pub ruin: bool,
    /// Owner and secondary flag of the paint, if any.
    pub paint: Option<(Team, bool)>,
    /// Per-team marker, indexed by [`team_index`].
    pub marks: [Option<bool>; 2],
}

impl Cell {
    /// Units may stand here.
    #[must_use]
    pub const fn passable(&self) -> bool {
        !self.wall && !self.ruin
    }

    /// Paint as seen by `viewer`.
    #[must_use]
    pub fn paint_for(&self, viewer: Team) -> PaintType {
        match self.paint {
            None => PaintType::Empty,
            Some((owner, secondary)) if owner == viewer => PaintType::ally(secondary),
            Some((_, secondary)) => PaintType::ally(secondary).flipped(),
        }
    }
}

/// Stable index of a team into per-team arrays.
#[must_use]
pub const fn team_index(team: Team) -> usize {
    match team {
        Team::A => 0,
        Team::B => 1,
    }
}

/// Full engine-side record of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Identifier.
    pub id: UnitId,
    /// Owner.
    pub team: Team,
    /// Type.
    pub unit_type: UnitType,
    /// Position.
    pub location: MapLocation,
    /// Remaining health.
    pub health: i32,
    /// Paint held.
    pub paint: i32,
    /// Last round the unit moved.
    pub moved_round: u32,
    /// Last round the unit used its action.
    pub acted_round: u32,
    /// Last round a tower used its area attack.
    pub area_round: u32,
    /// Last round a tower broadcast.
    pub broadcast_round: u32,
    /// Round the message quota refers to.
    pub message_round: u32,
    /// Messages sent in `message_round`.
    pub messages_sent: u32,
    /// The unit resigned.
    pub resigned: bool,
    /// Undelivered messages.
    pub inbox: Vec<Message>,
}

/// Maximum health of a unit type.
#[must_use]
pub const fn max_health(unit_type: UnitType) -> i32 {
    match unit_type {
        UnitType::Soldier => 250,
        UnitType::Mopper => 50,
        UnitType::Splasher => 150,
        UnitType::Tower(_) => 1000,
    }
}

/// Money and paint a tower pays to spawn a mobile unit.
#[must_use]
pub const fn spawn_cost(unit_type: UnitType) -> Option<(i32, i32)> {
    match unit_type {
        UnitType::Soldier => Some((250, 200)),
        UnitType::Mopper => Some((300, 100)),
        UnitType::Splasher => Some((400, 300)),
        UnitType::Tower(_) => None,
    }
}

const fn message_quota(unit_type: UnitType) -> u32 {
    if unit_type.is_tower() {
        20
    } else {
        1
    }
}

/// An action attempted while its precondition did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Round of the attempt.
    pub round: u32,
    /// Offending unit.
    pub unit: UnitId,
    /// What was attempted.
    pub action: String,
}

/// The whole match state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridWorld {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    units: BTreeMap<UnitId, UnitRecord>,
    money: [i32; 2],
    round: u32,
    next_id: u32,
    resource_patterns: BTreeSet<(usize, MapLocation)>,
    violations: Vec<Violation>,
}

impl GridWorld {
    /// Empty open map. Coordinates must stay below 64 to fit the message codec.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(1, 64);
        let height = height.clamp(1, 64);
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width * height) as usize],
            units: BTreeMap::new(),
            money: [STARTING_MONEY; 2],
            round: 0,
            next_id: 1,
            resource_patterns: BTreeSet::new(),
            violations: Vec::new(),
        }
    }

    /// Map `(width, height)`.
    #[must_use]
    pub fn bounds(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Current round; 0 before the first [`GridWorld::begin_round`].
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    fn index(&self, loc: MapLocation) -> Option<usize> {
        loc.is_on_map(self.width, self.height)
            .then(|| (loc.y * self.width + loc.x) as usize)
    }

    /// Cell at `loc`, if on the map.
    #[must_use]
    pub fn cell(&self, loc: MapLocation) -> Option<&Cell> {
        self.index(loc).map(|i| &self.cells[i])
    }

    fn cell_mut(&mut self, loc: MapLocation) -> Option<&mut Cell> {
        self.index(loc).map(move |i| &mut self.cells[i])
    }

    /// Place or clear a wall.
    pub fn set_wall(&mut self, loc: MapLocation, wall: bool) {
        if let Some(cell) = self.cell_mut(loc) {
            cell.wall = wall;
        }
    }

    /// Place a structure site.
    pub fn set_ruin(&mut self, loc: MapLocation) {
        if let Some(cell) = self.cell_mut(loc) {
            cell.ruin = true;
        }
    }

    /// Overwrite the paint of a cell.
    pub fn set_paint(&mut self, loc: MapLocation, paint: Option<(Team, bool)>) {
        if let Some(cell) = self.cell_mut(loc) {
            cell.paint = paint;
        }
    }

    /// Team money.
    #[must_use]
    pub fn money(&self, team: Team) -> i32 {
        self.money[team_index(team)]
    }

    /// Overwrite team money.
    pub fn set_money(&mut self, team: Team, money: i32) {
        self.money[team_index(team)] = money;
    }

    /// Put a unit on the map. Structures are placed on a ruin, which is
    /// created if missing. Returns `None` when the cell is off the map,
    /// a wall, or occupied.
    pub fn add_unit(
        &mut self,
        team: Team,
        unit_type: UnitType,
        location: MapLocation,
    ) -> Option<UnitId> {
        let cell = *self.cell(location)?;
        if cell.wall || self.unit_at(location).is_some() {
            return None;
        }
        if unit_type.is_tower() {
            self.set_ruin(location);
        } else if cell.ruin {
            return None;
        }
        let id = UnitId(self.next_id);
        self.next_id += 1;
        let paint = match unit_type {
            UnitType::Tower(TowerKind::Paint) => 500,
            UnitType::Tower(_) => 100,
            mobile => mobile.paint_capacity(),
        };
        self.units.insert(
            id,
            UnitRecord {
                id,
                team,
                unit_type,
                location,
                health: max_health(unit_type),
                paint,
                moved_round: 0,
                acted_round: 0,
                area_round: 0,
                broadcast_round: 0,
                message_round: 0,
                messages_sent: 0,
                resigned: false,
                inbox: Vec::new(),
            },
        );
        Some(id)
    }

    /// Unit record by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitRecord> {
        self.units.get(&id)
    }

    /// Mutable unit record by id.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut UnitRecord> {
        self.units.get_mut(&id)
    }

    /// Every live unit, in id order.
    pub fn units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.values()
    }

    /// Ids of every live unit, in id order.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// The unit on `loc`.
    #[must_use]
    pub fn unit_at(&self, loc: MapLocation) -> Option<&UnitRecord> {
        self.units.values().find(|unit| unit.location == loc)
    }

    /// Move a unit without any checks, for test setup.
    pub fn teleport(&mut self, id: UnitId, loc: MapLocation) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.location = loc;
        }
    }

    /// Recorded precondition violations.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Friendly structures of `team`.
    #[must_use]
    pub fn tower_count(&self, team: Team) -> usize {
        self.units
            .values()
            .filter(|unit| unit.team == team && unit.unit_type.is_tower())
            .count()
    }

    /// Cells painted by `team`.
    #[must_use]
    pub fn painted_count(&self, team: Team) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.paint.is_some_and(|(owner, _)| owner == team))
            .count()
    }

    /// Resource patterns completed by `team`.
    #[must_use]
    pub fn resource_pattern_count(&self, team: Team) -> usize {
        let index = team_index(team);
        self.resource_patterns
            .iter()
            .filter(|(owner, _)| *owner == index)
            .count()
    }

    /// Advance to the next round.
    pub fn begin_round(&mut self) {
        self.round += 1;
    }

    /// End-of-round upkeep: income, tower paint production and the enemy
    /// paint drain on mobile units.
    pub fn end_round(&mut self) {
        let mut income = [0; 2];
        for (team, _) in &self.resource_patterns {
            income[*team] += 3;
        }
        let cells = &self.cells;
        let width = self.width;
        for unit in self.units.values_mut() {
            let team = team_index(unit.team);
            match unit.unit_type {
                UnitType::Tower(TowerKind::Money) => income[team] += 20,
                UnitType::Tower(TowerKind::Paint) => {
                    income[team] += 10;
                    unit.paint = (unit.paint + 10).min(unit.unit_type.paint_capacity());
                }
                UnitType::Tower(TowerKind::Defense) => income[team] += 10,
                UnitType::Soldier | UnitType::Mopper | UnitType::Splasher => {
                    let index = (unit.location.y * width + unit.location.x) as usize;
                    let on_enemy = cells
                        .get(index)
                        .and_then(|cell| cell.paint)
                        .is_some_and(|(owner, _)| owner != unit.team);
                    if on_enemy {
                        unit.paint = (unit.paint - ENEMY_PAINT_DRAIN).max(0);
                    }
                }
            }
        }
        for (money, earned) in self.money.iter_mut().zip(income) {
            *money += earned;
        }
    }

    /// Controller-facing view for one unit, if it is alive.
    pub fn view(&mut self, id: UnitId) -> Option<UnitView<'_>> {
        if self.units.contains_key(&id) {
            Some(UnitView { world: self, unit: id })
        } else {
            None
        }
    }

    /// Hash of the complete match state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        match bincode::serialize(self) {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => {
                tracing::warn!(%err, "state snapshot failed, hashing debug form");
                format!("{self:?}").hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    fn damage(&mut self, target: UnitId, amount: i32) {
        let Some(unit) = self.units.get_mut(&target) else {
            return;
        };
        unit.health -= amount;
        if unit.health <= 0 {
            tracing::debug!(unit = target.0, at = %unit.location, "unit destroyed");
            self.units.remove(&target);
        }
    }

    fn resource_pattern_matches(&self, team: Team, center: MapLocation) -> bool {
        patterns::footprint().all(|(dx, dy)| {
            let loc = center.translate(dx, dy);
            self.cell(loc).is_some_and(|cell| {
                cell.passable() && cell.paint == Some((team, patterns::resource_secondary(loc)))
            })
        })
    }

    fn tower_pattern_matches(&self, team: Team, kind: TowerKind, ruin: MapLocation) -> bool {
        patterns::footprint().all(|(dx, dy)| match patterns::tower_cell(kind, dx, dy) {
            None => true,
            Some(required) => self
                .cell(ruin.translate(dx, dy))
                .is_some_and(|cell| cell.paint_for(team) == required),
        })
    }
}

/// [`WorldQuery`] implementation scoped to one unit.
pub struct UnitView<'a> {
    world: &'a mut GridWorld,
    unit: UnitId,
}

impl UnitView<'_> {
    fn me(&self) -> &UnitRecord {
        &self.world.units[&self.unit]
    }

    fn me_mut(&mut self) -> &mut UnitRecord {
        self.world
            .units
            .get_mut(&self.unit)
            .unwrap_or_else(|| unreachable!("a unit cannot die during its own tick"))
    }

    fn visible(&self, loc: MapLocation) -> bool {
        self.world.index(loc).is_some()
            && self.me().location.is_within_distance_squared(loc, VISION_RADIUS_SQ)
    }

    fn action_ready(&self) -> bool {
        let me = self.me();
        !me.resigned && me.acted_round != self.world.round
    }

    fn observe(&self, unit: &UnitRecord) -> UnitObservation {
        UnitObservation {
            id: unit.id,
            location: unit.location,
            unit_type: unit.unit_type,
            team: unit.team,
            health: unit.health,
            paint: unit.paint,
        }
    }

    fn check(&mut self, ok: bool, err: ActionError) -> Result<(), ActionError> {
        if self.me().resigned {
            return Err(ActionError::Resigned);
        }
        if ok {
            return Ok(());
        }
        tracing::warn!(unit = self.unit.0, round = self.world.round, %err, "illegal action");
        self.world.violations.push(Violation {
            round: self.world.round,
            unit: self.unit,
            action: err.to_string(),
        });
        Err(err)
    }

    fn enemy_at(&self, loc: MapLocation) -> Option<&UnitRecord> {
        let team = self.me().team;
        self.world.unit_at(loc).filter(|unit| unit.team != team)
    }

    fn swing_targets(&self, dir: Direction) -> Vec<UnitId> {
        let origin = self.me().location;
        let (sx, sy) = dir.rotate_right().rotate_right().offset();
        (1..=2)
            .flat_map(|depth| {
                let row = origin.step(dir, depth);
                (-1..=1).map(move |side| row.translate(sx * side, sy * side))
            })
            .filter_map(|loc| self.enemy_at(loc))
            .filter(|unit| !unit.unit_type.is_tower())
            .map(|unit| unit.id)
            .collect()
    }
}

impl WorldQuery for UnitView<'_> {
    fn round(&self) -> u32 {
        self.world.round
    }

    fn id(&self) -> UnitId {
        self.unit
    }

    fn team(&self) -> Team {
        self.me().team
    }

    fn unit_type(&self) -> UnitType {
        self.me().unit_type
    }

    fn current_location(&self) -> MapLocation {
        self.me().location
    }

    fn map_bounds(&self) -> (i32, i32) {
        self.world.bounds()
    }

    fn paint(&self) -> i32 {
        self.me().paint
    }

    fn money(&self) -> i32 {
        self.world.money(self.me().team)
    }

    fn tower_count(&self) -> usize {
        self.world.tower_count(self.me().team)
    }

    fn is_movement_ready(&self) -> bool {
        let me = self.me();
        !me.resigned && !me.unit_type.is_tower() && me.moved_round != self.world.round
    }

    fn is_action_ready(&self) -> bool {
        self.action_ready()
    }

    fn sense_tile(&self, loc: MapLocation) -> Option<TileObservation> {
        if !self.visible(loc) {
            return None;
        }
        let team = self.me().team;
        let cell = self.world.cell(loc)?;
        Some(TileObservation {
            location: loc,
            paint: cell.paint_for(team),
            mark: cell.marks[team_index(team)].map_or(PaintType::Empty, PaintType::ally),
            passable: cell.passable(),
            wall: cell.wall,
            ruin: cell.ruin,
        })
    }

    fn sense_tiles_in_radius(&self, center: MapLocation, radius_sq: i32) -> Vec<TileObservation> {
        let reach = f64::from(radius_sq.max(0)).sqrt() as i32;
        let mut tiles = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let loc = center.translate(dx, dy);
                if center.is_within_distance_squared(loc, radius_sq) {
                    if let Some(tile) = self.sense_tile(loc) {
                        tiles.push(tile);
                    }
                }
            }
        }
        tiles
    }

    fn sense_units_in_radius(
        &self,
        center: MapLocation,
        radius_sq: i32,
        team: Option<Team>,
    ) -> Vec<UnitObservation> {
        self.world
            .units
            .values()
            .filter(|unit| unit.id != self.unit)
            .filter(|unit| team.map_or(true, |team| unit.team == team))
            .filter(|unit| center.is_within_distance_squared(unit.location, radius_sq))
            .filter(|unit| self.visible(unit.location))
            .map(|unit| self.observe(unit))
            .collect()
    }

    fn sense_unit_at(&self, loc: MapLocation) -> Option<UnitObservation> {
        if !self.visible(loc) {
            return None;
        }
        self.world.unit_at(loc).map(|unit| self.observe(unit))
    }

    fn can_move(&self, dir: Direction) -> bool {
        if dir == Direction::Center || !self.is_movement_ready() {
            return false;
        }
        let to = self.me().location.add(dir);
        self.world.cell(to).is_some_and(Cell::passable) && self.world.unit_at(to).is_none()
    }

    fn move_unit(&mut self, dir: Direction) -> Result<(), ActionError> {
        let from = self.me().location;
        self.check(self.can_move(dir), ActionError::CannotMove { from, direction: dir })?;
        let round = self.world.round;
        let me = self.me_mut();
        me.location = from.add(dir);
        me.moved_round = round;
        Ok(())
    }

    fn can_act_on(&self, loc: MapLocation) -> bool {
        if !self.action_ready() {
            return false;
        }
        let me = self.me();
        if !me.location.is_within_distance_squared(loc, me.unit_type.action_radius_sq()) {
            return false;
        }
        let Some(cell) = self.world.cell(loc) else {
            return false;
        };
        let enemy = self.enemy_at(loc);
        match me.unit_type {
            UnitType::Soldier => {
                me.paint >= SOLDIER_PAINT_COST
                    && (enemy.is_some_and(|unit| unit.unit_type.is_tower())
                        || (cell.passable() && !cell.paint_for(me.team).is_enemy()))
            }
            UnitType::Splasher => me.paint >= SPLASH_PAINT_COST && !cell.wall,
            UnitType::Mopper => {
                enemy.is_some_and(|unit| !unit.unit_type.is_tower())
                    || cell.paint_for(me.team).is_enemy()
            }
            UnitType::Tower(_) => enemy.is_some_and(|unit| !unit.unit_type.is_tower()),
        }
    }

    fn act(&mut self, loc: MapLocation, secondary: bool) -> Result<(), ActionError> {
        self.check(self.can_act_on(loc), ActionError::CannotAttack(loc))?;
        let round = self.world.round;
        let (team, unit_type) = (self.me().team, self.me().unit_type);
        let enemy = self.enemy_at(loc).map(|unit| (unit.id, unit.unit_type));
        self.me_mut().acted_round = round;
        match unit_type {
            UnitType::Soldier => {
                self.me_mut().paint -= SOLDIER_PAINT_COST;
                match enemy {
                    Some((target, kind)) if kind.is_tower() => self.world.damage(target, 20),
                    _ => self.world.set_paint(loc, Some((team, secondary))),
                }
            }
            UnitType::Splasher => {
                self.me_mut().paint -= SPLASH_PAINT_COST;
                let reach = 2;
                for dx in -reach..=reach {
                    for dy in -reach..=reach {
                        let cell_loc = loc.translate(dx, dy);
                        if !loc.is_within_distance_squared(cell_loc, SPLASH_RADIUS_SQ) {
                            continue;
                        }
                        if let Some(target) = self
                            .world
                            .unit_at(cell_loc)
                            .filter(|unit| unit.team != team && unit.unit_type.is_tower())
                            .map(|unit| unit.id)
                        {
                            self.world.damage(target, 50);
                        }
                        let Some(cell) = self.world.cell_mut(cell_loc) else {
                            continue;
                        };
                        if !cell.passable() {
                            continue;
                        }
                        let enemy_paint = cell.paint.is_some_and(|(owner, _)| owner != team);
                        if enemy_paint
                            && !loc.is_within_distance_squared(cell_loc, SPLASH_OVERRIDE_RADIUS_SQ)
                        {
                            continue;
                        }
                        cell.paint = Some((team, secondary));
                    }
                }
            }
            UnitType::Mopper => {
                if let Some((target, _)) = enemy {
                    if let Some(victim) = self.world.units.get_mut(&target) {
                        victim.paint = (victim.paint - 10).max(0);
                    }
                    let me = self.me_mut();
                    me.paint = (me.paint + 5).min(me.unit_type.paint_capacity());
                }
                if let Some(cell) = self.world.cell_mut(loc) {
                    if cell.paint.is_some_and(|(owner, _)| owner != team) {
                        cell.paint = None;
                    }
                }
            }
            UnitType::Tower(_) => {
                if let Some((target, _)) = enemy {
                    self.world.damage(target, 20);
                }
            }
        }
        Ok(())
    }

    fn can_swing(&self, dir: Direction) -> bool {
        self.action_ready()
            && self.me().unit_type == UnitType::Mopper
            && Direction::CARDINAL.contains(&dir)
    }

    fn swing(&mut self, dir: Direction) -> Result<(), ActionError> {
        self.check(self.can_swing(dir), ActionError::CannotSwing(dir))?;
        let round = self.world.round;
        self.me_mut().acted_round = round;
        for target in self.swing_targets(dir) {
            if let Some(victim) = self.world.units.get_mut(&target) {
                victim.paint = (victim.paint - 5).max(0);
            }
        }
        Ok(())
    }

    fn can_area_attack(&self) -> bool {
        let me = self.me();
        !me.resigned && me.unit_type.is_tower() && me.area_round != self.world.round
    }

    fn area_attack(&mut self) -> Result<(), ActionError> {
        let at = self.me().location;
        self.check(self.can_area_attack(), ActionError::CannotAttack(at))?;
        let round = self.world.round;
        self.me_mut().area_round = round;
        let radius = self.me().unit_type.action_radius_sq();
        let targets: Vec<UnitId> = self
            .enemies_in_radius(radius)
            .into_iter()
            .filter(|unit| !unit.unit_type.is_tower())
            .map(|unit| unit.id)
            .collect();
        for target in targets {
            self.world.damage(target, 10);
        }
        Ok(())
    }

    fn can_mark(&self, loc: MapLocation) -> bool {
        let me = self.me();
        !me.resigned
            && me.unit_type == UnitType::Soldier
            && me.location.is_within_distance_squared(loc, MARK_RADIUS_SQ)
            && self.world.cell(loc).is_some_and(Cell::passable)
    }

    fn mark(&mut self, loc: MapLocation, secondary: bool) -> Result<(), ActionError> {
        self.check(self.can_mark(loc), ActionError::CannotMark(loc))?;
        let team = team_index(self.me().team);
        if let Some(cell) = self.world.cell_mut(loc) {
            cell.marks[team] = Some(secondary);
        }
        Ok(())
    }

    fn can_build(&self, kind: UnitType, loc: MapLocation) -> bool {
        let me = self.me();
        if me.resigned || self.world.unit_at(loc).is_some() {
            return false;
        }
        let Some(cell) = self.world.cell(loc) else {
            return false;
        };
        match (me.unit_type, kind) {
            (UnitType::Tower(_), mobile) => spawn_cost(mobile).is_some_and(|(money, paint)| {
                self.action_ready()
                    && cell.passable()
                    && me.location.is_within_distance_squared(loc, SPAWN_RADIUS_SQ)
                    && self.world.money(me.team) >= money
                    && me.paint >= paint
            }),
            (UnitType::Soldier, UnitType::Tower(tower)) => {
                cell.ruin
                    && me.location.is_within_distance_squared(loc, BUILD_RADIUS_SQ)
                    && self.world.money(me.team) >= TOWER_MONEY_COST
                    && self.world.tower_pattern_matches(me.team, tower, loc)
            }
            _ => false,
        }
    }

    fn build(&mut self, kind: UnitType, loc: MapLocation) -> Result<(), ActionError> {
        self.check(
            self.can_build(kind, loc),
            ActionError::CannotBuild { kind, location: loc },
        )?;
        let team = self.me().team;
        let round = self.world.round;
        let money = match spawn_cost(kind) {
            Some((money, paint)) => {
                let me = self.me_mut();
                me.paint -= paint;
                me.acted_round = round;
                money
            }
            None => TOWER_MONEY_COST,
        };
        self.world.money[team_index(team)] -= money;
        self.world.add_unit(team, kind, loc);
        tracing::trace!(unit = ?kind, at = %loc, "built");
        Ok(())
    }

    fn can_complete_resource_pattern(&self, center: MapLocation) -> bool {
        let me = self.me();
        !me.resigned
            && me.unit_type == UnitType::Soldier
            && patterns::is_resource_center(center)
            && me.location.is_within_distance_squared(center, BUILD_RADIUS_SQ)
            && self.world.money(me.team) >= RESOURCE_PATTERN_COST
            && !self
                .world
                .resource_patterns
                .contains(&(team_index(me.team), center))
            && self.world.resource_pattern_matches(me.team, center)
    }

    fn complete_resource_pattern(&mut self, center: MapLocation) -> Result<(), ActionError> {
        self.check(
            self.can_complete_resource_pattern(center),
            ActionError::CannotComplete(center),
        )?;
        let team = team_index(self.me().team);
        self.world.money[team] -= RESOURCE_PATTERN_COST;
        self.world.resource_patterns.insert((team, center));
        Ok(())
    }

    fn can_transfer_paint(&self, loc: MapLocation, amount: i32) -> bool {
        let me = self.me();
        if amount == 0 || me.unit_type.is_tower() || !self.action_ready() {
            return false;
        }
        if !me.location.is_within_distance_squared(loc, TRANSFER_RADIUS_SQ) {
            return false;
        }
        let Some(tower) = self
            .world
            .unit_at(loc)
            .filter(|unit| unit.team == me.team && unit.unit_type.is_tower())
        else {
            return false;
        };
        if amount > 0 {
            me.paint >= amount
        } else {
            tower.paint >= -amount && me.paint - amount <= me.unit_type.paint_capacity()
        }
    }

    fn transfer_paint(&mut self, loc: MapLocation, amount: i32) -> Result<(), ActionError> {
        self.check(
            self.can_transfer_paint(loc, amount),
            ActionError::CannotTransfer { location: loc, amount },
        )?;
        let round = self.world.round;
        let me = self.me_mut();
        me.paint -= amount;
        me.acted_round = round;
        let tower = self.world.unit_at(loc).map(|unit| unit.id);
        if let Some(tower) = tower.and_then(|id| self.world.units.get_mut(&id)) {
            tower.paint += amount;
        }
        Ok(())
    }

    fn can_send_message(&self, loc: MapLocation) -> bool {
        let me = self.me();
        if me.resigned || !me.location.is_within_distance_squared(loc, VISION_RADIUS_SQ) {
            return false;
        }
        let quota_left = me.message_round != self.world.round
            || me.messages_sent < message_quota(me.unit_type);
        quota_left
            && self.world.unit_at(loc).is_some_and(|unit| {
                unit.id != me.id
                    && unit.team == me.team
                    && unit.unit_type.is_tower() != me.unit_type.is_tower()
            })
    }

    fn send_message(&mut self, loc: MapLocation, payload: u32) -> Result<(), ActionError> {
        self.check(self.can_send_message(loc), ActionError::CannotMessage(loc))?;
        let round = self.world.round;
        let sender = self.unit;
        let me = self.me_mut();
        if me.message_round != round {
            me.message_round = round;
            me.messages_sent = 0;
        }
        me.messages_sent += 1;
        let recipient = self.world.unit_at(loc).map(|unit| unit.id);
        if let Some(unit) = recipient.and_then(|id| self.world.units.get_mut(&id)) {
            unit.inbox.push(Message { sender, round, payload });
        }
        Ok(())
    }

    fn can_broadcast(&self) -> bool {
        let me = self.me();
        !me.resigned && me.unit_type.is_tower() && me.broadcast_round != self.world.round
    }

    fn broadcast(&mut self, payload: u32) -> Result<(), ActionError> {
        let at = self.me().location;
        self.check(self.can_broadcast(), ActionError::CannotMessage(at))?;
        let round = self.world.round;
        let sender = self.unit;
        let team = self.me().team;
        self.me_mut().broadcast_round = round;
        for unit in self.world.units.values_mut() {
            if unit.id != sender && unit.team == team && unit.unit_type.is_tower() {
                unit.inbox.push(Message { sender, round, payload });
            }
        }
        Ok(())
    }

    fn drain_inbox(&mut self, since_round: u32) -> Vec<Message> {
        let round = self.world.round;
        let me = self.me_mut();
        let (ready, waiting): (Vec<Message>, Vec<Message>) =
            me.inbox.drain(..).partition(|message| message.round < round);
        me.inbox = waiting;
        ready
            .into_iter()
            .filter(|message| message.round >= since_round)
            .collect()
    }

    fn resign(&mut self) {
        self.me_mut().resigned = true;
    }
}
