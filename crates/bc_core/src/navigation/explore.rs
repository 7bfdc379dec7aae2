//! Exploration and unstick helpers built on top of [`Navigator::pathfind`].
//!
//! These pick *where* to go next (a frontier cell, a map corner, a random
//! neighbour) and leave the stepping to the pathfinder. All randomness comes
//! from the caller's RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{greedy, Navigator};
use crate::geometry::{Direction, MapLocation};
use crate::world::{PaintType, WorldQuery};

/// Frontier candidates two cells out, on the 8 compass points.
const FRONTIER_OFFSETS: [(i32, i32); 8] = [
    (-2, -2),
    (-2, 0),
    (-2, 2),
    (0, -2),
    (0, 2),
    (2, -2),
    (2, 0),
    (2, 2),
];

/// Diagonal probes used to decide whether the current frontier is still worth it.
const BREAK_OFFSETS: [(i32, i32); 4] = [(2, 2), (2, -2), (-2, 2), (-2, -2)];

const FRONTIER_BASE_SCORE: i32 = 30;
const CLOSER_BONUS: i32 = 20;
const EQUAL_BONUS: i32 = 10;
const UNPAINTED_WEIGHT: i32 = 5;
const RANDOM_WALK_TRIES: usize = 5;

/// Exploration targets kept across navigation resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanderState {
    /// Current provisional frontier cell.
    pub frontier: Option<MapLocation>,
    /// Corner the unstick helper is heading for.
    pub corner: Option<MapLocation>,
    /// Round the corner was picked.
    pub corner_round: u32,
}

/// Count empty, passable, unoccupied cells in the 3x3 block around `center`.
pub fn count_empty_around<W: WorldQuery + ?Sized>(world: &W, center: MapLocation) -> i32 {
    world
        .sense_tiles_in_radius(center, 2)
        .iter()
        .filter(|tile| {
            tile.paint == PaintType::Empty
                && tile.passable
                && world.sense_unit_at(tile.location).is_none()
        })
        .count() as i32
}

/// Score the 3x3 block around `center` as an exploration frontier.
///
/// Starts from a base of 30: +3 per empty passable cell, -2 per impassable
/// cell, -3 per ally-occupied cell, and +5 per enemy-painted cell when
/// `care_about_enemy` is set.
pub fn score_tile<W: WorldQuery + ?Sized>(
    world: &W,
    center: MapLocation,
    care_about_enemy: bool,
) -> i32 {
    let team = world.team();
    let mut score = FRONTIER_BASE_SCORE;
    for tile in world.sense_tiles_in_radius(center, 2) {
        if care_about_enemy && tile.paint.is_enemy() {
            score += 5;
        }
        if tile.paint == PaintType::Empty && tile.passable {
            score += 3;
        }
        if !tile.passable {
            score -= 2;
        }
        if world
            .sense_unit_at(tile.location)
            .is_some_and(|unit| unit.team == team)
        {
            score -= 3;
        }
    }
    score
}

/// Draw an index with probability proportional to `weights`.
///
/// Returns `None` when every weight is zero.
pub fn weighted_pick<R: Rng>(weights: &[i32], rng: &mut R) -> Option<usize> {
    let total: i32 = weights.iter().map(|w| (*w).max(0)).sum();
    if total <= 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (index, weight) in weights.iter().enumerate() {
        let weight = (*weight).max(0);
        if roll < weight {
            return Some(index);
        }
        roll -= weight;
    }
    None
}

/// Normalize frontier scores so the worst candidate keeps weight 1 (or 0
/// when it scored exactly 0). Off-map candidates score 0, take part in the
/// minimum and always end up with weight 0.
fn frontier_weights(scores: &[Option<i32>; 8]) -> [i32; 8] {
    let min = scores.iter().map(|score| score.unwrap_or(0)).min().unwrap_or(0);
    let floor = if min != 0 { min - 1 } else { 0 };
    scores.map(|score| score.map_or(0, |s| s - floor))
}

impl Navigator {
    /// Weighted-random frontier exploration toward `target`.
    ///
    /// A provisional frontier two cells away is kept until reached, found
    /// blocked up close, or abandoned because the surroundings of the unit
    /// score above the break threshold.
    pub fn explore_toward<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        target: MapLocation,
        care_about_enemy: bool,
        rng: &mut R,
    ) -> Option<Direction> {
        let current = world.current_location();

        if self.wander.frontier.is_some() {
            let best = BREAK_OFFSETS
                .iter()
                .map(|&(dx, dy)| current.translate(dx, dy))
                .filter(|&loc| world.on_the_map(loc))
                .map(|loc| score_tile(world, loc, false))
                .max()
                .unwrap_or(0);
            if best > self.settings.explore_break_score {
                self.wander.frontier = None;
                self.reset();
            }
        }

        let stale = match self.wander.frontier {
            None => true,
            Some(frontier) if frontier == current => {
                self.reset();
                true
            }
            Some(frontier) => {
                current.is_within_distance_squared(frontier, 2)
                    && !world.sense_tile(frontier).is_some_and(|tile| tile.passable)
            }
        };

        if stale {
            let current_distance = current.distance_squared_to(target);
            let scores = FRONTIER_OFFSETS.map(|(dx, dy)| {
                let candidate = current.translate(dx, dy);
                if !world.on_the_map(candidate) {
                    return None;
                }
                let distance = candidate.distance_squared_to(target);
                let bonus = if distance < current_distance {
                    CLOSER_BONUS
                } else if distance == current_distance {
                    EQUAL_BONUS
                } else {
                    0
                };
                Some(score_tile(world, candidate, care_about_enemy) + bonus)
            });
            let weights = frontier_weights(&scores);
            self.wander.frontier = weighted_pick(&weights, rng).map(|index| {
                let (dx, dy) = FRONTIER_OFFSETS[index];
                current.translate(dx, dy)
            });
        }

        let frontier = self.wander.frontier?;
        self.pathfind(world, frontier)
    }

    /// Head for unpainted ground: choose among adjacent empty cells, weighted
    /// by how much empty space lies behind each one.
    pub fn explore_unpainted<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<Direction> {
        let current = world.current_location();
        let mut candidates: Vec<MapLocation> = Direction::ALL
            .into_iter()
            .filter(|&dir| world.can_move(dir))
            .map(|dir| current.add(dir))
            .filter(|&loc| {
                !self.recent.contains(loc)
                    && world
                        .sense_tile(loc)
                        .is_some_and(|tile| tile.paint == PaintType::Empty)
            })
            .collect();
        if candidates.is_empty() {
            candidates = Direction::ALL
                .into_iter()
                .map(|dir| current.step(dir, 2))
                .filter(|&loc| world.sense_tile(loc).is_some_and(|tile| tile.passable))
                .collect();
        }
        let choice = tiebreak_unpainted(world, &candidates, rng)?;
        self.pathfind(world, choice)
    }

    /// One step of the unstick routine: a random walk with the configured
    /// probability, otherwise head for the far corner.
    pub fn unstick<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<Direction> {
        if rng.gen_bool(self.settings.random_step_probability) {
            return self.random_walk(world, rng);
        }
        let corner = self.refresh_corner(world, far_corner);
        self.pathfind(world, corner)
    }

    /// Unstick variant for builders: weighted frontier exploration toward a
    /// randomly chosen corner, caring about enemy paint.
    pub fn unstick_exploring<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<Direction> {
        let pick_x: bool = rng.gen();
        let pick_y: bool = rng.gen();
        let corner = self.refresh_corner(world, |_, width, height| {
            MapLocation::new(
                if pick_x { width - 1 } else { 0 },
                if pick_y { height - 1 } else { 0 },
            )
        });
        self.explore_toward(world, corner, true, rng)
    }

    /// Random movable neighbour that was not visited recently.
    pub fn random_walk<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<Direction> {
        let current = world.current_location();
        for _ in 0..RANDOM_WALK_TRIES {
            let dir = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
            if world.can_move(dir) && !self.recent.contains(current.add(dir)) {
                return Some(dir);
            }
        }
        greedy::fallback(world, &self.recent)
    }

    /// Random movable neighbour on ally paint.
    pub fn random_painted_walk<W: WorldQuery + ?Sized, R: Rng>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<Direction> {
        let current = world.current_location();
        let painted: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|&dir| {
                world.can_move(dir)
                    && world
                        .sense_tile(current.add(dir))
                        .is_some_and(|tile| tile.paint.is_ally())
            })
            .collect();
        if painted.is_empty() {
            return None;
        }
        Some(painted[rng.gen_range(0..painted.len())])
    }

    fn refresh_corner<W, F>(&mut self, world: &W, choose: F) -> MapLocation
    where
        W: WorldQuery + ?Sized,
        F: FnOnce(MapLocation, i32, i32) -> MapLocation,
    {
        let current = world.current_location();
        let round = world.round();
        let expired = match self.wander.corner {
            None => true,
            Some(corner) => {
                current.is_within_distance_squared(corner, self.settings.corner_reached_distance_sq)
                    || round.saturating_sub(self.wander.corner_round)
                        >= self.settings.corner_refresh_rounds
            }
        };
        match self.wander.corner {
            Some(corner) if !expired => corner,
            _ => {
                let (width, height) = world.map_bounds();
                let corner = choose(current, width, height);
                tracing::trace!(corner = %corner, "new corner target");
                self.wander.corner = Some(corner);
                self.wander.corner_round = round;
                corner
            }
        }
    }
}

/// The map corner diagonally opposite the unit's half of the map.
#[must_use]
pub fn far_corner(current: MapLocation, width: i32, height: i32) -> MapLocation {
    MapLocation::new(
        if current.x < width / 2 { width - 1 } else { 0 },
        if current.y < height / 2 { height - 1 } else { 0 },
    )
}

/// Weighted random choice among `candidates`, each weighted by the empty
/// space in the 3x3 block one step further out in the same direction.
pub fn tiebreak_unpainted<W: WorldQuery + ?Sized, R: Rng>(
    world: &W,
    candidates: &[MapLocation],
    rng: &mut R,
) -> Option<MapLocation> {
    let weights = unpainted_weights(world, candidates);
    weighted_pick(&weights, rng).map(|index| candidates[index])
}

/// Weights used by [`tiebreak_unpainted`]: five per empty, passable,
/// unoccupied cell in the 3x3 block one step beyond each candidate.
#[must_use]
pub fn unpainted_weights<W: WorldQuery + ?Sized>(
    world: &W,
    candidates: &[MapLocation],
) -> Vec<i32> {
    let current = world.current_location();
    candidates
        .iter()
        .map(|&loc| {
            let beyond = loc.add(current.direction_to(loc));
            UNPAINTED_WEIGHT * count_empty_around(world, beyond)
        })
        .collect()
}
