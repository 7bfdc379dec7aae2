//! Greedy neighbour selection and the escalation wall probe.

use super::RecentVisits;
use crate::geometry::{Direction, MapLocation};
use crate::world::{PaintType, WorldQuery};

/// Lower is better: ally paint, then bare ground, then enemy paint.
const fn paint_rank(paint: PaintType) -> u8 {
    match paint {
        PaintType::AllyPrimary | PaintType::AllySecondary => 0,
        PaintType::Empty => 1,
        PaintType::EnemyPrimary | PaintType::EnemySecondary => 2,
    }
}

/// Pick the movable neighbour minimizing `(distance, paint rank, recently visited)`.
///
/// Ties beyond that key keep the first direction in clockwise order from
/// north, so the choice is deterministic.
pub(super) fn step<W: WorldQuery + ?Sized>(
    world: &W,
    target: MapLocation,
    recent: &RecentVisits,
) -> Option<Direction> {
    let current = world.current_location();
    let mut best: Option<(Direction, (i32, u8, bool))> = None;
    for dir in Direction::ALL {
        if !world.can_move(dir) {
            continue;
        }
        let next = current.add(dir);
        let Some(tile) = world.sense_tile(next) else {
            continue;
        };
        let key = (
            next.distance_squared_to(target),
            paint_rank(tile.paint),
            recent.contains(next),
        );
        if best.map_or(true, |(_, best_key)| key < best_key) {
            best = Some((dir, key));
        }
    }
    best.map(|(dir, _)| dir)
        .or_else(|| fallback(world, recent))
}

/// Any movable direction, preferring cells not visited recently.
pub(crate) fn fallback<W: WorldQuery + ?Sized>(
    world: &W,
    recent: &RecentVisits,
) -> Option<Direction> {
    let current = world.current_location();
    let movable = move || {
        Direction::ALL
            .into_iter()
            .filter(move |&dir| world.can_move(dir))
    };
    movable()
        .find(|&dir| !recent.contains(current.add(dir)))
        .or_else(|| movable().next())
}

/// Look up to `depth` cells along the target vector. The first passable cell
/// after a blocking one is the cross-point; with no wall ahead, or nothing
/// sensible beyond it, aim at the target itself.
pub(super) fn probe_cross_point<W: WorldQuery + ?Sized>(
    world: &W,
    target: MapLocation,
    depth: i32,
) -> MapLocation {
    let current = world.current_location();
    let dir = current.direction_to(target);
    let mut blocked = false;
    for distance in 1..=depth {
        let cell = current.step(dir, distance);
        if cell == target {
            break;
        }
        match world.sense_tile(cell) {
            Some(tile) if tile.passable => {
                if blocked {
                    return cell;
                }
            }
            Some(_) => blocked = true,
            None => break,
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_rank_order() {
        assert!(paint_rank(PaintType::AllySecondary) < paint_rank(PaintType::Empty));
        assert!(paint_rank(PaintType::Empty) < paint_rank(PaintType::EnemyPrimary));
        assert_eq!(
            paint_rank(PaintType::AllyPrimary),
            paint_rank(PaintType::AllySecondary)
        );
    }
}
