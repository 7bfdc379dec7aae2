//! Map fixtures for tests and benchmarks.

use bc_core::geometry::MapLocation;
use bc_core::world::{Team, TowerKind, UnitId, UnitType};

use crate::grid_world::GridWorld;

/// Empty open map.
#[must_use]
pub fn open_map(width: i32, height: i32) -> GridWorld {
    GridWorld::new(width, height)
}

/// Open map holding one team A unit.
///
/// # Panics
///
/// Panics if `location` is off the map.
#[must_use]
pub fn single_unit(
    width: i32,
    height: i32,
    unit_type: UnitType,
    location: MapLocation,
) -> (GridWorld, UnitId) {
    let mut world = open_map(width, height);
    let id = world
        .add_unit(Team::A, unit_type, location)
        .unwrap_or_else(|| panic!("cannot place {unit_type:?} at {location}"));
    (world, id)
}

/// Horizontal wall on row `y` covering `x_from..=x_to`.
pub fn wall_row(world: &mut GridWorld, y: i32, x_from: i32, x_to: i32) {
    for x in x_from..=x_to {
        world.set_wall(MapLocation::new(x, y), true);
    }
}

/// Parse a map drawn as text, top row first (highest `y`).
///
/// | char | meaning |
/// |------|---------|
/// | `.`  | empty |
/// | `#`  | wall |
/// | `R`  | ruin |
/// | `a` / `b` | painted by team A / B |
/// | `A` / `B` | paint tower of team A / B |
/// | `S` / `s` | soldier of team A / B |
///
/// Unknown characters are treated as empty.
#[must_use]
pub fn from_ascii(map: &str) -> GridWorld {
    let rows: Vec<&str> = map
        .lines()
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .collect();
    let height = rows.len() as i32;
    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as i32;
    let mut world = GridWorld::new(width, height);
    for (row_index, row) in rows.iter().enumerate() {
        let y = height - 1 - row_index as i32;
        for (x, ch) in row.chars().enumerate() {
            let loc = MapLocation::new(x as i32, y);
            match ch {
                '#' => world.set_wall(loc, true),
                'R' => world.set_ruin(loc),
                'a' => world.set_paint(loc, Some((Team::A, false))),
                'b' => world.set_paint(loc, Some((Team::B, false))),
                'A' => {
                    world.add_unit(Team::A, UnitType::Tower(TowerKind::Paint), loc);
                }
                'B' => {
                    world.add_unit(Team::B, UnitType::Tower(TowerKind::Paint), loc);
                }
                'S' => {
                    world.add_unit(Team::A, UnitType::Soldier, loc);
                }
                's' => {
                    world.add_unit(Team::B, UnitType::Soldier, loc);
                }
                _ => {}
            }
        }
    }
    world
}

/// Square map with one paint tower per team in opposite corners, mirrored
/// ruins and a few wall segments.
#[must_use]
pub fn two_tower_match(size: i32) -> GridWorld {
    let size = size.clamp(16, 60);
    let mut world = open_map(size, size);
    let far = size - 1;
    let mirror = |loc: MapLocation| MapLocation::new(far - loc.x, far - loc.y);

    let home = MapLocation::new(3, 3);
    world.add_unit(Team::A, UnitType::Tower(TowerKind::Paint), home);
    world.add_unit(Team::B, UnitType::Tower(TowerKind::Paint), mirror(home));

    for ruin in [
        MapLocation::new(9, 4),
        MapLocation::new(4, size / 2 - 2),
        MapLocation::new(size / 2 - 3, size / 2 + 3),
    ] {
        world.set_ruin(ruin);
        world.set_ruin(mirror(ruin));
    }

    let mid = size / 2;
    for x in mid - 3..=mid + 1 {
        let loc = MapLocation::new(x, mid - 4);
        world.set_wall(loc, true);
        world.set_wall(mirror(loc), true);
    }
    world
}

/// The default scenario: a 30x30 [`two_tower_match`].
#[must_use]
pub fn standard_match() -> GridWorld {
    two_tower_match(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_rows_are_flipped() {
        let world = from_ascii(
            "
            #..
            .R.
            A.b
            ",
        );
        assert_eq!(world.bounds(), (3, 3));
        assert!(world.cell(MapLocation::new(0, 2)).is_some_and(|cell| cell.wall));
        assert!(world.cell(MapLocation::new(1, 1)).is_some_and(|cell| cell.ruin));
        assert_eq!(
            world.cell(MapLocation::new(2, 0)).and_then(|cell| cell.paint),
            Some((Team::B, false))
        );
        assert_eq!(world.tower_count(Team::A), 1);
    }

    #[test]
    fn test_two_tower_match_is_symmetric() {
        let world = standard_match();
        assert_eq!(world.tower_count(Team::A), 1);
        assert_eq!(world.tower_count(Team::B), 1);
        let (width, height) = world.bounds();
        for x in 0..width {
            for y in 0..height {
                let here = world.cell(MapLocation::new(x, y)).copied();
                let there = world.cell(MapLocation::new(width - 1 - x, height - 1 - y)).copied();
                assert_eq!(here.map(|c| (c.wall, c.ruin)), there.map(|c| (c.wall, c.ruin)));
            }
        }
    }
}
