//! Fixed 5x5 paint templates for structures and resource patterns.
//!
//! Templates are indexed `[dx + 2][dy + 2]` relative to the pattern center.
//! `true` means the secondary color.

use crate::geometry::MapLocation;
use crate::world::{PaintType, TowerKind};

/// Side length of every pattern.
pub const PATTERN_SIZE: i32 = 5;

const P: Option<bool> = Some(false);
const S: Option<bool> = Some(true);
const E: Option<bool> = None;

type Template = [[Option<bool>; 5]; 5];

const PAINT_TOWER: Template = [
    [S, P, P, P, S],
    [P, S, P, S, P],
    [P, P, E, P, P],
    [P, S, P, S, P],
    [S, P, P, P, S],
];

const MONEY_TOWER: Template = [
    [P, S, S, S, P],
    [S, S, P, S, S],
    [S, P, E, P, S],
    [S, S, P, S, S],
    [P, S, S, S, P],
];

const DEFENSE_TOWER: Template = [
    [P, P, S, P, P],
    [P, S, S, S, P],
    [S, S, E, S, S],
    [P, S, S, S, P],
    [P, P, S, P, P],
];

/// Residues `(x mod 4, y mod 4)` painted primary in the resource grid.
const RESOURCE_PRIMARY: [(i32, i32); 10] = [
    (2, 0),
    (1, 1),
    (2, 1),
    (3, 1),
    (0, 2),
    (1, 2),
    (3, 2),
    (1, 3),
    (2, 3),
    (3, 3),
];

/// Offsets of every cell in a 5x5 footprint, row by row.
pub fn footprint() -> impl Iterator<Item = (i32, i32)> {
    (-2..=2).flat_map(|dx| (-2..=2).map(move |dy| (dx, dy)))
}

/// Required paint for a tower of `kind` at offset `(dx, dy)` from its ruin.
///
/// `None` for the ruin itself and for offsets outside the footprint.
#[must_use]
pub fn tower_cell(kind: TowerKind, dx: i32, dy: i32) -> Option<PaintType> {
    if !(-2..=2).contains(&dx) || !(-2..=2).contains(&dy) {
        return None;
    }
    let template = match kind {
        TowerKind::Paint => &PAINT_TOWER,
        TowerKind::Money => &MONEY_TOWER,
        TowerKind::Defense => &DEFENSE_TOWER,
    };
    template[(dx + 2) as usize][(dy + 2) as usize].map(PaintType::ally)
}

/// Whether the resource grid wants the secondary color at `loc`.
#[must_use]
pub fn resource_secondary(loc: MapLocation) -> bool {
    let residue = (loc.x.rem_euclid(4), loc.y.rem_euclid(4));
    !RESOURCE_PRIMARY.contains(&residue)
}

/// Required paint at `loc` under the resource grid.
#[must_use]
pub fn resource_cell(loc: MapLocation) -> PaintType {
    PaintType::ally(resource_secondary(loc))
}

/// Cells of a tower footprint whose sensed paint differs from the template,
/// each with the color it needs. Cells `sensed` returns `None` for are
/// skipped.
pub fn tower_mismatches<F>(
    ruin: MapLocation,
    kind: TowerKind,
    mut sensed: F,
) -> Vec<(MapLocation, PaintType)>
where
    F: FnMut(MapLocation) -> Option<PaintType>,
{
    footprint()
        .filter_map(|(dx, dy)| {
            let required = tower_cell(kind, dx, dy)?;
            let loc = ruin.translate(dx, dy);
            let actual = sensed(loc)?;
            (actual != required).then_some((loc, required))
        })
        .collect()
}

/// Whether a resource pattern centered on `loc` lines up with the global
/// resource grid.
#[must_use]
pub fn is_resource_center(loc: MapLocation) -> bool {
    loc.x.rem_euclid(4) == 0 && loc.y.rem_euclid(4) == 0
}

/// Cells of the resource pattern around `center` whose sensed paint differs
/// from the resource grid.
pub fn resource_mismatches<F>(
    center: MapLocation,
    mut sensed: F,
) -> Vec<(MapLocation, PaintType)>
where
    F: FnMut(MapLocation) -> Option<PaintType>,
{
    footprint()
        .filter_map(|(dx, dy)| {
            let loc = center.translate(dx, dy);
            let required = resource_cell(loc);
            let actual = sensed(loc)?;
            (actual != required).then_some((loc, required))
        })
        .collect()
}

/// Paint the tower marker for `kind` uses: the cell it sits on, and whether it is secondary.
#[must_use]
pub fn marker_for(ruin: MapLocation, kind: TowerKind) -> (MapLocation, bool) {
    use crate::geometry::Direction;
    match kind {
        TowerKind::Paint => (ruin.add(Direction::North), false),
        TowerKind::Money => (ruin.add(Direction::North), true),
        TowerKind::Defense => (ruin.add(Direction::NorthEast), false),
    }
}

/// Decode the tower kind from the markers around a ruin.
///
/// `north` and `north_east` are the marks sensed on the cells north and
/// north-east of the ruin.
#[must_use]
pub fn kind_from_markers(north: PaintType, north_east: PaintType) -> Option<TowerKind> {
    match north {
        PaintType::AllyPrimary => Some(TowerKind::Paint),
        PaintType::AllySecondary => Some(TowerKind::Money),
        PaintType::Empty | PaintType::EnemyPrimary | PaintType::EnemySecondary => {
            (north_east == PaintType::AllyPrimary).then_some(TowerKind::Defense)
        }
    }
}
