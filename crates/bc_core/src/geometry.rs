//! Grid coordinates and compass directions.
//!
//! The map is an integer grid with the origin at the south-west corner.
//! `North` increases `y`, `East` increases `x`. All distances are squared
//! Euclidean distances so that no floating-point math is needed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An integer cell coordinate on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct MapLocation {
    /// Column, growing eastward.
    pub x: i32,
    /// Row, growing northward.
    pub y: i32,
}

impl MapLocation {
    /// Create a location from raw coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another location.
    #[must_use]
    pub const fn distance_squared_to(self, other: Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Check whether `other` lies within the given squared radius.
    #[must_use]
    pub const fn is_within_distance_squared(self, other: Self, radius_sq: i32) -> bool {
        self.distance_squared_to(other) <= radius_sq
    }

    /// The adjacent location one step in `dir`.
    #[must_use]
    pub const fn add(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The adjacent location one step against `dir`.
    #[must_use]
    pub const fn subtract(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x - dx, self.y - dy)
    }

    /// Shift by an arbitrary offset.
    #[must_use]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The location `count` steps away in `dir`.
    #[must_use]
    pub const fn step(self, dir: Direction, count: i32) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx * count, self.y + dy * count)
    }

    /// Discretize the vector toward `target` to the nearest of the 8 compass
    /// directions. Returns [`Direction::Center`] when the points coincide.
    #[must_use]
    pub fn direction_to(self, target: Self) -> Direction {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        if dx == 0 && dy == 0 {
            return Direction::Center;
        }
        let ax = dx.abs();
        let ay = dy.abs();
        // tan(22.5 deg) is roughly 5/12
        let sx = if ax * 12 < ay * 5 { 0 } else { dx.signum() };
        let sy = if ay * 12 < ax * 5 { 0 } else { dy.signum() };
        Direction::from_offset(sx, sy)
    }

    /// Check whether this location lies inside a `width` x `height` map.
    #[must_use]
    pub const fn is_on_map(self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width && self.y < height
    }
}

impl fmt::Display for MapLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the eight compass directions, or no movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// +y
    North,
    /// +x, +y
    NorthEast,
    /// +x
    East,
    /// +x, -y
    SouthEast,
    /// -y
    South,
    /// -x, -y
    SouthWest,
    /// -x
    West,
    /// -x, +y
    NorthWest,
    /// No movement.
    #[default]
    Center,
}

impl Direction {
    /// The eight movement directions in clockwise order starting at north.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// The four cardinal directions.
    pub const CARDINAL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit offset `(dx, dy)` of this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::NorthEast => (1, 1),
            Self::East => (1, 0),
            Self::SouthEast => (1, -1),
            Self::South => (0, -1),
            Self::SouthWest => (-1, -1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, 1),
            Self::Center => (0, 0),
        }
    }

    /// Inverse of [`Direction::offset`] for offsets in `-1..=1`.
    #[must_use]
    pub const fn from_offset(dx: i32, dy: i32) -> Self {
        match (dx, dy) {
            (0, 1) => Self::North,
            (1, 1) => Self::NorthEast,
            (1, 0) => Self::East,
            (1, -1) => Self::SouthEast,
            (0, -1) => Self::South,
            (-1, -1) => Self::SouthWest,
            (-1, 0) => Self::West,
            (-1, 1) => Self::NorthWest,
            _ => Self::Center,
        }
    }

    const fn index(self) -> Option<usize> {
        match self {
            Self::North => Some(0),
            Self::NorthEast => Some(1),
            Self::East => Some(2),
            Self::SouthEast => Some(3),
            Self::South => Some(4),
            Self::SouthWest => Some(5),
            Self::West => Some(6),
            Self::NorthWest => Some(7),
            Self::Center => None,
        }
    }

    /// Rotate 45 degrees counter-clockwise.
    #[must_use]
    pub const fn rotate_left(self) -> Self {
        match self.index() {
            Some(i) => Self::ALL[(i + 7) % 8],
            None => Self::Center,
        }
    }

    /// Rotate 45 degrees clockwise.
    #[must_use]
    pub const fn rotate_right(self) -> Self {
        match self.index() {
            Some(i) => Self::ALL[(i + 1) % 8],
            None => Self::Center,
        }
    }

    /// The direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self.index() {
            Some(i) => Self::ALL[(i + 4) % 8],
            None => Self::Center,
        }
    }

    /// True for the four diagonal directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_squared() {
        let a = MapLocation::new(5, 5);
        assert_eq!(a.distance_squared_to(MapLocation::new(10, 5)), 25);
        assert_eq!(a.distance_squared_to(MapLocation::new(6, 6)), 2);
        assert!(a.is_within_distance_squared(MapLocation::new(7, 9), 20));
        assert!(!a.is_within_distance_squared(MapLocation::new(8, 9), 20));
    }

    #[test]
    fn test_rotation_cycles() {
        for dir in Direction::ALL {
            let mut d = dir;
            for _ in 0..8 {
                d = d.rotate_right();
            }
            assert_eq!(d, dir);
            assert_eq!(dir.rotate_left().rotate_right(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::North.rotate_right(), Direction::NorthEast);
        assert_eq!(Direction::North.rotate_left(), Direction::NorthWest);
        assert_eq!(Direction::Center.rotate_left(), Direction::Center);
    }

    #[test]
    fn test_direction_to_octants() {
        let origin = MapLocation::new(5, 5);
        assert_eq!(origin.direction_to(MapLocation::new(10, 5)), Direction::East);
        assert_eq!(origin.direction_to(MapLocation::new(5, 15)), Direction::North);
        assert_eq!(origin.direction_to(MapLocation::new(6, 11)), Direction::North);
        assert_eq!(origin.direction_to(MapLocation::new(9, 9)), Direction::NorthEast);
        assert_eq!(origin.direction_to(MapLocation::new(0, 3)), Direction::West);
        assert_eq!(origin.direction_to(MapLocation::new(2, 1)), Direction::SouthWest);
        assert_eq!(origin.direction_to(origin), Direction::Center);
    }

    #[test]
    fn test_offsets_round_trip() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.offset();
            assert_eq!(Direction::from_offset(dx, dy), dir);
            assert_eq!(MapLocation::new(0, 0).add(dir), MapLocation::new(dx, dy));
        }
    }
}
