//! Inter-unit message payloads.
//!
//! A payload is a single `u32`:
//!
//! | value range          | meaning                                   |
//! |----------------------|-------------------------------------------|
//! | `0..=4`              | role command ([`RoleCommand`])            |
//! | bit 21 set, bit 31 clear | tile summary ([`TileReport`])         |
//! | bit 31 set           | unit summary ([`UnitReport`])             |
//!
//! Tile layout: `x` bits 0-5, `y` bits 6-11, passable 12, wall 13,
//! paint 14-16, mark 17-19, ruin 20.
//!
//! Unit layout: `x` bits 0-5, `y` bits 6-11, type 12-15, team 16,
//! health percent 17-23, paint percent 24-30.
//!
//! Coordinates must lie in `0..64`.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::geometry::MapLocation;
use crate::world::{
    Message, PaintType, Team, TileObservation, TowerKind, UnitObservation, UnitType,
};

const COORD_BITS: u32 = 6;
const COORD_MASK: u32 = (1 << COORD_BITS) - 1;
const TILE_TAG: u32 = 1 << 21;
const UNIT_TAG: u32 = 1 << 31;
const MAX_ROLE: u32 = 4;

/// Role or spawn command carried by a low sentinel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleCommand {
    /// Soldier: develop territory (or fill resource patterns).
    Develop,
    /// Soldier: push the frontier.
    Advance,
    /// Soldier: siege a reported enemy tower.
    Attack,
    /// Spawn token for a mopper.
    Mopper,
    /// Spawn token for a splasher.
    Splasher,
}

impl RoleCommand {
    /// Wire value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Develop => 0,
            Self::Advance => 1,
            Self::Attack => 2,
            Self::Mopper => 3,
            Self::Splasher => 4,
        }
    }

    /// Inverse of [`RoleCommand::code`].
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Develop),
            1 => Some(Self::Advance),
            2 => Some(Self::Attack),
            3 => Some(Self::Mopper),
            4 => Some(Self::Splasher),
            _ => None,
        }
    }

    /// Unit type a tower spawns for this token.
    #[must_use]
    pub const fn unit_type(self) -> UnitType {
        match self {
            Self::Develop | Self::Advance | Self::Attack => UnitType::Soldier,
            Self::Mopper => UnitType::Mopper,
            Self::Splasher => UnitType::Splasher,
        }
    }
}

/// Tile summary carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileReport {
    /// Cell.
    pub location: MapLocation,
    /// Paint, from the sender's point of view.
    pub paint: PaintType,
    /// Marker.
    pub mark: PaintType,
    /// Passability.
    pub passable: bool,
    /// Wall flag.
    pub wall: bool,
    /// Ruin flag.
    pub ruin: bool,
}

impl From<TileObservation> for TileReport {
    fn from(tile: TileObservation) -> Self {
        Self {
            location: tile.location,
            paint: tile.paint,
            mark: tile.mark,
            passable: tile.passable,
            wall: tile.wall,
            ruin: tile.ruin,
        }
    }
}

/// Unit summary carried on the wire. Health and paint are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitReport {
    /// Position.
    pub location: MapLocation,
    /// Type.
    pub unit_type: UnitType,
    /// Team.
    pub team: Team,
    /// Health, 0-100.
    pub health_percent: u8,
    /// Paint, 0-100.
    pub paint_percent: u8,
}

impl UnitReport {
    /// Summarize an observation given the maximum health of its type.
    #[must_use]
    pub fn from_observation(unit: &UnitObservation, max_health: i32) -> Self {
        Self {
            location: unit.location,
            unit_type: unit.unit_type,
            team: unit.team,
            health_percent: percent(unit.health, max_health),
            paint_percent: percent(unit.paint, unit.unit_type.paint_capacity()),
        }
    }
}

fn percent(value: i32, max: i32) -> u8 {
    if max <= 0 {
        return 0;
    }
    (value.clamp(0, max) * 100 / max) as u8
}

/// A decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Payload {
    /// Role assignment or spawn token.
    Role(RoleCommand),
    /// Tile fact.
    Tile(TileReport),
    /// Unit fact.
    Unit(UnitReport),
}

impl Payload {
    /// Pack into a wire integer.
    pub fn encode(&self) -> Result<u32> {
        match self {
            Self::Role(role) => Ok(role.code()),
            Self::Tile(tile) => encode_tile(tile),
            Self::Unit(unit) => encode_unit(unit),
        }
    }

    /// Unpack a wire integer.
    pub fn decode(raw: u32) -> Result<Self> {
        if raw & UNIT_TAG != 0 {
            decode_unit(raw).map(Self::Unit)
        } else if raw & TILE_TAG != 0 {
            decode_tile(raw).map(Self::Tile)
        } else if raw <= MAX_ROLE {
            RoleCommand::from_code(raw)
                .map(Self::Role)
                .ok_or_else(|| AgentError::Codec(format!("unknown sentinel payload {raw}")))
        } else {
            Err(AgentError::Codec(format!("untagged payload {raw}")))
        }
    }
}

fn encode_location(loc: MapLocation) -> Result<u32> {
    let in_range = |v: i32| (0..=COORD_MASK as i32).contains(&v);
    if !in_range(loc.x) || !in_range(loc.y) {
        return Err(AgentError::Codec(format!("location {loc} out of encodable range")));
    }
    Ok(loc.x as u32 | (loc.y as u32) << COORD_BITS)
}

fn decode_location(raw: u32) -> MapLocation {
    MapLocation::new(
        (raw & COORD_MASK) as i32,
        ((raw >> COORD_BITS) & COORD_MASK) as i32,
    )
}

const fn paint_bits(paint: PaintType) -> u32 {
    match paint {
        PaintType::Empty => 0,
        PaintType::AllyPrimary => 1,
        PaintType::AllySecondary => 2,
        PaintType::EnemyPrimary => 3,
        PaintType::EnemySecondary => 4,
    }
}

fn paint_from_bits(bits: u32) -> Result<PaintType> {
    match bits {
        0 => Ok(PaintType::Empty),
        1 => Ok(PaintType::AllyPrimary),
        2 => Ok(PaintType::AllySecondary),
        3 => Ok(PaintType::EnemyPrimary),
        4 => Ok(PaintType::EnemySecondary),
        other => Err(AgentError::Codec(format!("invalid paint bits {other}"))),
    }
}

const fn unit_type_bits(unit_type: UnitType) -> u32 {
    match unit_type {
        UnitType::Soldier => 0,
        UnitType::Mopper => 1,
        UnitType::Splasher => 2,
        UnitType::Tower(TowerKind::Paint) => 3,
        UnitType::Tower(TowerKind::Money) => 4,
        UnitType::Tower(TowerKind::Defense) => 5,
    }
}

fn unit_type_from_bits(bits: u32) -> Result<UnitType> {
    match bits {
        0 => Ok(UnitType::Soldier),
        1 => Ok(UnitType::Mopper),
        2 => Ok(UnitType::Splasher),
        3 => Ok(UnitType::Tower(TowerKind::Paint)),
        4 => Ok(UnitType::Tower(TowerKind::Money)),
        5 => Ok(UnitType::Tower(TowerKind::Defense)),
        other => Err(AgentError::Codec(format!("invalid unit type bits {other}"))),
    }
}

fn encode_tile(tile: &TileReport) -> Result<u32> {
    Ok(TILE_TAG
        | encode_location(tile.location)?
        | u32::from(tile.passable) << 12
        | u32::from(tile.wall) << 13
        | paint_bits(tile.paint) << 14
        | paint_bits(tile.mark) << 17
        | u32::from(tile.ruin) << 20)
}

fn decode_tile(raw: u32) -> Result<TileReport> {
    Ok(TileReport {
        location: decode_location(raw),
        passable: raw >> 12 & 1 == 1,
        wall: raw >> 13 & 1 == 1,
        paint: paint_from_bits(raw >> 14 & 0b111)?,
        mark: paint_from_bits(raw >> 17 & 0b111)?,
        ruin: raw >> 20 & 1 == 1,
    })
}

fn encode_unit(unit: &UnitReport) -> Result<u32> {
    let team = match unit.team {
        Team::A => 0,
        Team::B => 1,
    };
    Ok(UNIT_TAG
        | encode_location(unit.location)?
        | unit_type_bits(unit.unit_type) << 12
        | team << 16
        | u32::from(unit.health_percent.min(100)) << 17
        | u32::from(unit.paint_percent.min(100)) << 24)
}

fn decode_unit(raw: u32) -> Result<UnitReport> {
    Ok(UnitReport {
        location: decode_location(raw),
        unit_type: unit_type_from_bits(raw >> 12 & 0xF)?,
        team: if raw >> 16 & 1 == 0 { Team::A } else { Team::B },
        health_percent: (raw >> 17 & 0x7F) as u8,
        paint_percent: (raw >> 24 & 0x7F) as u8,
    })
}

/// A decoded inbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Raw message metadata.
    pub message: Message,
    /// Decoded payload.
    pub payload: Payload,
}

/// Decode a drained inbox, dropping (and logging) malformed payloads.
pub fn decode_inbox(messages: Vec<Message>) -> Vec<Envelope> {
    messages
        .into_iter()
        .filter_map(|message| match Payload::decode(message.payload) {
            Ok(payload) => Some(Envelope { message, payload }),
            Err(err) => {
                tracing::warn!(
                    sender = message.sender.0,
                    raw = message.payload,
                    %err,
                    "dropping message"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::UnitId;

    fn tile(x: i32, y: i32) -> TileReport {
        TileReport {
            location: MapLocation::new(x, y),
            paint: PaintType::EnemySecondary,
            mark: PaintType::AllyPrimary,
            passable: false,
            wall: false,
            ruin: true,
        }
    }

    #[test]
    fn test_sentinels_are_low_values() {
        for code in 0..=MAX_ROLE {
            let role = RoleCommand::from_code(code).expect("sentinel");
            assert_eq!(Payload::Role(role).encode().unwrap(), code);
        }
        assert!(Payload::decode(5).is_err());
    }

    #[test]
    fn test_tile_at_origin_is_not_a_sentinel() {
        let report = TileReport {
            location: MapLocation::new(0, 0),
            paint: PaintType::Empty,
            mark: PaintType::Empty,
            passable: false,
            wall: false,
            ruin: false,
        };
        let raw = Payload::Tile(report).encode().unwrap();
        assert!(raw > MAX_ROLE);
        assert_eq!(Payload::decode(raw).unwrap(), Payload::Tile(report));
    }

    #[test]
    fn test_tile_fields_survive() {
        let report = tile(59, 33);
        let raw = Payload::Tile(report).encode().unwrap();
        assert_eq!(raw & UNIT_TAG, 0);
        assert_eq!(Payload::decode(raw).unwrap(), Payload::Tile(report));
    }

    #[test]
    fn test_unit_fields_survive() {
        let report = UnitReport {
            location: MapLocation::new(0, 63),
            unit_type: UnitType::Tower(TowerKind::Defense),
            team: Team::B,
            health_percent: 100,
            paint_percent: 7,
        };
        let raw = Payload::Unit(report).encode().unwrap();
        assert_eq!(Payload::decode(raw).unwrap(), Payload::Unit(report));
    }

    #[test]
    fn test_out_of_range_location_rejected() {
        assert!(Payload::Tile(tile(64, 0)).encode().is_err());
        assert!(Payload::Tile(tile(-1, 0)).encode().is_err());
    }

    #[test]
    fn test_decode_inbox_drops_garbage() {
        let good = Message {
            sender: UnitId(1),
            round: 3,
            payload: RoleCommand::Attack.code(),
        };
        let bad = Message {
            sender: UnitId(2),
            round: 3,
            payload: 17,
        };
        let envelopes = decode_inbox(vec![good, bad]);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].payload, Payload::Role(RoleCommand::Attack));
    }
}
