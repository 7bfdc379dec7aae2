//! Tower behavior: spawn queue, enemy-sighting relay and defense.
//!
//! Towers have no behavior state. Each tick they read their inbox, shoot,
//! and then do at most one of: alert nearby units, relay a broadcast, tell
//! the last spawned unit its role, spawn the queue head, or refill the queue.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::comms::{self, Payload, RoleCommand, TileReport};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::geometry::{Direction, MapLocation};
use crate::world::{UnitType, WorldQuery, VISION_RADIUS_SQ};

/// Each enemy report raises the splasher share of random refills by this much.
const SPLASHER_PER_VISIT: f64 = 0.2;
/// Rounds-without-enemy offset in the develop probability.
const DEVELOP_OFFSET: f64 = 100.0;
/// Rounds-without-enemy scale in the develop probability.
const DEVELOP_SCALE: f64 = 200.0;
/// Cap on the develop probability.
const DEVELOP_CAP: f64 = 0.6;

/// Orders for a freshly spawned unit that could not be reached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingOrders {
    location: MapLocation,
    command: RoleCommand,
}

/// Mutable state of one tower.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TowerBrain {
    queue: VecDeque<RoleCommand>,
    orders: Option<PendingOrders>,
    enemy_target: Option<TileReport>,
    broadcast: Option<TileReport>,
    alert: bool,
    alert_soldiers: bool,
    rounds_without_enemy: u32,
    enemy_visits: u32,
    inbox_round: u32,
}

impl TowerBrain {
    /// Fresh tower with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn tokens waiting to be built, head first.
    #[must_use]
    pub fn queue(&self) -> &VecDeque<RoleCommand> {
        &self.queue
    }

    /// Last reported enemy location.
    #[must_use]
    pub fn enemy_target(&self) -> Option<MapLocation> {
        self.enemy_target.map(|report| report.location)
    }

    /// Whether nearby units are due an alert.
    #[must_use]
    pub fn alert_pending(&self) -> bool {
        self.alert
    }

    /// Run one tick.
    pub fn tick<W, R>(&mut self, world: &mut W, config: &AgentConfig, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        self.read_messages(world, rng);
        self.defend(world)?;

        match world.round() {
            1 => {
                self.spawn(world, RoleCommand::Develop, false)?;
            }
            2 => {
                let enemy_paint = world
                    .sense_tiles_in_radius(world.current_location(), VISION_RADIUS_SQ)
                    .iter()
                    .filter(|tile| tile.paint.is_enemy())
                    .count();
                let opening = if enemy_paint >= config.opening_mopper_enemy_tiles {
                    RoleCommand::Mopper
                } else {
                    RoleCommand::Develop
                };
                self.spawn(world, opening, false)?;
            }
            _ => self.act(world, config, rng)?,
        }
        Ok(())
    }

    fn read_messages<W, R>(&mut self, world: &mut W, rng: &mut R)
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        let envelopes = comms::decode_inbox(world.drain_inbox(self.inbox_round));
        self.inbox_round = world.round();
        let nearby_mobile: Vec<_> = world
            .allies_in_radius(VISION_RADIUS_SQ)
            .into_iter()
            .filter(|unit| !unit.unit_type.is_tower())
            .map(|unit| unit.id)
            .collect();

        let mut sighted = false;
        for envelope in envelopes {
            let Payload::Tile(report) = envelope.payload else {
                continue;
            };
            let from_mobile = nearby_mobile.contains(&envelope.message.sender);
            if report.ruin {
                tracing::debug!(at = %report.location, from_mobile, "enemy structure reported");
                self.enemy_target = Some(report);
                self.alert = true;
                if from_mobile {
                    self.broadcast = Some(report);
                    self.alert_soldiers = true;
                    self.queue.push_back(RoleCommand::Mopper);
                    self.queue.push_back(RoleCommand::Splasher);
                }
            } else if report.paint.is_enemy() {
                tracing::debug!(at = %report.location, from_mobile, "enemy paint reported");
                self.enemy_target = Some(report);
                self.alert = true;
                if from_mobile {
                    self.broadcast = Some(report);
                    let extra = if rng.gen_bool(0.5) {
                        RoleCommand::Mopper
                    } else {
                        RoleCommand::Splasher
                    };
                    self.queue.push_back(extra);
                }
            } else {
                continue;
            }
            sighted = true;
            self.enemy_visits += 1;
        }
        if sighted {
            self.rounds_without_enemy = 0;
        } else {
            self.rounds_without_enemy += 1;
        }
    }

    /// Shoot the weakest enemy in range, then the area attack.
    fn defend<W: WorldQuery + ?Sized>(&mut self, world: &mut W) -> Result<()> {
        let radius = world.unit_type().action_radius_sq();
        let weakest = world
            .enemies_in_radius(radius)
            .into_iter()
            .filter(|unit| world.can_act_on(unit.location))
            .min_by_key(|unit| unit.health);
        if let Some(unit) = weakest {
            world.act(unit.location, false)?;
        }
        if world.can_area_attack() {
            world.area_attack()?;
        }
        Ok(())
    }

    fn act<W, R>(&mut self, world: &mut W, config: &AgentConfig, rng: &mut R) -> Result<()>
    where
        W: WorldQuery + ?Sized,
        R: Rng,
    {
        if self.alert {
            self.alert_nearby(world)?;
            return Ok(());
        }
        if let Some(report) = self.broadcast {
            if world.can_broadcast() {
                if let Ok(raw) = Payload::Tile(report).encode() {
                    world.broadcast(raw)?;
                    tracing::debug!(about = %report.location, "relayed sighting to towers");
                }
                self.broadcast = None;
                return Ok(());
            }
        }
        if let Some(orders) = self.orders.take() {
            self.send_orders(world, orders)?;
            return Ok(());
        }
        if let Some(&head) = self.queue.front() {
            if world.money() >= config.spawn_money && world.paint() >= config.spawn_paint {
                if self.spawn(world, head, true)? {
                    self.queue.pop_front();
                }
                return Ok(());
            }
        }
        if world.money() > config.refill_money && world.paint() > config.refill_paint {
            self.add_random_to_queue(rng);
        }
        Ok(())
    }

    /// Queue one token: splashers become likelier with every enemy report,
    /// developers with every quiet round.
    fn add_random_to_queue<R: Rng>(&mut self, rng: &mut R) {
        let splasher = (f64::from(self.enemy_visits) * SPLASHER_PER_VISIT).min(1.0);
        let command = if rng.gen_bool(splasher) {
            self.enemy_visits = 0;
            RoleCommand::Splasher
        } else {
            let quiet = f64::from(self.rounds_without_enemy);
            let develop = ((quiet + DEVELOP_OFFSET) / DEVELOP_SCALE).min(DEVELOP_CAP);
            if rng.gen_bool(develop) {
                RoleCommand::Develop
            } else {
                RoleCommand::Advance
            }
        };
        tracing::trace!(command = ?command, "queued random spawn");
        self.queue.push_back(command);
    }

    /// Build the unit for `command` on the spawn side of the tower. With
    /// `with_orders`, the unit is told its role once it exists.
    fn spawn<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        command: RoleCommand,
        with_orders: bool,
    ) -> Result<bool> {
        let unit_type = command.unit_type();
        let current = world.current_location();
        let preferred = spawn_direction(world);
        let mut candidates = vec![preferred];
        candidates.extend(Direction::ALL.into_iter().filter(|&dir| dir != preferred));
        let Some(location) = candidates
            .into_iter()
            .map(|dir| current.add(dir))
            .find(|&loc| world.can_build(unit_type, loc))
        else {
            return Ok(false);
        };
        world.build(unit_type, location)?;
        tracing::debug!(unit = ?unit_type, at = %location, command = ?command, "spawned");
        if with_orders {
            let orders = PendingOrders { location, command };
            if !self.send_orders(world, orders)? {
                self.orders = Some(orders);
            }
        }
        Ok(true)
    }

    /// Send the role and, for attack-type units, the enemy target. Returns
    /// whether the unit could be reached.
    fn send_orders<W: WorldQuery + ?Sized>(
        &mut self,
        world: &mut W,
        orders: PendingOrders,
    ) -> Result<bool> {
        if !world.can_send_message(orders.location) {
            return Ok(false);
        }
        if orders.command.unit_type() == UnitType::Soldier {
            world.send_message(orders.location, orders.command.code())?;
        }
        let wants_target = matches!(
            orders.command,
            RoleCommand::Attack | RoleCommand::Mopper | RoleCommand::Splasher
        );
        if wants_target && world.can_send_message(orders.location) {
            if let Some(raw) = self.target_payload() {
                world.send_message(orders.location, raw)?;
            }
        }
        Ok(true)
    }

    /// Tell nearby attack-type units where the enemy is. Soldiers are only
    /// included after a structure sighting.
    fn alert_nearby<W: WorldQuery + ?Sized>(&mut self, world: &mut W) -> Result<()> {
        if let Some(raw) = self.target_payload() {
            let recipients: Vec<_> = world
                .allies_in_radius(VISION_RADIUS_SQ)
                .into_iter()
                .filter(|unit| match unit.unit_type {
                    UnitType::Mopper | UnitType::Splasher => true,
                    UnitType::Soldier => self.alert_soldiers,
                    UnitType::Tower(_) => false,
                })
                .map(|unit| unit.location)
                .collect();
            for loc in recipients {
                if world.can_send_message(loc) {
                    world.send_message(loc, raw)?;
                }
            }
        }
        self.alert = false;
        self.alert_soldiers = false;
        Ok(())
    }

    fn target_payload(&self) -> Option<u32> {
        let report = self.enemy_target?;
        match Payload::Tile(report).encode() {
            Ok(raw) => Some(raw),
            Err(err) => {
                tracing::warn!(%err, "enemy target not encodable");
                None
            }
        }
    }
}

/// Direction toward the map center, straightened to a cardinal.
fn spawn_direction<W: WorldQuery + ?Sized>(world: &W) -> Direction {
    let (width, height) = world.map_bounds();
    let center = MapLocation::new(width / 2, height / 2);
    let dir = world.current_location().direction_to(center);
    match dir {
        Direction::Center => Direction::North,
        dir if dir.is_diagonal() => dir.rotate_left(),
        dir => dir,
    }
}
