//! # BC Core
//!
//! Per-unit controller for a turn-based grid-world painting competition.
//!
//! The engine is an external collaborator reached only through the
//! [`world::WorldQuery`] trait. Every live unit owns a
//! [`context::UnitContext`] and a scheduler calls [`controller::tick`] for it
//! once per round. Within a tick the unit:
//!
//! - reads and decodes its inbox ([`comms`]);
//! - runs its archetype state machine ([`behavior`]);
//! - picks at most one step with the layered pathfinder ([`navigation`]);
//! - issues actions guarded by their `can_*` checks.
//!
//! ## Crate Structure
//!
//! - [`geometry`] - Map coordinates and compass directions
//! - [`world`] - Observations and the engine-facing trait
//! - [`navigation`] - Greedy, wall-probe and tracing pathfinding plus exploration
//! - [`behavior`] - Soldier, mopper, splasher and tower state machines
//! - [`patterns`] - Structure and resource paint templates
//! - [`comms`] - Message payload codec
//! - [`controller`] - Tick wrapper with fault recovery

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod comms;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod navigation;
pub mod patterns;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{BehaviorState, SoldierRole, StateMachine};
    pub use crate::comms::{Payload, RoleCommand, TileReport, UnitReport};
    pub use crate::config::{AgentConfig, ConfigError};
    pub use crate::context::{Brain, UnitContext};
    pub use crate::controller::{tick, TickReport};
    pub use crate::error::{ActionError, AgentError, Result};
    pub use crate::geometry::{Direction, MapLocation};
    pub use crate::navigation::{NavPhase, Navigator};
    pub use crate::world::{
        Message, PaintType, Team, TileObservation, TowerKind, UnitArchetype, UnitId,
        UnitObservation, UnitType, WorldQuery, VISION_RADIUS_SQ,
    };
}
