//! Error types for the unit controller.

use thiserror::Error;

use crate::geometry::{Direction, MapLocation};
use crate::world::UnitType;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Fault raised by the engine when an action's precondition did not hold.
///
/// The controller checks every action with its `can_*` counterpart first, so
/// seeing one of these means a check was skipped or the world changed under
/// the unit mid-tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Movement blocked, off-map, or on cooldown.
    #[error("cannot move {direction:?} from {from}")]
    CannotMove {
        /// Unit location when the move was attempted.
        from: MapLocation,
        /// Requested direction.
        direction: Direction,
    },

    /// Paint/attack target invalid or out of range.
    #[error("cannot act on {0}")]
    CannotAttack(MapLocation),

    /// Directional mop swing not possible.
    #[error("cannot swing {0:?}")]
    CannotSwing(Direction),

    /// Marker placement not possible.
    #[error("cannot mark {0}")]
    CannotMark(MapLocation),

    /// Structure or unit construction not possible.
    #[error("cannot build {kind:?} at {location}")]
    CannotBuild {
        /// What was requested.
        kind: UnitType,
        /// Where.
        location: MapLocation,
    },

    /// Resource pattern completion not possible.
    #[error("cannot complete resource pattern at {0}")]
    CannotComplete(MapLocation),

    /// Paint transfer not possible.
    #[error("cannot transfer {amount} paint with {location}")]
    CannotTransfer {
        /// Partner structure.
        location: MapLocation,
        /// Signed amount (negative takes paint).
        amount: i32,
    },

    /// Message could not be delivered.
    #[error("cannot message {0}")]
    CannotMessage(MapLocation),

    /// The unit already resigned.
    #[error("unit has resigned")]
    Resigned,
}

/// Top-level error type for controller faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The engine rejected an action.
    #[error("illegal action: {0}")]
    Action(#[from] ActionError),

    /// A message payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The controller reached a state it cannot act from.
    #[error("invalid controller state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_converts() {
        let err: AgentError = ActionError::CannotMark(MapLocation::new(3, 4)).into();
        assert_eq!(err.to_string(), "illegal action: cannot mark (3, 4)");
    }
}
