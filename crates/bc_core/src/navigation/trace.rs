//! Bug-style obstacle tracing.
//!
//! The unit keeps the obstacle on its right: after every successful step the
//! heading turns 90 degrees right to probe the wall, and a blocked heading is
//! swept left 45 degrees at a time until something is movable.
//!
//! Tracing ignores the recent-visit ring. Escaping a pocket means walking
//! back over cells the unit just left, and skipping them would flip the hand
//! rule and loop around the inside of the obstacle. Loops are cut instead by
//! the closest-approach revisit check and the `2 * (width + height)` step
//! bound. The ring only comes back into play in [`TraceOutcome::Blocked`],
//! where the caller falls back to a non-recent neighbour.

use serde::{Deserialize, Serialize};

use crate::geometry::{Direction, MapLocation};
use crate::world::WorldQuery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct Trace {
    direction: Direction,
    steps: i32,
    closest: MapLocation,
    closest_distance: i32,
    left_closest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TraceOutcome {
    /// Move this way.
    Step(Direction),
    /// Give up on this engagement.
    Finished,
    /// Nothing around the unit is movable.
    Blocked,
}

pub(super) fn step<W: WorldQuery + ?Sized>(
    world: &W,
    trace: &mut Option<Trace>,
    aim: MapLocation,
) -> TraceOutcome {
    let current = world.current_location();
    let distance = current.distance_squared_to(aim);

    match trace.as_mut() {
        Some(state) => {
            if current == state.closest {
                if state.left_closest {
                    return TraceOutcome::Finished;
                }
            } else {
                state.left_closest = true;
            }
            let (width, height) = world.map_bounds();
            if state.steps > 2 * (width + height) {
                return TraceOutcome::Finished;
            }
            if distance < state.closest_distance {
                state.closest = current;
                state.closest_distance = distance;
                state.left_closest = false;
            }
        }
        None => {
            let direct = current.direction_to(aim);
            if world.can_move(direct) {
                return TraceOutcome::Step(direct);
            }
            *trace = Some(Trace {
                direction: direct,
                steps: 0,
                closest: current,
                closest_distance: distance,
                left_closest: false,
            });
        }
    }
    let Some(state) = trace.as_mut() else {
        return TraceOutcome::Blocked;
    };

    if world.can_move(state.direction) {
        let dir = state.direction;
        state.direction = dir.rotate_right().rotate_right();
        state.steps += 1;
        return TraceOutcome::Step(dir);
    }
    let mut dir = state.direction;
    for _ in 0..8 {
        dir = dir.rotate_left();
        if world.can_move(dir) {
            state.direction = dir.rotate_right().rotate_right();
            state.steps += 1;
            return TraceOutcome::Step(dir);
        }
    }
    TraceOutcome::Blocked
}
