//! Per-archetype state machines.
//!
//! Each mobile unit runs one [`StateMachine`] over [`BehaviorState`]; the
//! archetype-specific modules decide the transitions and actions. Towers have
//! no behavior state and run [`tower::TowerBrain`] instead.

pub mod common;
pub mod mopper;
pub mod soldier;
pub mod splasher;
pub mod tower;

use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::navigation::Navigator;

pub use common::ResupplyCache;
pub use mopper::MopperBrain;
pub use soldier::SoldierBrain;
pub use splasher::SplasherBrain;
pub use tower::TowerBrain;

/// What a mobile unit is currently doing. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Looking for work.
    #[default]
    Exploring,
    /// Nothing actionable in sight; wandering to find some.
    Stuck,
    /// Carrying an enemy sighting back to a friendly structure.
    DeliveringMessage,
    /// Painting a structure pattern around a ruin.
    FillingStructure,
    /// Heading home to refill paint.
    LowOnResource,
    /// Painting a resource pattern.
    FillingPattern,
}

/// Sub-classification of soldiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SoldierRole {
    /// Opening scout heading for the mirrored point of its spawn.
    InitialScout,
    /// Paints territory and fills structures nearby.
    #[default]
    AreaDeveloper,
    /// Pushes toward unexplored and contested ground.
    FrontierAdvancer,
    /// Attacks a reported enemy structure.
    SiegeAttacker,
    /// Lays resource patterns.
    PatternFiller,
}

/// Behavior state plus the states to resume once a detour ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateMachine {
    state: BehaviorState,
    resume_after_low: Option<BehaviorState>,
    resume_after_delivery: Option<BehaviorState>,
}

impl StateMachine {
    /// Start in `state`.
    #[must_use]
    pub const fn new(state: BehaviorState) -> Self {
        Self {
            state,
            resume_after_low: None,
            resume_after_delivery: None,
        }
    }

    /// The active state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// State restored when the low-resource detour ends.
    #[must_use]
    pub const fn resume_after_low(&self) -> Option<BehaviorState> {
        self.resume_after_low
    }

    /// Whether the active state is `state`.
    #[must_use]
    pub fn is(&self, state: BehaviorState) -> bool {
        self.state == state
    }

    /// Move to `next`. Entering [`BehaviorState::LowOnResource`] or
    /// [`BehaviorState::DeliveringMessage`] goes through the stashing entry
    /// points so the detour can be undone.
    pub fn transition(&mut self, next: BehaviorState) {
        match next {
            BehaviorState::LowOnResource => {
                self.enter_low_resource();
            }
            BehaviorState::DeliveringMessage => {
                self.begin_delivery();
            }
            BehaviorState::Exploring
            | BehaviorState::Stuck
            | BehaviorState::FillingStructure
            | BehaviorState::FillingPattern => self.state = next,
        }
    }

    /// Stash the current state and switch to low-resource recovery.
    ///
    /// Returns `false` when already recovering.
    pub fn enter_low_resource(&mut self) -> bool {
        if self.state == BehaviorState::LowOnResource {
            return false;
        }
        self.resume_after_low = Some(self.state);
        self.state = BehaviorState::LowOnResource;
        true
    }

    /// Leave low-resource recovery.
    ///
    /// A `preempt` state wins over the stashed one; a preempting delivery
    /// keeps the stash as its own resume target.
    pub fn leave_low_resource(&mut self, preempt: Option<BehaviorState>) -> BehaviorState {
        let resume = self
            .resume_after_low
            .take()
            .filter(|state| *state != BehaviorState::LowOnResource)
            .unwrap_or_default();
        self.state = match preempt {
            Some(BehaviorState::DeliveringMessage) => {
                self.resume_after_delivery = Some(resume);
                BehaviorState::DeliveringMessage
            }
            Some(BehaviorState::LowOnResource) | None => resume,
            Some(other) => other,
        };
        self.state
    }

    /// Stash the current state and start delivering a message.
    pub fn begin_delivery(&mut self) {
        if self.state == BehaviorState::DeliveringMessage {
            return;
        }
        self.resume_after_delivery = Some(self.state);
        self.state = BehaviorState::DeliveringMessage;
    }

    /// Finish a delivery, resuming the stashed state or `fallback`.
    pub fn finish_delivery(&mut self, fallback: BehaviorState) -> BehaviorState {
        let next = self
            .resume_after_delivery
            .take()
            .filter(|state| *state != BehaviorState::DeliveringMessage)
            .unwrap_or(fallback);
        self.transition(next);
        self.state
    }
}

/// Per-unit state shared by every archetype's tick, borrowed out of the
/// unit context for the duration of one tick.
pub struct Common<'a> {
    /// Navigation memory.
    pub nav: &'a mut Navigator,
    /// Last known friendly resupply point.
    pub resupply: &'a mut ResupplyCache,
    /// Team configuration.
    pub config: &'a AgentConfig,
    /// Ticks this unit has run, including the current one.
    pub turns_alive: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_resource_restores_stashed_state() {
        let mut machine = StateMachine::new(BehaviorState::Exploring);
        assert!(machine.enter_low_resource());
        assert_eq!(machine.state(), BehaviorState::LowOnResource);
        assert_eq!(machine.resume_after_low(), Some(BehaviorState::Exploring));
        assert!(!machine.enter_low_resource());
        assert_eq!(machine.leave_low_resource(None), BehaviorState::Exploring);
        assert_eq!(machine.resume_after_low(), None);
    }

    #[test]
    fn test_preempting_delivery_keeps_resume_target() {
        let mut machine = StateMachine::new(BehaviorState::FillingPattern);
        machine.enter_low_resource();
        let next = machine.leave_low_resource(Some(BehaviorState::DeliveringMessage));
        assert_eq!(next, BehaviorState::DeliveringMessage);
        assert_eq!(
            machine.finish_delivery(BehaviorState::Stuck),
            BehaviorState::FillingPattern
        );
    }

    #[test]
    fn test_transition_to_low_stashes() {
        let mut machine = StateMachine::new(BehaviorState::Stuck);
        machine.transition(BehaviorState::LowOnResource);
        assert_eq!(machine.resume_after_low(), Some(BehaviorState::Stuck));
    }

    #[test]
    fn test_delivery_fallback_when_nothing_stashed() {
        let mut machine = StateMachine::default();
        assert_eq!(
            machine.finish_delivery(BehaviorState::FillingStructure),
            BehaviorState::FillingStructure
        );
    }

    #[test]
    fn test_low_during_delivery_resumes_delivery() {
        let mut machine = StateMachine::new(BehaviorState::Exploring);
        machine.begin_delivery();
        machine.enter_low_resource();
        assert_eq!(machine.leave_low_resource(None), BehaviorState::DeliveringMessage);
        assert_eq!(
            machine.finish_delivery(BehaviorState::Stuck),
            BehaviorState::Exploring
        );
    }
}
