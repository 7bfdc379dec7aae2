//! Per-unit context owned by the unit's scheduling slot.

use serde::{Deserialize, Serialize};

use crate::behavior::{
    BehaviorState, MopperBrain, ResupplyCache, SoldierBrain, SoldierRole, SplasherBrain, TowerBrain,
};
use crate::config::AgentConfig;
use crate::navigation::Navigator;
use crate::world::{UnitArchetype, UnitId};

/// The archetype-specific state machine of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Brain {
    /// Builder.
    Soldier(SoldierBrain),
    /// Cleaner.
    Mopper(MopperBrain),
    /// Area denial.
    Splasher(SplasherBrain),
    /// Structure.
    Tower(TowerBrain),
}

impl Brain {
    /// Fresh brain for `archetype`.
    #[must_use]
    pub fn new(archetype: UnitArchetype) -> Self {
        match archetype {
            UnitArchetype::Soldier => Self::Soldier(SoldierBrain::new()),
            UnitArchetype::Mopper => Self::Mopper(MopperBrain::new()),
            UnitArchetype::Splasher => Self::Splasher(SplasherBrain::new()),
            UnitArchetype::Tower => Self::Tower(TowerBrain::new()),
        }
    }

    /// Behavior state, for mobile units.
    #[must_use]
    pub fn state(&self) -> Option<BehaviorState> {
        match self {
            Self::Soldier(brain) => Some(brain.state()),
            Self::Mopper(brain) => Some(brain.state()),
            Self::Splasher(brain) => Some(brain.state()),
            Self::Tower(_) => None,
        }
    }

    /// Soldier role, for soldiers.
    #[must_use]
    pub fn role(&self) -> Option<SoldierRole> {
        match self {
            Self::Soldier(brain) => Some(brain.role()),
            Self::Mopper(_) | Self::Splasher(_) | Self::Tower(_) => None,
        }
    }
}

/// Everything a tick may change. Checkpointed at tick start and restored
/// when the tick faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Navigation memory.
    pub navigator: Navigator,
    /// Last known resupply point.
    pub resupply: ResupplyCache,
    /// Archetype state machine.
    pub brain: Brain,
}

/// Explicit per-unit state passed into every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitContext {
    id: UnitId,
    archetype: UnitArchetype,
    config: AgentConfig,
    /// Persistent mutable state.
    pub state: UnitState,
    turns_alive: u32,
    resigned: bool,
}

impl UnitContext {
    /// Context for a unit spawned this round.
    #[must_use]
    pub fn new(id: UnitId, archetype: UnitArchetype, config: AgentConfig) -> Self {
        Self {
            id,
            archetype,
            state: UnitState {
                navigator: Navigator::new(&config),
                resupply: ResupplyCache::default(),
                brain: Brain::new(archetype),
            },
            config,
            turns_alive: 0,
            resigned: false,
        }
    }

    /// Engine identifier.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Fixed archetype.
    #[must_use]
    pub fn archetype(&self) -> UnitArchetype {
        self.archetype
    }

    /// Team configuration.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Ticks run so far.
    #[must_use]
    pub fn turns_alive(&self) -> u32 {
        self.turns_alive
    }

    /// Whether the unit has resigned.
    #[must_use]
    pub fn resigned(&self) -> bool {
        self.resigned
    }

    /// Behavior state, for mobile units.
    #[must_use]
    pub fn behavior_state(&self) -> Option<BehaviorState> {
        self.state.brain.state()
    }

    /// Soldier role, for soldiers.
    #[must_use]
    pub fn role(&self) -> Option<SoldierRole> {
        self.state.brain.role()
    }

    pub(crate) fn begin_tick(&mut self) {
        self.turns_alive = self.turns_alive.saturating_add(1);
    }

    pub(crate) fn mark_resigned(&mut self) {
        self.resigned = true;
    }

    pub(crate) fn config_and_state(&mut self) -> (&AgentConfig, &mut UnitState) {
        (&self.config, &mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_matches_archetype() {
        let ctx = UnitContext::new(UnitId(7), UnitArchetype::Mopper, AgentConfig::default());
        assert_eq!(ctx.behavior_state(), Some(BehaviorState::Exploring));
        assert_eq!(ctx.role(), None);
        assert_eq!(ctx.turns_alive(), 0);

        let tower = UnitContext::new(UnitId(1), UnitArchetype::Tower, AgentConfig::default());
        assert_eq!(tower.behavior_state(), None);

        let soldier = UnitContext::new(UnitId(2), UnitArchetype::Soldier, AgentConfig::default());
        assert_eq!(soldier.role(), Some(SoldierRole::AreaDeveloper));
    }
}
