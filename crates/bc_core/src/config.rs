//! Tunable controller thresholds.
//!
//! Every magic number the state machines and navigator depend on lives in
//! [`AgentConfig`] so that sandbox runs can sweep them from a RON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Parsed values are inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Controller configuration shared by every unit of a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Soldiers (and the resource pattern filler) retreat below this paint level.
    pub low_paint_threshold: i32,
    /// Splashers retreat below this paint level.
    pub splasher_low_paint_threshold: i32,
    /// Moppers retreat below this paint level.
    pub mopper_low_paint_threshold: i32,
    /// Below this, the way home prefers ally-painted tiles.
    pub critical_paint: i32,
    /// A structure must hold more than this before a nearly empty unit drains it.
    pub min_paint_give: i32,
    /// Non-improving greedy calls before obstacle tracing engages.
    pub stall_limit: u32,
    /// Cells probed along the target vector when looking for a cross-point.
    pub wall_probe_depth: i32,
    /// Capacity of the recently-visited ring buffer.
    pub recent_capacity: usize,
    /// Chance that an unstick step is a random walk rather than corner seeking.
    pub random_step_probability: f64,
    /// Frontier score above which a provisional explore target is dropped.
    pub explore_break_score: i32,
    /// A remembered resupply point within this distance that is not seen is forgotten.
    pub resupply_stale_distance_sq: i32,
    /// A corner target within this distance is considered reached.
    pub corner_reached_distance_sq: i32,
    /// Corner targets are recomputed at least this often.
    pub corner_refresh_rounds: u32,
    /// Minimum rounds between two enemy-paint reports from one unit.
    pub enemy_report_cooldown: u32,
    /// Stuck turns before a developer becomes a pattern filler.
    pub developer_lifecycle_turns: u32,
    /// Stuck turns before an advancer becomes a pattern filler.
    pub advancer_lifecycle_turns: u32,
    /// Stuck turns before a pattern filler becomes an advancer.
    pub pattern_lifecycle_turns: u32,
    /// Upper bound on the paint-tower share of newly chosen structures.
    pub paint_tower_share: f64,
    /// Visible enemy paint tiles that make a tower open with a mopper.
    pub opening_mopper_enemy_tiles: usize,
    /// Money needed before a tower spawns its queue head.
    pub spawn_money: i32,
    /// Tower paint needed before it spawns its queue head.
    pub spawn_paint: i32,
    /// Money above which an idle tower refills its queue.
    pub refill_money: i32,
    /// Tower paint above which an idle tower refills its queue.
    pub refill_paint: i32,
    /// Round at which every unit resigns, if any.
    pub resign_after_round: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            low_paint_threshold: 20,
            splasher_low_paint_threshold: 75,
            mopper_low_paint_threshold: 10,
            critical_paint: 6,
            min_paint_give: 50,
            stall_limit: 5,
            wall_probe_depth: 3,
            recent_capacity: 8,
            random_step_probability: 0.5,
            explore_break_score: 45,
            resupply_stale_distance_sq: 20,
            corner_reached_distance_sq: 20,
            corner_refresh_rounds: 60,
            enemy_report_cooldown: 30,
            developer_lifecycle_turns: 100,
            advancer_lifecycle_turns: 30,
            pattern_lifecycle_turns: 50,
            paint_tower_share: 0.5,
            opening_mopper_enemy_tiles: 3,
            spawn_money: 400,
            spawn_paint: 300,
            refill_money: 1200,
            refill_paint: 400,
            resign_after_round: None,
        }
    }
}

impl AgentConfig {
    /// Load a configuration from a RON file. Missing fields take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    /// Parse a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.random_step_probability) {
            return Err(ConfigError::Invalid(format!(
                "random_step_probability {} outside [0, 1]",
                self.random_step_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.paint_tower_share) {
            return Err(ConfigError::Invalid(format!(
                "paint_tower_share {} outside [0, 1]",
                self.paint_tower_share
            )));
        }
        if self.recent_capacity == 0 {
            return Err(ConfigError::Invalid("recent_capacity must be positive".into()));
        }
        if self.stall_limit == 0 {
            return Err(ConfigError::Invalid("stall_limit must be positive".into()));
        }
        Ok(())
    }

    /// Set the soldier low-paint threshold.
    pub fn with_low_paint_threshold(mut self, threshold: i32) -> Self {
        self.low_paint_threshold = threshold;
        self
    }

    /// Set the unstick random-walk probability.
    pub fn with_random_step_probability(mut self, probability: f64) -> Self {
        self.random_step_probability = probability;
        self
    }

    /// Set the resupply staleness distance.
    pub fn with_resupply_stale_distance_sq(mut self, distance_sq: i32) -> Self {
        self.resupply_stale_distance_sq = distance_sq;
        self
    }

    /// Set the resign round.
    pub fn with_resign_after(mut self, round: u32) -> Self {
        self.resign_after_round = Some(round);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = AgentConfig::from_ron("(low_paint_threshold: 35, stall_limit: 3)")
            .expect("parse config");
        assert_eq!(config.low_paint_threshold, 35);
        assert_eq!(config.stall_limit, 3);
        assert_eq!(config.min_paint_give, 50);
    }

    #[test]
    fn test_rejects_bad_probability() {
        let err = AgentConfig::from_ron("(random_step_probability: 1.5)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_builders() {
        let config = AgentConfig::default()
            .with_low_paint_threshold(40)
            .with_resign_after(500);
        assert_eq!(config.low_paint_threshold, 40);
        assert_eq!(config.resign_after_round, Some(500));
    }
}
