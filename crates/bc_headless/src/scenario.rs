//! Scenario loading and configuration.
//!
//! A scenario names a map, how many rounds to play, the seed, and the
//! controller configuration of each team. Scenarios are RON files or one
//! of the built-in presets.

use std::path::Path;

use bc_core::config::{AgentConfig, ConfigError};
use bc_test_utils::sandbox::DEFAULT_SEED;
use bc_test_utils::{fixtures, GridWorld, Sandbox};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names accepted by [`Scenario::preset`].
pub const PRESETS: [&str; 3] = ["standard", "small", "open"];

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Neither a file nor a preset.
    #[error("Unknown scenario '{0}' (presets: standard, small, open)")]
    UnknownPreset(String),
    /// A drawn map with no rows.
    #[error("Scenario map is empty")]
    EmptyMap,
    /// A team config failed validation.
    #[error("Invalid team config: {0}")]
    Config(#[from] ConfigError),
}

/// How the scenario's map is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapSpec {
    /// The 30x30 two-tower map.
    Standard,
    /// A square two-tower map of the given side.
    TwoTowers(i32),
    /// An empty map with no units.
    Open {
        /// Map width.
        width: i32,
        /// Map height.
        height: i32,
    },
    /// A map drawn as text, top row first.
    Ascii(String),
}

impl Default for MapSpec {
    fn default() -> Self {
        Self::Standard
    }
}

impl MapSpec {
    /// Build a fresh world.
    pub fn build(&self) -> Result<GridWorld, ScenarioError> {
        match self {
            Self::Standard => Ok(fixtures::standard_match()),
            Self::TwoTowers(size) => Ok(fixtures::two_tower_match(*size)),
            Self::Open { width, height } => Ok(fixtures::open_map(*width, *height)),
            Self::Ascii(text) => {
                if text.lines().all(|row| row.trim().is_empty()) {
                    return Err(ScenarioError::EmptyMap);
                }
                Ok(fixtures::from_ascii(text))
            }
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Map to play on.
    pub map: MapSpec,
    /// Rounds per match.
    pub rounds: u32,
    /// Seed used when the command line gives none.
    pub seed: u64,
    /// Controller config of team A.
    pub team_a: AgentConfig,
    /// Controller config of team B.
    pub team_b: AgentConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            description: "Mirrored 30x30 map, one paint tower per team".to_string(),
            map: MapSpec::Standard,
            rounds: 300,
            seed: DEFAULT_SEED,
            team_a: AgentConfig::default(),
            team_b: AgentConfig::default(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.team_a.validate()?;
        scenario.team_b.validate()?;
        Ok(scenario)
    }

    /// A built-in scenario by name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::default()),
            "small" => Some(Self {
                name: "small".to_string(),
                description: "Mirrored 20x20 map for quick checks".to_string(),
                map: MapSpec::TwoTowers(20),
                rounds: 150,
                ..Self::default()
            }),
            "open" => Some(Self {
                name: "open".to_string(),
                description: "Empty 20x20 map with no units".to_string(),
                map: MapSpec::Open { width: 20, height: 20 },
                rounds: 10,
                ..Self::default()
            }),
            _ => None,
        }
    }

    /// Interpret a command-line argument: an existing file, else a preset.
    pub fn resolve(arg: &str) -> Result<Self, ScenarioError> {
        let path = Path::new(arg);
        if path.exists() {
            return Self::load(path);
        }
        if path.extension().is_some_and(|ext| ext == "ron") {
            return Err(ScenarioError::FileNotFound(arg.to_string()));
        }
        Self::preset(arg).ok_or_else(|| ScenarioError::UnknownPreset(arg.to_string()))
    }

    /// Use `config` for both teams.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.team_a = config.clone();
        self.team_b = config;
        self
    }

    /// A sandbox ready to play this scenario with `seed`.
    pub fn sandbox(&self, seed: u64) -> Result<Sandbox, ScenarioError> {
        let world = self.map.build()?;
        Ok(Sandbox::with_configs(
            world,
            self.team_a.clone(),
            self.team_b.clone(),
            seed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use bc_core::world::Team;

    use super::*;

    #[test]
    fn test_presets_resolve() {
        for name in PRESETS {
            let scenario = Scenario::resolve(name).expect("preset");
            assert_eq!(scenario.name, name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert!(matches!(
            Scenario::resolve("no_such_scenario"),
            Err(ScenarioError::UnknownPreset(_))
        ));
        assert!(matches!(
            Scenario::resolve("missing.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "duel",
                map: TwoTowers(24),
                rounds: 80,
                team_b: (low_paint_threshold: 40),
            )"#,
        )
        .expect("parse");
        assert_eq!(scenario.map, MapSpec::TwoTowers(24));
        assert_eq!(scenario.rounds, 80);
        assert_eq!(scenario.seed, DEFAULT_SEED);
        assert_eq!(scenario.team_a, AgentConfig::default());
        assert_eq!(scenario.team_b.low_paint_threshold, 40);
    }

    #[test]
    fn test_ascii_map() {
        let source = r#"(map: Ascii("A...\n....\n...B"))"#;
        let scenario = Scenario::from_ron_str(source).expect("parse");
        let world = scenario.map.build().expect("map");
        assert_eq!(world.bounds(), (4, 3));
        assert_eq!(world.units().count(), 2);
    }

    #[test]
    fn test_empty_ascii_map_is_rejected() {
        assert!(matches!(
            MapSpec::Ascii("  \n".to_string()).build(),
            Err(ScenarioError::EmptyMap)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tiny.ron");
        let source = r#"(name: "tiny", map: Open(width: 8, height: 8), rounds: 3)"#;
        std::fs::write(&path, source).expect("write");

        let scenario = Scenario::resolve(path.to_str().expect("utf-8 path")).expect("load");
        assert_eq!(scenario.name, "tiny");
        let mut sandbox = scenario.sandbox(1).expect("sandbox");
        assert_eq!(sandbox.run(scenario.rounds).rounds, 3);
    }

    #[test]
    fn test_bundled_scenarios_parse() {
        let duel = Scenario::from_ron_str(include_str!("../scenarios/duel.ron")).expect("duel");
        assert_eq!(duel.name, "duel");
        assert_eq!(duel.team_b.low_paint_threshold, 40);
        assert!(duel.map.build().is_ok());

        let corridor =
            Scenario::from_ron_str(include_str!("../scenarios/corridor.ron")).expect("corridor");
        let world = corridor.map.build().expect("map");
        assert_eq!(world.bounds(), (20, 11));
        assert_eq!(world.tower_count(Team::A), 1);
        assert_eq!(world.tower_count(Team::B), 1);
    }
}
