//! # Battlecode Test Utilities
//!
//! Shared testing utilities for all crates:
//! - In-memory engine stand-in implementing `WorldQuery`
//! - Sandbox scheduler driving controllers round by round
//! - Map fixtures
//! - Determinism harness and property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod grid_world;
pub mod sandbox;

pub use determinism::strategies;

pub use grid_world::{GridWorld, UnitView, Violation};
pub use sandbox::{MatchStats, RoundStats, Sandbox};

/// Re-export proptest for convenience.
pub use proptest;
