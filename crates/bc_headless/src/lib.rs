//! Headless match runner for controller testing and CI verification.
//!
//! Plays sandbox matches between two teams of controllers on the in-memory
//! grid world, without an engine:
//!
//! - **Run**: one match, summary on stderr, metrics as JSON
//! - **Batch**: many seeds in parallel, aggregated results
//! - **Verify**: replay one seed and compare state hashes
//!
//! Scenarios are RON files (see `scenarios/`) or built-in presets.
//!
//! # Example
//!
//! ```bash
//! # Play the standard preset
//! cargo run -p bc_headless -- run
//!
//! # 50 seeds of a scenario file on 4 threads
//! cargo run -p bc_headless -- batch -s crates/bc_headless/scenarios/duel.ron -c 50 -p 4
//!
//! # Verify determinism
//! cargo run -p bc_headless -- verify -s small --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod scenario;

pub use batch::{run_batch, run_match, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, MatchMetrics, TeamMetrics};
pub use scenario::{MapSpec, Scenario, ScenarioError};
