//! Orchestration Layer
//!
//! This crate turns a JSON scenario description into a ready-to-step SPH
//! solver:
//! - Scenario configuration parsing, defaults and validation
//! - Seeded solver construction
//! - Fixed-step scenario runner

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::{ConfigError, SimulationConfig};
pub use runner::{RunnerState, ScenarioRunner};

use std::path::Path;

/// Create a complete simulation from a configuration file
///
/// 1. Load and validate the configuration
/// 2. Seed the solver with the configured particle count and container
/// 3. Wrap it in a [`ScenarioRunner`] using the configured `dt`
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let mut runner = create_simulation("configs/default-box.json")?;
/// runner.run(60)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<ScenarioRunner, ConfigError> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    create_simulation_from_config(&config)
}

/// Same as [`create_simulation`] for an already loaded configuration.
pub fn create_simulation_from_config(
    config: &SimulationConfig,
) -> Result<ScenarioRunner, ConfigError> {
    let solver = config.build_solver()?;
    tracing::info!(
        "Scenario '{}': {} particles, {:?} search, dt={}",
        config.name,
        config.particle_count,
        config.neighbor_search,
        config.dt
    );
    Ok(ScenarioRunner::new(solver, config))
}
