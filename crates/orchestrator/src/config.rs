//! Scenario configuration parsing and validation

use std::fs;
use std::path::{Path, PathBuf};

use kernel::{FluidSolver, KernelError, NeighborSearch, SolverParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a scenario or building its solver.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid scenario JSON.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds a value the solver cannot run with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The kernel rejected the solver setup.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Main scenario configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable scenario name
    pub name: String,
    /// Number of particles to seed
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Full container extent per axis, centered on the origin
    #[serde(default = "default_container_size")]
    pub container_size: [f32; 3],
    /// Seed for the initial layout; `None` draws from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
    /// Fixed step duration (seconds)
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Solver tunables passed to every step
    #[serde(default)]
    pub solver: SolverParams,
    /// Neighbor search strategy
    #[serde(default)]
    pub neighbor_search: NeighborSearch,
    /// Stop after this many timesteps
    #[serde(default)]
    pub max_timesteps: Option<u64>,
}

// Default values
fn default_particle_count() -> usize {
    1000
}

fn default_container_size() -> [f32; 3] {
    [10.0, 10.0, 10.0]
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            particle_count: default_particle_count(),
            container_size: default_container_size(),
            seed: None,
            dt: default_dt(),
            solver: SolverParams::default(),
            neighbor_search: NeighborSearch::default(),
            max_timesteps: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 {
            return Err(KernelError::InvalidParticleCount(0).into());
        }

        for (axis, &extent) in ['x', 'y', 'z'].iter().zip(self.container_size.iter()) {
            if !(extent.is_finite() && extent > 0.0) {
                return Err(KernelError::InvalidContainer { axis: *axis, value: extent }.into());
            }
        }

        if !(self.dt.is_finite() && self.dt >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "dt must be finite and non-negative, got {}",
                self.dt
            )));
        }

        if let Some(max_timesteps) = self.max_timesteps {
            if max_timesteps == 0 {
                return Err(ConfigError::Invalid("max_timesteps must be at least 1".to_string()));
            }
        }

        self.solver.validate()?;

        let radius = self.solver.smoothing_radius;
        if self.container_size.iter().any(|&extent| extent < radius) {
            tracing::warn!(
                "Scenario '{}': container {:?} is smaller than the smoothing radius {}",
                self.name,
                self.container_size,
                radius
            );
        }

        Ok(())
    }

    /// Seed a solver for this scenario.
    pub fn build_solver(&self) -> Result<FluidSolver, ConfigError> {
        let solver = FluidSolver::initialize(self.particle_count, self.container_size, self.seed)?
            .with_neighbor_search(self.neighbor_search);
        Ok(solver)
    }
}
