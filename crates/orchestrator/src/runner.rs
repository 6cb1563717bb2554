//! Fixed-step scenario runner
//!
//! Drives a [`FluidSolver`] with the scenario's constant `dt` and solver
//! parameters on the calling thread, tracking simulated time and stopping at
//! `max_timesteps` when the scenario sets one.

use kernel::{FluidMetrics, FluidSolver, KernelError, SimulationKernel, SolverParams};
use std::time::Instant;

use crate::config::SimulationConfig;

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Runner created, no step taken yet
    Created,
    /// At least one step taken, stopping condition not reached
    Running,
    /// Reached `max_timesteps`
    Finished,
    /// A step was rejected by the solver
    Error,
}

/// Steps a solver with a scenario's fixed timestep.
#[derive(Debug)]
pub struct ScenarioRunner {
    solver: FluidSolver,
    params: SolverParams,
    dt: f32,
    max_timesteps: Option<u64>,
    state: RunnerState,
    sim_time: f64,
}

impl ScenarioRunner {
    /// Wrap `solver` with the timestep, parameters and stopping condition of
    /// `config`.
    pub fn new(solver: FluidSolver, config: &SimulationConfig) -> Self {
        Self {
            solver,
            params: config.solver,
            dt: config.dt,
            max_timesteps: config.max_timesteps,
            state: RunnerState::Created,
            sim_time: 0.0,
        }
    }

    /// Current runner state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Simulated time so far (seconds)
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Number of timesteps executed
    pub fn timestep_count(&self) -> u64 {
        self.solver.steps_taken()
    }

    /// Parameters applied to the next step.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Replace the parameters used from the next step on.
    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    /// The wrapped solver.
    pub fn solver(&self) -> &FluidSolver {
        &self.solver
    }

    /// Diagnostics for the current particle state.
    pub fn metrics(&self) -> FluidMetrics {
        self.solver.metrics()
    }

    /// Release the solver.
    pub fn into_solver(self) -> FluidSolver {
        self.solver
    }

    /// Run up to `steps` steps, stopping early at `max_timesteps`.
    ///
    /// Returns the number of steps actually taken.
    pub fn run(&mut self, steps: u64) -> Result<u64, KernelError> {
        if self.state == RunnerState::Finished {
            return Ok(0);
        }

        let budget = match self.max_timesteps {
            Some(max_steps) => steps.min(max_steps.saturating_sub(self.timestep_count())),
            None => steps,
        };
        let report_every = (budget / 10).max(1);
        let start_wall_time = Instant::now();

        for step in 0..budget {
            if let Err(e) = self.solver.step(self.dt, &self.params) {
                self.state = RunnerState::Error;
                tracing::error!("Step {} rejected: {}", self.timestep_count() + 1, e);
                return Err(e);
            }
            self.state = RunnerState::Running;
            self.sim_time += self.dt as f64;

            if (step + 1) % report_every == 0 {
                let progress = ((step + 1) as f64 / budget as f64) * 100.0;
                tracing::info!("Progress: {:.0}% ({}/{})", progress, step + 1, budget);
            }
        }

        if let Some(max_steps) = self.max_timesteps {
            if self.timestep_count() >= max_steps {
                tracing::info!("Simulation finished: reached max_timesteps = {}", max_steps);
                self.state = RunnerState::Finished;
            }
        }

        tracing::info!(
            "Ran {} steps ({:.4} s simulated) in {:.3} s wall time",
            budget,
            self.sim_time,
            start_wall_time.elapsed().as_secs_f64()
        );
        Ok(budget)
    }
}
