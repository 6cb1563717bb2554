//! SPH Fluid Solver Kernel
//!
//! This crate advances a fixed set of fluid particles inside an axis-aligned
//! box. It is compute-only: the host owns any visual representation, calls
//! [`FluidSolver::step`] once per tick with the elapsed time, and reads the
//! positions back afterwards.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and random seeding.
//! - [`sph`] -- Smoothing kernel, density/pressure, forces, integration.
//! - [`eos`] -- Linear equation of state.
//! - [`neighbor`] -- All-pairs scan and uniform-grid neighbor search.
//! - [`boundary`] -- Container box and position clamping.
//! - [`params`] -- Per-step tunables.
//! - [`error`] -- Configuration errors.

#![warn(missing_docs)]

pub mod boundary;
pub mod eos;
pub mod error;
pub mod neighbor;
pub mod params;
pub mod particle;
pub mod sph;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use boundary::Container;
pub use eos::linear_eos;
pub use error::KernelError;
pub use neighbor::{NeighborGrid, NeighborSearch, Neighborhood};
pub use params::SolverParams;
pub use particle::ParticleArrays;
pub use sph::{weight, weight_gradient_magnitude, ForceBreakdown};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Diagnostic summary of a particle snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluidMetrics {
    /// Smallest particle density.
    pub min_density: f32,
    /// Largest particle density.
    pub max_density: f32,
    /// Mean particle density.
    pub mean_density: f32,
    /// Maximum relative deviation of density from the target density.
    pub max_density_variation: f32,
    /// Total kinetic energy, `sum 0.5 * m * |v|^2`.
    pub kinetic_energy: f64,
    /// Largest particle speed.
    pub max_speed: f32,
}

/// Behavior shared by every solver back-end.
///
/// Each step runs three phases, each completing for all particles before the
/// next begins:
///
/// 1. Density summation and pressure
/// 2. Force computation (pressure + viscosity + gravity)
/// 3. Time integration (semi-implicit Euler) and container clamp
pub trait SimulationKernel {
    /// Execute one simulation step of duration `dt` with the given parameters.
    fn step(&mut self, dt: f32, params: &SolverParams) -> Result<(), KernelError>;

    /// Read back current particle state.
    fn particles(&self) -> &ParticleArrays;

    /// Diagnostics for the current state.
    fn metrics(&self) -> FluidMetrics;

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// FluidSolver -- CPU implementation of SimulationKernel
// ---------------------------------------------------------------------------

/// CPU SPH solver owning the particle store exclusively.
///
/// - Quadratic smoothing kernel normalised by `pi r^4 / 6`
/// - Linear equation of state
/// - Pairwise pressure and velocity-smoothing viscosity, density-scaled gravity
/// - Semi-implicit Euler with per-axis clamping to the container
#[derive(Debug, Clone)]
pub struct FluidSolver {
    /// Fluid particle data.
    particles: ParticleArrays,
    /// Bounding box, centered on the origin.
    container: Container,
    /// Neighbor search strategy.
    search: NeighborSearch,
    /// Lookup structure kept between steps so grids can be reused.
    neighborhood: Option<Neighborhood>,
    /// Parameters used by the most recent step, for metrics.
    last_params: Option<SolverParams>,
    /// Number of completed steps.
    steps_taken: u64,
}

impl FluidSolver {
    /// Allocate `particle_count` particles seeded uniformly inside a box of
    /// `container_size` centered on the origin.
    ///
    /// With `seed` the layout is reproducible; without it the generator is
    /// seeded from OS entropy. Velocity, force, density and pressure start at
    /// zero.
    pub fn initialize(
        particle_count: usize,
        container_size: [f32; 3],
        seed: Option<u64>,
    ) -> Result<Self, KernelError> {
        if particle_count == 0 {
            return Err(KernelError::InvalidParticleCount(particle_count));
        }
        let container = Container::new(container_size)?;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let particles = ParticleArrays::seed_uniform(particle_count, container_size, &mut rng);

        tracing::info!(
            "Initialized {} particles in container {:?} (seed: {:?})",
            particle_count,
            container_size,
            seed
        );

        Ok(Self::assemble(particles, container))
    }

    /// Build a solver around hand-placed particles.
    ///
    /// Every particle must already lie inside the container.
    pub fn from_particles(
        particles: ParticleArrays,
        container_size: [f32; 3],
    ) -> Result<Self, KernelError> {
        if particles.is_empty() {
            return Err(KernelError::InvalidParticleCount(0));
        }
        let container = Container::new(container_size)?;
        for i in 0..particles.len() {
            let position = particles.position(i);
            if !container.contains(position) {
                return Err(KernelError::ParticleOutsideContainer { index: i, position });
            }
        }
        Ok(Self::assemble(particles, container))
    }

    fn assemble(particles: ParticleArrays, container: Container) -> Self {
        Self {
            particles,
            container,
            search: NeighborSearch::default(),
            neighborhood: None,
            last_params: None,
            steps_taken: 0,
        }
    }

    /// Select the neighbor search strategy for subsequent steps.
    pub fn with_neighbor_search(mut self, search: NeighborSearch) -> Self {
        self.set_neighbor_search(search);
        self
    }

    /// Change the neighbor search strategy for subsequent steps.
    pub fn set_neighbor_search(&mut self, search: NeighborSearch) {
        if search != self.search {
            self.search = search;
            self.neighborhood = None;
        }
    }

    /// Active neighbor search strategy.
    pub fn neighbor_search(&self) -> NeighborSearch {
        self.search
    }

    /// The container box.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Number of completed steps.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Positions of every particle, in particle order.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.particles.positions()
    }

    /// Copy positions into a host-owned buffer of exactly `particle_count`
    /// entries.
    pub fn copy_positions_into(&self, out: &mut [[f32; 3]]) -> Result<(), KernelError> {
        if out.len() != self.particles.len() {
            return Err(KernelError::PositionBufferMismatch {
                expected: self.particles.len(),
                actual: out.len(),
            });
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.particles.position(i);
        }
        Ok(())
    }

    /// Force contributions the next step would compute, per particle.
    ///
    /// Runs the density and force stages on a copy of the current snapshot,
    /// leaving the solver untouched.
    pub fn preview_forces(&self, params: &SolverParams) -> Result<Vec<ForceBreakdown>, KernelError> {
        params.validate()?;
        let neighborhood = Neighborhood::build(
            self.search,
            &self.particles,
            &self.container,
            params.smoothing_radius,
            None,
        );
        let mut snapshot = self.particles.clone();
        sph::compute_density_and_pressure(&mut snapshot, &neighborhood, params);
        Ok((0..snapshot.len())
            .map(|i| sph::force_breakdown(i, &snapshot, &neighborhood, params))
            .collect())
    }

    fn warn_on_grid_fallback(&self, neighborhood: &Neighborhood, radius: f32) {
        if self.search == NeighborSearch::UniformGrid && matches!(neighborhood, Neighborhood::AllPairs) {
            tracing::warn!(
                "Uniform grid unavailable for smoothing radius {} in container {:?}; using all-pairs search",
                radius,
                self.container.size()
            );
        }
    }
}

impl SimulationKernel for FluidSolver {
    fn step(&mut self, dt: f32, params: &SolverParams) -> Result<(), KernelError> {
        params.validate()?;
        let radius = params.smoothing_radius;

        // --- 0. Neighbor lookup for this step's position snapshot ---
        let previous = self.neighborhood.take();
        let fell_back_before = matches!(previous, Some(Neighborhood::AllPairs));
        let neighborhood = Neighborhood::build(
            self.search,
            &self.particles,
            &self.container,
            radius,
            previous,
        );
        if !fell_back_before {
            self.warn_on_grid_fallback(&neighborhood, radius);
        }

        // --- 1. Density and pressure ---
        sph::compute_density_and_pressure(&mut self.particles, &neighborhood, params);

        // --- 2. Forces ---
        sph::compute_forces(&mut self.particles, &neighborhood, params);

        // --- 3. Integrate and clamp ---
        sph::integrate(&mut self.particles, &self.container, dt);

        self.neighborhood = Some(neighborhood);
        self.last_params = Some(*params);
        self.steps_taken += 1;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let m = self.metrics();
            tracing::debug!(
                "Step {}: dt={:.6}, density [{:.4}, {:.4}] mean {:.4}, max speed {:.4}",
                self.steps_taken,
                dt,
                m.min_density,
                m.max_density,
                m.mean_density,
                m.max_speed
            );
        }
        Ok(())
    }

    fn particles(&self) -> &ParticleArrays {
        &self.particles
    }

    fn metrics(&self) -> FluidMetrics {
        let n = self.particles.len();
        if n == 0 {
            return FluidMetrics::default();
        }
        let params = self.last_params.unwrap_or_default();

        let mut min_density = f32::INFINITY;
        let mut max_density = f32::NEG_INFINITY;
        let mut density_sum = 0.0_f64;
        let mut max_density_var = 0.0_f32;
        let mut kinetic = 0.0_f64;
        let mut max_speed = 0.0_f32;

        for i in 0..n {
            let rho = self.particles.density[i];
            min_density = min_density.min(rho);
            max_density = max_density.max(rho);
            density_sum += rho as f64;

            if params.target_density != 0.0 {
                let var = (rho - params.target_density).abs() / params.target_density.abs();
                max_density_var = max_density_var.max(var);
            }

            let [vx, vy, vz] = self.particles.velocity(i);
            let speed_sq = vx * vx + vy * vy + vz * vz;
            kinetic += 0.5 * params.particle_mass as f64 * speed_sq as f64;
            max_speed = max_speed.max(speed_sq.sqrt());
        }

        FluidMetrics {
            min_density,
            max_density,
            mean_density: (density_sum / n as f64) as f32,
            max_density_variation: max_density_var,
            kinetic_energy: kinetic,
            max_speed,
        }
    }

    fn particle_count(&self) -> usize {
        self.particles.len()
    }
}
