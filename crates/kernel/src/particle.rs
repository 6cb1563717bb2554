//! Particle store using struct-of-arrays layout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same particle.
/// Separate x/y/z arrays (rather than a vector type) keep each stage a plain
/// indexed loop over contiguous `f32` slices.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleArrays {
    // ---- Positions ----
    /// X positions
    pub x: Vec<f32>,
    /// Y positions
    pub y: Vec<f32>,
    /// Z positions
    pub z: Vec<f32>,

    // ---- Velocities ----
    /// X velocities
    pub vx: Vec<f32>,
    /// Y velocities
    pub vy: Vec<f32>,
    /// Z velocities
    pub vz: Vec<f32>,

    // ---- Net force, recomputed every step ----
    /// X force
    pub fx: Vec<f32>,
    /// Y force
    pub fy: Vec<f32>,
    /// Z force
    pub fz: Vec<f32>,

    // ---- Scalar fields, recomputed every step ----
    /// Density estimate
    pub density: Vec<f32>,
    /// Pressure from the equation of state (may be negative)
    pub pressure: Vec<f32>,
}

impl ParticleArrays {
    /// Create an empty particle collection with no particles allocated.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty collection with room for `n` particles.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            vz: Vec::with_capacity(n),
            fx: Vec::with_capacity(n),
            fy: Vec::with_capacity(n),
            fz: Vec::with_capacity(n),
            density: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
        }
    }

    /// Seed `count` particles uniformly inside the origin-centered box
    /// `[-size/2, size/2]` on each axis.
    ///
    /// Velocity, force, density and pressure start at zero.
    pub fn seed_uniform(count: usize, container_size: [f32; 3], rng: &mut StdRng) -> Self {
        let half = [
            0.5 * container_size[0],
            0.5 * container_size[1],
            0.5 * container_size[2],
        ];
        let mut particles = Self::with_capacity(count);
        for _ in 0..count {
            let px = rng.gen_range(-half[0]..=half[0]);
            let py = rng.gen_range(-half[1]..=half[1]);
            let pz = rng.gen_range(-half[2]..=half[2]);
            particles.push_particle([px, py, pz]);
        }
        particles
    }

    /// Same as [`seed_uniform`](Self::seed_uniform) with a fixed seed.
    pub fn seed_uniform_with_seed(count: usize, container_size: [f32; 3], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::seed_uniform(count, container_size, &mut rng)
    }

    /// Return the number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a particle at rest at `position`.
    pub fn push_particle(&mut self, position: [f32; 3]) {
        self.x.push(position[0]);
        self.y.push(position[1]);
        self.z.push(position[2]);
        self.vx.push(0.0);
        self.vy.push(0.0);
        self.vz.push(0.0);
        self.fx.push(0.0);
        self.fy.push(0.0);
        self.fz.push(0.0);
        self.density.push(0.0);
        self.pressure.push(0.0);
    }

    /// Position of particle `i`.
    #[inline]
    pub fn position(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Velocity of particle `i`.
    #[inline]
    pub fn velocity(&self, i: usize) -> [f32; 3] {
        [self.vx[i], self.vy[i], self.vz[i]]
    }

    /// Net force on particle `i` from the last step.
    #[inline]
    pub fn force(&self, i: usize) -> [f32; 3] {
        [self.fx[i], self.fy[i], self.fz[i]]
    }

    /// Overwrite the velocity of particle `i`.
    pub fn set_velocity(&mut self, i: usize, velocity: [f32; 3]) {
        self.vx[i] = velocity[0];
        self.vy[i] = velocity[1];
        self.vz[i] = velocity[2];
    }

    /// Export all positions as packed triples, in particle order.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        (0..self.len()).map(|i| self.position(i)).collect()
    }
}

impl Default for ParticleArrays {
    fn default() -> Self {
        Self::new()
    }
}
