//! Closed-form expectations the solver can be checked against.
//!
//! All values are computed in `f64` from the kernel definition
//! `W(d, r) = (r - d)^2 / (pi r^4 / 6)` rather than through the solver's own
//! functions, so a regression in the kernel shows up as a mismatch here.

use std::f64::consts::PI;

/// Density of a particle with no neighbors: only its self-contribution.
///
/// ```text
/// rho = m * W(0, r) = m * 6 / (pi r^2)
/// ```
pub fn isolated_density(mass: f64, radius: f64) -> f64 {
    mass * 6.0 / (PI * radius * radius)
}

/// Kernel value from its definition.
pub fn kernel_weight(distance: f64, radius: f64) -> f64 {
    if distance >= radius {
        return 0.0;
    }
    let q = radius - distance;
    q * q / (PI * radius.powi(4) / 6.0)
}

/// Magnitude of the pressure force between two isolated particles at rest.
///
/// Both particles have the same density `rho = m (W(0) + W(d))`, so
///
/// ```text
/// |F| = |P| * m / rho * 2 (r - d) / (pi r^4 / 6)
/// ```
///
/// with `P = k (rho - rho0)`. Zero when the pair is out of range.
pub fn pair_pressure_force(
    separation: f64,
    radius: f64,
    mass: f64,
    target_density: f64,
    pressure_constant: f64,
) -> f64 {
    if separation >= radius || separation <= 0.0 {
        return 0.0;
    }
    let rho = mass * (kernel_weight(0.0, radius) + kernel_weight(separation, radius));
    let pressure = pressure_constant * (rho - target_density);
    let grad = 2.0 * (radius - separation) / (PI * radius.powi(4) / 6.0);
    pressure.abs() * mass / rho * grad
}

/// Trajectory of a lone particle under a constant body force, integrated with
/// semi-implicit Euler at a fixed step.
///
/// The force is applied directly as acceleration, so with
/// `a = g * rho_isolated`:
///
/// ```text
/// v_n = n a dt
/// y_n = y_0 + a dt^2 n (n + 1) / 2
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SemiImplicitFreeFall {
    /// Starting height
    pub y0: f64,
    /// Constant acceleration along y
    pub accel: f64,
    /// Step duration
    pub dt: f64,
}

impl SemiImplicitFreeFall {
    /// Fall of an isolated particle of `mass` and kernel `radius` under
    /// gravity `g` (signed, along y).
    pub fn for_isolated_particle(y0: f64, g: f64, mass: f64, radius: f64, dt: f64) -> Self {
        Self {
            y0,
            accel: g * isolated_density(mass, radius),
            dt,
        }
    }

    /// Velocity after `n` steps.
    pub fn velocity_after(&self, n: u64) -> f64 {
        n as f64 * self.accel * self.dt
    }

    /// Height after `n` steps, ignoring walls.
    pub fn position_after(&self, n: u64) -> f64 {
        let n = n as f64;
        self.y0 + self.accel * self.dt * self.dt * n * (n + 1.0) / 2.0
    }

    /// First step count at which the particle has fallen to `floor_y`, if
    /// the acceleration points toward it.
    pub fn steps_to_reach(&self, floor_y: f64) -> Option<u64> {
        if floor_y >= self.y0 {
            return Some(0);
        }
        if self.accel >= 0.0 || self.dt <= 0.0 {
            return None;
        }
        let mut n = 0u64;
        while self.position_after(n) > floor_y {
            n += 1;
        }
        Some(n)
    }
}
