//! Tunable solver parameters, passed by value into every step.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Global fluid parameters shared by every particle.
///
/// Defaults reproduce the stock scene: unit mass and radius, a rest density
/// of 1000 and a fairly soft pressure response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Mass of every particle.
    pub particle_mass: f32,
    /// Interaction cutoff. Particles farther apart than this never interact.
    pub smoothing_radius: f32,
    /// Rest density used by the equation of state.
    pub target_density: f32,
    /// Stiffness of the linear equation of state.
    pub pressure_constant: f32,
    /// Scale of the velocity-smoothing viscosity term.
    pub viscosity_constant: f32,
    /// Body acceleration, multiplied by local density to get the body force.
    pub gravity: [f32; 3],
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            particle_mass: 1.0,
            smoothing_radius: 1.0,
            target_density: 1000.0,
            pressure_constant: 200.0,
            viscosity_constant: 0.01,
            gravity: [0.0, -9.81, 0.0],
        }
    }
}

impl SolverParams {
    /// Check that every parameter can drive a step.
    ///
    /// Radius and mass must be positive; the constants and gravity only need
    /// to be finite (negative stiffness or viscosity is odd but computable).
    pub fn validate(&self) -> Result<(), KernelError> {
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius > 0.0) {
            return Err(KernelError::InvalidSmoothingRadius(self.smoothing_radius));
        }
        if !(self.particle_mass.is_finite() && self.particle_mass > 0.0) {
            return Err(KernelError::InvalidParameter {
                name: "particle_mass",
                value: self.particle_mass,
            });
        }

        let scalars = [
            ("target_density", self.target_density),
            ("pressure_constant", self.pressure_constant),
            ("viscosity_constant", self.viscosity_constant),
            ("gravity", self.gravity[0]),
            ("gravity", self.gravity[1]),
            ("gravity", self.gravity[2]),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(KernelError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Builder-style override of the gravity vector.
    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder-style override of the smoothing radius.
    pub fn with_smoothing_radius(mut self, smoothing_radius: f32) -> Self {
        self.smoothing_radius = smoothing_radius;
        self
    }
}
