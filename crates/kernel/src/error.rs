//! Configuration errors reported by the solver.
//!
//! Numerical degeneracies (coincident particles, zero neighbor density) are
//! never errors; they are skipped inside the stages. Everything here is a
//! caller mistake detected on entry to `initialize` or `step`.

use thiserror::Error;

/// Errors returned by [`FluidSolver`](crate::FluidSolver) entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// Zero particles were requested.
    #[error("particle count must be positive, got {0}")]
    InvalidParticleCount(usize),

    /// A container axis is non-positive or not finite.
    #[error("container size along {axis} must be positive and finite, got {value}")]
    InvalidContainer {
        /// Axis name (`x`, `y` or `z`).
        axis: char,
        /// Offending extent.
        value: f32,
    },

    /// Smoothing radius is non-positive or not finite.
    #[error("smoothing radius must be positive and finite, got {0}")]
    InvalidSmoothingRadius(f32),

    /// Any other solver parameter that failed validation.
    #[error("solver parameter `{name}` is invalid: {value}")]
    InvalidParameter {
        /// Parameter name as it appears in [`SolverParams`](crate::SolverParams).
        name: &'static str,
        /// Offending value.
        value: f32,
    },

    /// A hand-placed particle lies outside the container.
    #[error("particle {index} at {position:?} lies outside the container")]
    ParticleOutsideContainer {
        /// Particle index.
        index: usize,
        /// Offending position.
        position: [f32; 3],
    },

    /// Host position buffer does not match the particle count.
    #[error("position buffer holds {actual} entries, expected {expected}")]
    PositionBufferMismatch {
        /// Particle count.
        expected: usize,
        /// Buffer length supplied by the caller.
        actual: usize,
    },
}
