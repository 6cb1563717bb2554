//! SPH smoothing kernel functions and the three per-step operators.
//!
//! The kernel is a quadratic falloff `(r - d)^2` normalised by `pi r^4 / 6`.
//! That constant integrates the kernel to one over a disc, not a ball. It is
//! kept as-is: changing it rescales every density and therefore the
//! stiffness of the simulated fluid.
//!
//! Operators run in a fixed order each step, each one finishing for all
//! particles before the next starts:
//! 1. [`compute_density_and_pressure`]
//! 2. [`compute_forces`]
//! 3. [`integrate`]
//!
//! The first two read an immutable snapshot and compute every particle's
//! output in parallel, then write the results back in index order.

use std::f32::consts::PI;

use rayon::prelude::*;

use crate::boundary::Container;
use crate::eos;
use crate::neighbor::Neighborhood;
use crate::params::SolverParams;
use crate::particle::ParticleArrays;

/// Normalization constant shared by [`weight`] and [`weight_gradient_magnitude`].
///
/// ```text
/// V(r) = pi * r^4 / 6
/// ```
#[inline]
pub fn volume_norm(radius: f32) -> f32 {
    PI * radius.powi(4) / 6.0
}

/// Smoothing kernel.
///
/// ```text
/// W(d, r) = (r - d)^2 / V(r)   for d < r
/// W(d, r) = 0                  for d >= r
/// ```
///
/// # Arguments
/// * `distance` - Distance between two particles (>= 0).
/// * `radius` - Smoothing radius (support of the kernel).
pub fn weight(distance: f32, radius: f32) -> f32 {
    if distance >= radius {
        return 0.0;
    }
    let t = radius - distance;
    t * t / volume_norm(radius)
}

/// Derivative of [`weight`] with respect to distance.
///
/// ```text
/// dW/dd = -2 (r - d) / V(r)   for d < r
/// dW/dd = 0                   for d >= r
/// ```
///
/// Always <= 0 inside the support.
pub fn weight_gradient_magnitude(distance: f32, radius: f32) -> f32 {
    if distance >= radius {
        return 0.0;
    }
    -2.0 * (radius - distance) / volume_norm(radius)
}

// ---------------------------------------------------------------------------
// Stage 1: density summation + equation of state
// ---------------------------------------------------------------------------

/// Density of particle `i` from the current position snapshot.
///
/// ```text
/// rho_i = sum_j m * W(|x_i - x_j|, r)
/// ```
///
/// The sum includes `i` itself, so the result is never below `m * W(0, r)`.
pub fn density_at(
    i: usize,
    particles: &ParticleArrays,
    neighborhood: &Neighborhood,
    params: &SolverParams,
) -> f32 {
    let r = params.smoothing_radius;
    let m = params.particle_mass;

    // Self-contribution
    let mut rho = m * weight(0.0, r);

    neighborhood.for_each_neighbor(i, particles, r, |j| {
        let dx = particles.x[i] - particles.x[j];
        let dy = particles.y[i] - particles.y[j];
        let dz = particles.z[i] - particles.z[j];
        let d = (dx * dx + dy * dy + dz * dz).sqrt();
        rho += m * weight(d, r);
    });

    rho
}

/// Recompute density and pressure for every particle.
///
/// Reads positions only. Both fields are overwritten; nothing from the
/// previous step survives.
pub fn compute_density_and_pressure(
    particles: &mut ParticleArrays,
    neighborhood: &Neighborhood,
    params: &SolverParams,
) {
    let snapshot: &ParticleArrays = particles;
    let densities: Vec<f32> = (0..snapshot.len())
        .into_par_iter()
        .map(|i| density_at(i, snapshot, neighborhood, params))
        .collect();

    for (i, rho) in densities.into_iter().enumerate() {
        particles.density[i] = rho;
        particles.pressure[i] =
            eos::linear_eos(rho, params.target_density, params.pressure_constant);
    }
}

// ---------------------------------------------------------------------------
// Stage 2: forces
// ---------------------------------------------------------------------------

/// Net force on one particle split into its three contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceBreakdown {
    /// Pressure-gradient force summed over neighbors.
    pub pressure: [f32; 3],
    /// Velocity-smoothing viscosity force summed over neighbors.
    pub viscosity: [f32; 3],
    /// Body force, `gravity * density`.
    pub gravity: [f32; 3],
}

impl ForceBreakdown {
    /// Sum of the three contributions.
    #[inline]
    pub fn total(&self) -> [f32; 3] {
        [
            self.pressure[0] + self.viscosity[0] + self.gravity[0],
            self.pressure[1] + self.viscosity[1] + self.gravity[1],
            self.pressure[2] + self.viscosity[2] + self.gravity[2],
        ]
    }
}

/// Force contributions on particle `i`.
///
/// For every neighbor `j` at distance `d < r`, with `n = (x_j - x_i) / d`:
///
/// ```text
/// F_p += -n * (P_i + P_j)/2 * m / rho_j * dW(d, r)
/// F_v += mu * m * (v_j - v_i) / rho_j * W(d, r)
/// ```
///
/// and `F_g = g * rho_i`. Each side divides by the *neighbor's* density, so
/// the pair forces are not exactly equal and opposite when densities differ.
///
/// Pairs at zero separation (no direction) or with zero neighbor density are
/// skipped. So is any pair whose contribution is not finite.
pub fn force_breakdown(
    i: usize,
    particles: &ParticleArrays,
    neighborhood: &Neighborhood,
    params: &SolverParams,
) -> ForceBreakdown {
    let r = params.smoothing_radius;
    let m = params.particle_mass;
    let mu = params.viscosity_constant;

    let mut pressure = [0.0f32; 3];
    let mut viscosity = [0.0f32; 3];

    neighborhood.for_each_neighbor(i, particles, r, |j| {
        let dx = particles.x[j] - particles.x[i];
        let dy = particles.y[j] - particles.y[i];
        let dz = particles.z[j] - particles.z[i];
        let d = (dx * dx + dy * dy + dz * dz).sqrt();
        let rho_j = particles.density[j];
        if d <= 0.0 || rho_j == 0.0 {
            return;
        }

        let inv_d = 1.0 / d;
        let n = [dx * inv_d, dy * inv_d, dz * inv_d];

        let avg_pressure = 0.5 * (particles.pressure[i] + particles.pressure[j]);
        let p_scale = -avg_pressure * m / rho_j * weight_gradient_magnitude(d, r);
        let v_scale = mu * m / rho_j * weight(d, r);
        let fp = n.map(|c| c * p_scale);
        let fv = [
            (particles.vx[j] - particles.vx[i]) * v_scale,
            (particles.vy[j] - particles.vy[i]) * v_scale,
            (particles.vz[j] - particles.vz[i]) * v_scale,
        ];
        // Overflowed pair, e.g. inf - inf in the velocity difference.
        if !fp.iter().chain(&fv).all(|c| c.is_finite()) {
            return;
        }

        for axis in 0..3 {
            pressure[axis] += fp[axis];
            viscosity[axis] += fv[axis];
        }
    });

    let rho_i = particles.density[i];
    let gravity = [
        params.gravity[0] * rho_i,
        params.gravity[1] * rho_i,
        params.gravity[2] * rho_i,
    ];

    ForceBreakdown {
        pressure,
        viscosity,
        gravity,
    }
}

/// Recompute the net force on every particle.
///
/// Requires density and pressure from [`compute_density_and_pressure`] for
/// the same snapshot. Forces are rebuilt from zero, never accumulated across
/// steps.
pub fn compute_forces(
    particles: &mut ParticleArrays,
    neighborhood: &Neighborhood,
    params: &SolverParams,
) {
    let snapshot: &ParticleArrays = particles;
    let forces: Vec<[f32; 3]> = (0..snapshot.len())
        .into_par_iter()
        .map(|i| force_breakdown(i, snapshot, neighborhood, params).total())
        .collect();

    for (i, f) in forces.into_iter().enumerate() {
        particles.fx[i] = f[0];
        particles.fy[i] = f[1];
        particles.fz[i] = f[2];
    }
}

// ---------------------------------------------------------------------------
// Stage 3: semi-implicit Euler + container clamp
// ---------------------------------------------------------------------------

/// Advance velocity then position, and clamp into the container.
///
/// ```text
/// v += F * dt
/// x += v * dt
/// ```
///
/// The force is applied directly as an acceleration (no division by mass).
/// Clamping leaves velocity untouched. A coordinate that comes out NaN keeps
/// its pre-step value.
pub fn integrate(particles: &mut ParticleArrays, container: &Container, dt: f32) {
    for i in 0..particles.len() {
        particles.vx[i] += particles.fx[i] * dt;
        particles.vy[i] += particles.fy[i] * dt;
        particles.vz[i] += particles.fz[i] * dt;

        let previous = particles.position(i);
        let next = [
            previous[0] + particles.vx[i] * dt,
            previous[1] + particles.vy[i] * dt,
            previous[2] + particles.vz[i] * dt,
        ];
        let [x, y, z] = container.clamp_step(previous, next);
        particles.x[i] = x;
        particles.y[i] = y;
        particles.z[i] = z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particles_from(points: &[[f32; 3]]) -> ParticleArrays {
        let mut pa = ParticleArrays::new();
        for &p in points {
            pa.push_particle(p);
        }
        pa
    }

    #[test]
    fn kernel_at_zero_distance() {
        let r = 2.0_f32;
        let w = weight(0.0, r);
        // W(0, r) = r^2 / (pi r^4 / 6) = 6 / (pi r^2)
        let expected = 6.0 / (PI * r * r);
        assert!((w - expected).abs() < 1.0e-6, "w={w}, expected={expected}");
    }

    #[test]
    fn kernel_at_support_radius() {
        assert_eq!(weight(1.0, 1.0), 0.0);
        assert_eq!(weight_gradient_magnitude(1.0, 1.0), 0.0);
    }

    #[test]
    fn kernel_beyond_support() {
        assert_eq!(weight(5.0, 1.0), 0.0);
        assert_eq!(weight_gradient_magnitude(5.0, 1.0), 0.0);
    }

    #[test]
    fn kernel_positive_inside_support() {
        let r = 0.5;
        for i in 0..50 {
            let d = (i as f32) * 0.01; // 0.00 .. 0.49
            assert!(weight(d, r) > 0.0, "kernel should be positive at d={d}");
            assert!(weight_gradient_magnitude(d, r) < 0.0, "gradient should be negative at d={d}");
        }
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let r = 1.5_f32;
        let eps = 1.0e-3_f32;
        for &d in &[0.1_f32, 0.4, 0.75, 1.2] {
            let numeric = (weight(d + eps, r) - weight(d - eps, r)) / (2.0 * eps);
            let analytic = weight_gradient_magnitude(d, r);
            assert!(
                (numeric - analytic).abs() < 1.0e-3,
                "d={d}: numeric={numeric}, analytic={analytic}"
            );
        }
    }

    #[test]
    fn kernel_normalizes_over_a_disc() {
        // Midpoint rule over the radial coordinate: integral of W * 2 pi d dd.
        let r = 0.8_f64;
        let n = 20_000;
        let step = r / n as f64;
        let mut integral = 0.0_f64;
        for k in 0..n {
            let d = (k as f64 + 0.5) * step;
            integral += weight(d as f32, r as f32) as f64 * 2.0 * std::f64::consts::PI * d * step;
        }
        assert!(
            (integral - 1.0).abs() < 1.0e-3,
            "area integral = {integral}, expected ~1.0"
        );
    }

    #[test]
    fn density_includes_self_contribution() {
        let params = SolverParams::default();
        let mut pa = particles_from(&[[0.0; 3], [5.0, 0.0, 0.0]]);
        compute_density_and_pressure(&mut pa, &Neighborhood::AllPairs, &params);
        let self_only = params.particle_mass * weight(0.0, params.smoothing_radius);
        assert_eq!(pa.density[0], self_only);
        assert_eq!(pa.density[1], self_only);
        let expected_p = params.pressure_constant * (self_only - params.target_density);
        assert!((pa.pressure[0] - expected_p).abs() < 1.0e-2);
    }

    #[test]
    fn coincident_particles_add_density_but_no_force() {
        let params = SolverParams::default().with_gravity([0.0; 3]);
        let mut pa = particles_from(&[[0.2, 0.2, 0.2], [0.2, 0.2, 0.2]]);
        let nb = Neighborhood::AllPairs;
        compute_density_and_pressure(&mut pa, &nb, &params);
        let w0 = weight(0.0, params.smoothing_radius);
        assert!((pa.density[0] - 2.0 * w0).abs() < 1.0e-5);

        let breakdown = force_breakdown(0, &pa, &nb, &params);
        assert_eq!(breakdown.pressure, [0.0; 3]);
        assert_eq!(breakdown.viscosity, [0.0; 3]);
        assert!(breakdown.total().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn zero_neighbor_density_is_skipped() {
        let params = SolverParams::default();
        let mut pa = particles_from(&[[0.0; 3], [0.3, 0.0, 0.0]]);
        pa.density[0] = 1.0;
        pa.density[1] = 0.0;
        let breakdown = force_breakdown(0, &pa, &Neighborhood::AllPairs, &params);
        assert_eq!(breakdown.pressure, [0.0; 3]);
        assert_eq!(breakdown.viscosity, [0.0; 3]);
    }

    #[test]
    fn viscosity_pulls_toward_neighbor_velocity() {
        let params = SolverParams {
            viscosity_constant: 1.0,
            gravity: [0.0; 3],
            ..SolverParams::default()
        };
        let mut pa = particles_from(&[[0.0; 3], [0.0, 0.5, 0.0]]);
        pa.set_velocity(1, [2.0, 0.0, 0.0]);
        let nb = Neighborhood::AllPairs;
        compute_density_and_pressure(&mut pa, &nb, &params);
        let on_slow = force_breakdown(0, &pa, &nb, &params);
        let on_fast = force_breakdown(1, &pa, &nb, &params);
        assert!(on_slow.viscosity[0] > 0.0, "slow particle should be dragged forward");
        assert!(on_fast.viscosity[0] < 0.0, "fast particle should be held back");
        assert_eq!(on_slow.viscosity[1], 0.0);
    }

    #[test]
    fn overflowed_neighbor_is_skipped() {
        let params = SolverParams {
            viscosity_constant: 1.0,
            ..SolverParams::default()
        };
        let mut pa = particles_from(&[[0.0; 3], [0.5, 0.0, 0.0], [0.0, 0.5, 0.0]]);
        pa.set_velocity(1, [f32::INFINITY, 0.0, 0.0]);
        pa.set_velocity(2, [0.0, 0.0, 1.0]);
        let nb = Neighborhood::AllPairs;
        compute_density_and_pressure(&mut pa, &nb, &params);

        let f = force_breakdown(0, &pa, &nb, &params);
        assert!(f.total().iter().all(|c| c.is_finite()), "{f:?}");

        // The x-axis pair is dropped whole; the y-axis pair still counts.
        assert_eq!(f.pressure[0], 0.0);
        assert!(f.pressure[1] != 0.0);
        let expected = params.particle_mass / pa.density[2] * weight(0.5, params.smoothing_radius);
        assert_eq!(f.viscosity[0], 0.0);
        assert!((f.viscosity[2] - expected).abs() < 1.0e-6, "{} vs {expected}", f.viscosity[2]);
    }

    #[test]
    fn integrate_keeps_position_when_it_turns_nan() {
        let container = Container::new([2.0; 3]).unwrap();
        let mut pa = particles_from(&[[0.5, -0.25, 0.0]]);
        pa.set_velocity(0, [f32::INFINITY, 1.0, 0.0]);
        // inf * 0 is NaN on x.
        integrate(&mut pa, &container, 0.0);
        assert_eq!(pa.position(0), [0.5, -0.25, 0.0]);

        integrate(&mut pa, &container, 0.5);
        assert_eq!(pa.position(0), [1.0, 0.25, 0.0]);
    }

    #[test]
    fn forces_are_rebuilt_not_accumulated() {
        let params = SolverParams::default();
        let mut pa = particles_from(&[[0.0; 3], [0.4, 0.0, 0.0]]);
        let nb = Neighborhood::AllPairs;
        compute_density_and_pressure(&mut pa, &nb, &params);
        compute_forces(&mut pa, &nb, &params);
        let first = pa.force(0);
        compute_forces(&mut pa, &nb, &params);
        assert_eq!(pa.force(0), first);
    }

    #[test]
    fn integrate_is_semi_implicit() {
        let container = Container::new([100.0; 3]).unwrap();
        let mut pa = particles_from(&[[0.0; 3]]);
        pa.set_velocity(0, [1.0, 0.0, 0.0]);
        pa.fx[0] = 2.0;
        integrate(&mut pa, &container, 0.5);
        // v = 1 + 2*0.5 = 2, x = 0 + 2*0.5 = 1
        assert_eq!(pa.velocity(0), [2.0, 0.0, 0.0]);
        assert_eq!(pa.position(0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn integrate_clamps_without_touching_velocity() {
        let container = Container::new([2.0; 3]).unwrap();
        let mut pa = particles_from(&[[0.9, 0.0, 0.0]]);
        pa.set_velocity(0, [10.0, 0.0, 0.0]);
        integrate(&mut pa, &container, 1.0);
        assert_eq!(pa.position(0), [1.0, 0.0, 0.0]);
        assert_eq!(pa.velocity(0), [10.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_dt_runs_backwards() {
        let container = Container::new([100.0; 3]).unwrap();
        let mut pa = particles_from(&[[0.0; 3]]);
        pa.set_velocity(0, [1.0, 0.0, 0.0]);
        integrate(&mut pa, &container, -1.0);
        assert_eq!(pa.position(0), [-1.0, 0.0, 0.0]);
    }
}
