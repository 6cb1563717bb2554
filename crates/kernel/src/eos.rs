//! Equation of state relating density to pressure.

/// Linear equation of state.
///
/// ```text
/// P = k * (rho - rho0)
/// ```
///
/// # Arguments
/// * `density` - Current density rho.
/// * `target_density` - Rest density rho0.
/// * `pressure_constant` - Stiffness k.
///
/// # Returns
/// Pressure. Negative (tension) whenever `density < target_density`.
#[inline]
pub fn linear_eos(density: f32, target_density: f32, pressure_constant: f32) -> f32 {
    pressure_constant * (density - target_density)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_at_target_density() {
        assert_eq!(linear_eos(1000.0, 1000.0, 200.0), 0.0);
    }

    #[test]
    fn positive_when_compressed() {
        let p = linear_eos(1010.0, 1000.0, 200.0);
        assert!((p - 2000.0).abs() < 1.0e-3, "got {p}");
    }

    #[test]
    fn negative_when_expanded() {
        let p = linear_eos(2.0, 1000.0, 200.0);
        assert!(p < 0.0, "expanded fluid should be in tension, got {p}");
        assert!((p - 200.0 * (2.0 - 1000.0)).abs() < 1.0e-2);
    }

    #[test]
    fn scales_with_stiffness() {
        let p1 = linear_eos(1.5, 1.0, 10.0);
        let p2 = linear_eos(1.5, 1.0, 20.0);
        assert!((p2 - 2.0 * p1).abs() < 1.0e-6);
    }
}
