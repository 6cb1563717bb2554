//! Reference test framework for SPH fluid solver validation
//!
//! A reference test loads a scenario from `configs/`, steps it a fixed number
//! of times and validates the final state against physical checks.

pub mod analytical;


use std::path::{Path, PathBuf};

use kernel::{Container, FluidMetrics, ParticleArrays, SimulationKernel};
use orchestrator::{ConfigError, SimulationConfig};

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Every particle inside the container
    pub containment: Option<ContainmentCheck>,
    /// Every density at or above a floor
    pub density_floor: Option<DensityFloorCheck>,
    /// Settling check (particles on the floor)
    pub settling: Option<SettlingCheck>,
    /// Kinetic energy within a range
    pub energy: Option<EnergyCheck>,
}

/// Check that particles remain within the container
#[derive(Debug, Clone)]
pub struct ContainmentCheck {
    /// Extra distance allowed past each wall
    pub margin: f32,
}

/// Check that no density drops below a floor
#[derive(Debug, Clone)]
pub struct DensityFloorCheck {
    /// Minimum allowed density
    pub min_density: f32,
    /// Relative tolerance on the floor (0.0 to 1.0)
    pub tolerance: f32,
}

/// Check that particles have settled on the floor
#[derive(Debug, Clone)]
pub struct SettlingCheck {
    /// Floor Y position
    pub floor_y: f32,
    /// Maximum height above the floor
    pub max_distance: f32,
}

/// Check total kinetic energy
#[derive(Debug, Clone)]
pub struct EnergyCheck {
    /// Lower bound on total kinetic energy
    pub min_kinetic_energy: f64,
    /// Upper bound on total kinetic energy
    pub max_kinetic_energy: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Final diagnostics
    pub metrics: FluidMetrics,
    /// Number of timesteps executed
    pub timesteps: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail or failure message
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: Some(message),
        }
    }
}

/// A reference test case
#[derive(Debug, Clone)]
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to configuration file
    pub config_path: PathBuf,
    /// Number of timesteps to run (capped by the scenario's `max_timesteps`)
    pub timesteps: u64,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, ConfigError> {
        tracing::info!("Running reference test: {}", self.name);

        let config = SimulationConfig::load(&self.config_path)?;
        let mut runner = orchestrator::create_simulation_from_config(&config)?;

        tracing::info!("Running {} timesteps...", self.timesteps);
        let timesteps = runner.run(self.timesteps)?;
        tracing::info!(
            "Simulation complete: {} steps, {:.6}s simulated",
            timesteps,
            runner.sim_time()
        );

        let solver = runner.solver();
        let particles = solver.particles();
        let metrics = solver.metrics();

        let mut checks = Vec::new();

        if let Some(ref check) = self.expected.containment {
            checks.push(validate_containment(particles, solver.container(), check));
        }
        if let Some(ref check) = self.expected.density_floor {
            checks.push(validate_density_floor(&metrics, check));
        }
        if let Some(ref check) = self.expected.settling {
            checks.push(validate_settling(particles, check));
        }
        if let Some(ref check) = self.expected.energy {
            checks.push(validate_energy(&metrics, check));
        }

        let passed = checks.iter().all(|c| c.passed);
        Ok(TestResult {
            name: self.name.clone(),
            passed,
            checks,
            metrics,
            timesteps,
            sim_time: runner.sim_time(),
        })
    }
}

/// Validate that particles remain within the container
fn validate_containment(
    particles: &ParticleArrays,
    container: &Container,
    check: &ContainmentCheck,
) -> CheckResult {
    let half = container.half_extent();
    let mut violations = 0;
    let mut max_violation = 0.0_f32;

    for i in 0..particles.len() {
        let pos = particles.position(i);
        for axis in 0..3 {
            let excess = pos[axis].abs() - half[axis];
            if excess.is_nan() || excess > check.margin {
                violations += 1;
                max_violation = max_violation.max(excess);
            }
        }
    }

    if violations == 0 {
        CheckResult::new(
            "Containment",
            true,
            format!("All {} particles inside {:?}", particles.len(), container.size()),
        )
    } else {
        CheckResult::new(
            "Containment",
            false,
            format!(
                "{} coordinates out of bounds (max violation: {:.6})",
                violations, max_violation
            ),
        )
    }
}

/// Validate the lowest density against a floor
fn validate_density_floor(metrics: &FluidMetrics, check: &DensityFloorCheck) -> CheckResult {
    let limit = check.min_density * (1.0 - check.tolerance);
    let passed = metrics.min_density >= limit;
    CheckResult::new(
        "Density Floor",
        passed,
        format!(
            "Min density: {:.6}, floor: {:.6} (tolerance: {:.3}%)",
            metrics.min_density,
            check.min_density,
            check.tolerance * 100.0
        ),
    )
}

/// Validate that particles have settled on the floor
fn validate_settling(particles: &ParticleArrays, check: &SettlingCheck) -> CheckResult {
    let max_allowed_height = check.floor_y + check.max_distance;

    let mut unsettled_count = 0;
    let mut max_height = check.floor_y;
    for &y in &particles.y {
        if y.is_nan() || y > max_allowed_height {
            unsettled_count += 1;
        }
        max_height = max_height.max(y);
    }

    if unsettled_count == 0 {
        CheckResult::new(
            "Settling",
            true,
            format!(
                "All {} particles settled (max height: {:.6}, limit: {:.6})",
                particles.len(),
                max_height,
                max_allowed_height
            ),
        )
    } else {
        CheckResult::new(
            "Settling",
            false,
            format!(
                "{} / {} particles not settled (max height: {:.6}, limit: {:.6})",
                unsettled_count,
                particles.len(),
                max_height,
                max_allowed_height
            ),
        )
    }
}

/// Validate total kinetic energy against a range
fn validate_energy(metrics: &FluidMetrics, check: &EnergyCheck) -> CheckResult {
    let ke = metrics.kinetic_energy;
    let passed = ke.is_finite() && ke >= check.min_kinetic_energy && ke <= check.max_kinetic_energy;
    CheckResult::new(
        "Kinetic Energy",
        passed,
        format!(
            "KE: {:.3e} (range: [{:.3e}, {:.3e}])",
            ke, check.min_kinetic_energy, check.max_kinetic_energy
        ),
    )
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Timesteps: {}", self.timesteps);
        println!("Simulated time: {:.6} s", self.sim_time);
        println!("\nMetrics:");
        println!(
            "  Density: min {:.4}, mean {:.4}, max {:.4}",
            self.metrics.min_density, self.metrics.mean_density, self.metrics.max_density
        );
        println!(
            "  Max density variation: {:.2}%",
            self.metrics.max_density_variation * 100.0
        );
        println!("  Kinetic energy: {:.3e}", self.metrics.kinetic_energy);
        println!("  Max speed: {:.4}", self.metrics.max_speed);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

// ===========================================================================
// Shipped scenarios
// ===========================================================================

/// Default scene: 1000 particles, default tunables, uniform grid.
pub fn default_box_test(configs_dir: &Path) -> ReferenceTest {
    let params = kernel::SolverParams::default();
    ReferenceTest {
        name: "Default Box".to_string(),
        config_path: configs_dir.join("default-box.json"),
        timesteps: 60,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 0.0 }),
            density_floor: Some(DensityFloorCheck {
                min_density: analytical::isolated_density(
                    params.particle_mass as f64,
                    params.smoothing_radius as f64,
                ) as f32,
                tolerance: 1e-5,
            }),
            settling: None,
            energy: None,
        },
    }
}

/// Pressure switched off: everything falls onto the floor and stays pinned.
///
/// Expectations come from a lone particle dropped from the top of the box,
/// the slowest faller in the scene.
pub fn free_fall_test(configs_dir: &Path) -> ReferenceTest {
    let floor_y = -5.0;
    let timesteps = 120;
    let fall =
        analytical::SemiImplicitFreeFall::for_isolated_particle(-floor_y, -9.81, 1.0, 1.0, 1.0 / 60.0);
    let reaches_floor = fall
        .steps_to_reach(floor_y)
        .is_some_and(|needed| needed <= timesteps);
    let min_speed = fall.velocity_after(timesteps).abs();

    ReferenceTest {
        name: "Free Fall".to_string(),
        config_path: configs_dir.join("free-fall.json"),
        timesteps,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 0.0 }),
            density_floor: Some(DensityFloorCheck {
                min_density: analytical::isolated_density(1.0, 1.0) as f32,
                tolerance: 1e-5,
            }),
            settling: reaches_floor.then_some(SettlingCheck {
                floor_y: floor_y as f32,
                max_distance: 1e-4,
            }),
            // Pinning leaves velocity alone, so nobody is slower than a lone
            // particle after the full run.
            energy: Some(EnergyCheck {
                min_kinetic_energy: 300.0 * 0.5 * min_speed * min_speed * 0.9,
                max_kinetic_energy: 1e9,
            }),
        },
    }
}

/// Small brute-force run at the default tunables.
pub fn small_brute_force_test(configs_dir: &Path) -> ReferenceTest {
    ReferenceTest {
        name: "Small Brute Force".to_string(),
        config_path: configs_dir.join("small-brute-force.json"),
        timesteps: 60,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 0.0 }),
            density_floor: Some(DensityFloorCheck {
                min_density: analytical::isolated_density(1.0, 1.0) as f32,
                tolerance: 1e-5,
            }),
            settling: None,
            energy: Some(EnergyCheck {
                min_kinetic_energy: f64::MIN_POSITIVE,
                max_kinetic_energy: f64::MAX,
            }),
        },
    }
}

/// Get all reference tests
pub fn all_tests(configs_dir: &Path) -> Vec<ReferenceTest> {
    vec![
        default_box_test(configs_dir),
        free_fall_test(configs_dir),
        small_brute_force_test(configs_dir),
    ]
}
