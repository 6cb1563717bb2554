//! Neighbor search: brute-force all-pairs scan or a uniform-grid spatial hash.
//!
//! Both strategies visit exactly the particles `j != i` with
//! `|x_i - x_j|^2 < r^2`. The grid only changes which candidates are tested.
//! The grid uses sorted-index + cell-offset arrays rather than a `HashMap`,
//! so a rebuild is a counting sort with no per-cell allocation.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::boundary::Container;
use crate::particle::ParticleArrays;

/// Upper bound on grid cells before the solver falls back to brute force.
pub const MAX_GRID_CELLS: usize = 1 << 22;

/// Relative slack on the search reach when picking cells to scan.
const SPAN_PAD: f32 = 1e-4;

/// Neighbor search strategy selected by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborSearch {
    /// O(N^2) scan over every particle. The reference behavior.
    #[default]
    BruteForce,
    /// Uniform grid with cell size equal to the smoothing radius.
    UniformGrid,
}

/// Uniform-grid spatial hash for O(1) neighbor cell lookup.
///
/// The grid covers a fixed axis-aligned domain. Cell size equals the
/// smoothing radius, so a lookup normally touches the 3x3x3 block around the
/// particle's cell. The block is derived from `p +/- r` per axis rather than
/// fixed at +/-1, so rounding at cell walls never hides a neighbor.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    cell_size: f32,
    grid_min: [f32; 3],
    grid_dims: [u32; 3],
    /// Cell index for each particle (parallel to particle arrays).
    cell_indices: Vec<u32>,
    /// Particle indices sorted by cell index.
    sorted_indices: Vec<u32>,
    /// Start offset in `sorted_indices` for each cell.
    cell_offsets: Vec<u32>,
    /// Number of particles in each cell.
    cell_counts: Vec<u32>,
}

impl NeighborGrid {
    /// Create a grid covering `[domain_min, domain_max]`.
    ///
    /// Returns `None` when `cell_size` is not positive or the grid would need
    /// more than [`MAX_GRID_CELLS`] cells.
    pub fn try_new(cell_size: f32, domain_min: [f32; 3], domain_max: [f32; 3]) -> Option<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return None;
        }
        let mut dims = [1u32; 3];
        let mut total_cells = 1usize;
        for axis in 0..3 {
            let cells = ((domain_max[axis] - domain_min[axis]) / cell_size).ceil().max(1.0);
            if cells > MAX_GRID_CELLS as f32 {
                return None;
            }
            dims[axis] = cells as u32;
            total_cells = total_cells.checked_mul(dims[axis] as usize)?;
        }
        if total_cells > MAX_GRID_CELLS {
            return None;
        }
        Some(Self {
            cell_size,
            grid_min: domain_min,
            grid_dims: dims,
            cell_indices: Vec::new(),
            sorted_indices: Vec::new(),
            cell_offsets: vec![0; total_cells],
            cell_counts: vec![0; total_cells],
        })
    }

    /// Grid over a container with the given cell size.
    pub fn for_container(container: &Container, cell_size: f32) -> Option<Self> {
        Self::try_new(cell_size, container.min(), container.max())
    }

    /// Cell edge length.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Total number of cells in the grid.
    pub fn total_cells(&self) -> usize {
        (self.grid_dims[0] as usize) * (self.grid_dims[1] as usize) * (self.grid_dims[2] as usize)
    }

    /// Cell coordinate of `p` along `axis`, clamped to grid bounds.
    #[inline]
    fn axis_cell(&self, p: f32, axis: usize) -> u32 {
        ((p - self.grid_min[axis]) / self.cell_size)
            .floor()
            .max(0.0)
            .min((self.grid_dims[axis] - 1) as f32) as u32
    }

    /// Map a world-space position to a cell (cx, cy, cz), clamped to grid bounds.
    #[inline]
    fn pos_to_cell(&self, px: f32, py: f32, pz: f32) -> (u32, u32, u32) {
        (self.axis_cell(px, 0), self.axis_cell(py, 1), self.axis_cell(pz, 2))
    }

    /// Inclusive cell range along `axis` touched by `[p - radius, p + radius]`.
    ///
    /// Usually one cell either side of `p`'s own, but rounding in the cell
    /// mapping can put a point just under `radius` away two cells over. The
    /// reach is padded by `SPAN_PAD` so a pair the squared-distance test
    /// accepts is never outside the span.
    #[inline]
    fn axis_span(&self, p: f32, radius: f32, axis: usize) -> RangeInclusive<u32> {
        let reach = radius * (1.0 + SPAN_PAD);
        self.axis_cell(p - reach, axis)..=self.axis_cell(p + reach, axis)
    }

    /// Flat cell index from (cx, cy, cz).
    #[inline]
    fn cell_hash(&self, cx: u32, cy: u32, cz: u32) -> u32 {
        cx + cy * self.grid_dims[0] + cz * self.grid_dims[0] * self.grid_dims[1]
    }

    /// Rebuild the grid from current particle positions.
    pub fn update(&mut self, particles: &ParticleArrays) {
        let n = particles.len();
        let total_cells = self.total_cells();

        // --- 1. Compute cell index for each particle ---
        self.cell_indices.resize(n, 0);
        for i in 0..n {
            let (cx, cy, cz) = self.pos_to_cell(particles.x[i], particles.y[i], particles.z[i]);
            self.cell_indices[i] = self.cell_hash(cx, cy, cz);
        }

        // --- 2. Count particles per cell ---
        self.cell_counts.clear();
        self.cell_counts.resize(total_cells, 0);
        for &ci in &self.cell_indices {
            self.cell_counts[ci as usize] += 1;
        }

        // --- 3. Prefix-sum to get cell offsets ---
        self.cell_offsets.clear();
        self.cell_offsets.resize(total_cells, 0);
        let mut running = 0u32;
        for c in 0..total_cells {
            self.cell_offsets[c] = running;
            running += self.cell_counts[c];
        }

        // --- 4. Scatter particle indices into sorted order ---
        // Scanning i in ascending order keeps each cell's run sorted by index.
        self.sorted_indices.resize(n, 0);
        let mut write_heads = self.cell_offsets.clone();
        for i in 0..n {
            let ci = self.cell_indices[i] as usize;
            let pos = write_heads[ci] as usize;
            self.sorted_indices[pos] = i as u32;
            write_heads[ci] += 1;
        }
    }

    /// Call `f(j)` for every particle `j != particle_idx` strictly within `radius`.
    ///
    /// Scans every cell overlapping the cube of half-width `radius` around the
    /// particle. With `radius` equal to the cell size that is the 27 adjacent
    /// cells, widened by one along an axis where the particle sits on a
    /// cell boundary.
    pub fn for_each_neighbor<F>(
        &self,
        particle_idx: usize,
        particles: &ParticleArrays,
        radius: f32,
        mut f: F,
    ) where
        F: FnMut(usize),
    {
        let px = particles.x[particle_idx];
        let py = particles.y[particle_idx];
        let pz = particles.z[particle_idx];
        let radius_sq = radius * radius;

        let xs = self.axis_span(px, radius, 0);
        let ys = self.axis_span(py, radius, 1);
        for nz in self.axis_span(pz, radius, 2) {
            for ny in ys.clone() {
                for nx in xs.clone() {
                    let cell = self.cell_hash(nx, ny, nz) as usize;
                    let start = self.cell_offsets[cell] as usize;
                    let count = self.cell_counts[cell] as usize;

                    for &j in &self.sorted_indices[start..start + count] {
                        let j = j as usize;
                        if j == particle_idx {
                            continue;
                        }
                        if within(px, py, pz, particles, j, radius_sq) {
                            f(j);
                        }
                    }
                }
            }
        }
    }
}

#[inline]
fn within(px: f32, py: f32, pz: f32, particles: &ParticleArrays, j: usize, radius_sq: f32) -> bool {
    let ddx = px - particles.x[j];
    let ddy = py - particles.y[j];
    let ddz = pz - particles.z[j];
    ddx * ddx + ddy * ddy + ddz * ddz < radius_sq
}

/// Neighbor lookup for one step, built from a position snapshot.
#[derive(Debug, Clone)]
pub enum Neighborhood {
    /// Scan every particle.
    AllPairs,
    /// Scan the grid cells overlapping each particle's search cube.
    Grid(NeighborGrid),
}

impl Neighborhood {
    /// Prepare a lookup for `particles` with the requested strategy.
    ///
    /// `previous` lets a grid be reused between steps when the cell size is
    /// unchanged. Falls back to [`Neighborhood::AllPairs`] when a grid of the
    /// required resolution would be too large.
    pub fn build(
        search: NeighborSearch,
        particles: &ParticleArrays,
        container: &Container,
        radius: f32,
        previous: Option<Neighborhood>,
    ) -> Self {
        match search {
            NeighborSearch::BruteForce => Neighborhood::AllPairs,
            NeighborSearch::UniformGrid => {
                let reusable = match previous {
                    Some(Neighborhood::Grid(grid)) if grid.cell_size() == radius => Some(grid),
                    _ => None,
                };
                let grid = reusable.or_else(|| NeighborGrid::for_container(container, radius));
                match grid {
                    Some(mut grid) => {
                        grid.update(particles);
                        Neighborhood::Grid(grid)
                    }
                    None => {
                        tracing::debug!(
                            "Grid for radius {} over container {:?} exceeds {} cells, using all-pairs search",
                            radius,
                            container.size(),
                            MAX_GRID_CELLS
                        );
                        Neighborhood::AllPairs
                    }
                }
            }
        }
    }

    /// Call `f(j)` for every particle `j != i` strictly within `radius` of `i`.
    ///
    /// Visit order is fixed for a given snapshot, so per-particle sums are
    /// reproducible.
    #[inline]
    pub fn for_each_neighbor<F>(&self, i: usize, particles: &ParticleArrays, radius: f32, mut f: F)
    where
        F: FnMut(usize),
    {
        match self {
            Neighborhood::AllPairs => {
                let (px, py, pz) = (particles.x[i], particles.y[i], particles.z[i]);
                let radius_sq = radius * radius;
                for j in 0..particles.len() {
                    if j != i && within(px, py, pz, particles, j, radius_sq) {
                        f(j);
                    }
                }
            }
            Neighborhood::Grid(grid) => grid.for_each_neighbor(i, particles, radius, f),
        }
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

    fn collect(n: &Neighborhood, i: usize, pa: &ParticleArrays, radius: f32) -> Vec<usize> {
        let mut out = Vec::new();
        n.for_each_neighbor(i, pa, radius, |j| out.push(j));
        out.sort_unstable();
        out
    }

    #[test]
    fn grid_dimensions_cover_domain() {
        let grid = NeighborGrid::try_new(0.1, [0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(grid.total_cells(), 1000);
        let container = Container::new([3.0, 2.0, 1.0]).unwrap();
        let grid = NeighborGrid::for_container(&container, 1.0).unwrap();
        assert_eq!(grid.total_cells(), 3 * 2);
    }

    #[test]
    fn oversized_grid_is_refused() {
        assert!(NeighborGrid::try_new(1.0e-4, [0.0; 3], [1.0e3; 3]).is_none());
        assert!(NeighborGrid::try_new(0.0, [0.0; 3], [1.0; 3]).is_none());
    }

    #[test]
    fn lone_particle_sees_nobody() {
        let container = Container::new([1.0; 3]).unwrap();
        let pa = particles_from(&[[0.1, -0.2, 0.3]]);
        let n = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.2, None);
        assert!(collect(&n, 0, &pa, 0.2).is_empty());
    }

    #[test]
    fn pair_straddling_a_cell_wall_is_found() {
        // Cells are 0.25 wide starting at -0.5, so x = -0.26 and x = -0.24
        // land in adjacent cells.
        let container = Container::new([1.0; 3]).unwrap();
        let pa = particles_from(&[[-0.26, 0.0, 0.0], [-0.24, 0.0, 0.0]]);
        let n = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.25, None);
        assert_eq!(collect(&n, 0, &pa, 0.25), vec![1]);
        assert_eq!(collect(&n, 1, &pa, 0.25), vec![0]);
    }

    #[test]
    fn pair_rounded_two_cells_apart_is_found() {
        // Cells are 0.7 wide from -1.4. (x - min) / cell rounds the first
        // point down into cell 1 and the second up into cell 3, although
        // they are 0.6999999 apart.
        let container = Container::new([2.8; 3]).unwrap();
        let pa = particles_from(&[[-1.0e-7, 0.0, 0.0], [0.6999998, 0.0, 0.0]]);
        let n = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.7, None);
        assert!(matches!(n, Neighborhood::Grid(_)));
        assert_eq!(collect(&n, 0, &pa, 0.7), vec![1]);
        assert_eq!(collect(&n, 1, &pa, 0.7), vec![0]);
    }

    #[test]
    fn grid_matches_brute_force_on_cell_boundaries() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        for layout in 0..500 {
            let radius: f32 = [0.7, 0.45, 0.3, 1.0][layout % 4];
            let cells: u32 = rng.gen_range(2..=5);
            let side = radius * cells as f32;
            let container = Container::new([side; 3]).unwrap();
            let half = side * 0.5;

            // Every coordinate sits within 1e-6 of a cell wall.
            let points: Vec<[f32; 3]> = (0..12)
                .map(|_| {
                    [0; 3].map(|_| {
                        let wall = rng.gen_range(0..=cells) as f32 * radius - half;
                        wall + rng.gen_range(-1.0e-6_f32..=1.0e-6)
                    })
                })
                .collect();
            let pa = particles_from(&points);

            let brute = Neighborhood::AllPairs;
            let grid =
                Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, radius, None);
            for i in 0..pa.len() {
                assert_eq!(
                    collect(&brute, i, &pa, radius),
                    collect(&grid, i, &pa, radius),
                    "layout {layout}: neighbor sets differ for particle {i} at {:?}",
                    pa.position(i)
                );
            }
        }
    }

    #[test]
    fn exactly_at_radius_is_excluded() {
        let pa = particles_from(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let n = Neighborhood::AllPairs;
        assert!(collect(&n, 0, &pa, 0.5).is_empty());
        assert_eq!(collect(&n, 0, &pa, 0.6), vec![1]);
    }

    #[test]
    fn coincident_particles_are_neighbors() {
        let pa = particles_from(&[[0.1, 0.1, 0.1], [0.1, 0.1, 0.1]]);
        let n = Neighborhood::AllPairs;
        assert_eq!(collect(&n, 0, &pa, 0.5), vec![1]);
    }

    #[test]
    fn grid_matches_brute_force() {
        let container = Container::new([4.0, 3.0, 2.0]).unwrap();
        let pa = ParticleArrays::seed_uniform_with_seed(400, container.size(), 11);
        let radius = 0.45;
        let brute = Neighborhood::build(NeighborSearch::BruteForce, &pa, &container, radius, None);
        let grid = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, radius, None);
        assert!(matches!(grid, Neighborhood::Grid(_)));
        for i in 0..pa.len() {
            assert_eq!(
                collect(&brute, i, &pa, radius),
                collect(&grid, i, &pa, radius),
                "neighbor sets differ for particle {i}"
            );
        }
    }

    #[test]
    fn grid_is_reused_for_same_radius() {
        let container = Container::new([2.0; 3]).unwrap();
        let pa = ParticleArrays::seed_uniform_with_seed(50, container.size(), 3);
        let first = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.5, None);
        let second =
            Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.5, Some(first));
        match second {
            Neighborhood::Grid(grid) => assert_eq!(grid.cell_size(), 0.5),
            Neighborhood::AllPairs => panic!("expected a grid"),
        }
    }

    #[test]
    fn huge_container_falls_back_to_all_pairs() {
        let container = Container::new([1.0e6; 3]).unwrap();
        let pa = particles_from(&[[0.0; 3]]);
        let n = Neighborhood::build(NeighborSearch::UniformGrid, &pa, &container, 0.01, None);
        assert!(matches!(n, Neighborhood::AllPairs));
    }
}
