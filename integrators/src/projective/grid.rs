//! Grid guiding distribution

use super::*;
use itertools::iproduct;
use prb_core::geometry::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;

/// Regular grid over the boundary sample space `[0, 1]³` with a discrete
/// distribution over its cells.
pub struct GridDistr {
    /// Number of cells along each axis.
    pub resolution: usize,

    /// Distribution over cells in `x`-fastest order.
    distr: Distribution1D,
}

impl GridDistr {
    /// Returns a grid with uniform cell probabilities.
    ///
    /// * `resolution` - Number of cells along each axis.
    pub fn new(resolution: usize) -> Self {
        let resolution = resolution.max(1);
        let n = resolution * resolution * resolution;
        Self {
            resolution,
            distr: Distribution1D::new(vec![1.0; n]),
        }
    }

    /// Returns the number of cells.
    pub fn cell_count(&self) -> usize {
        self.resolution * self.resolution * self.resolution
    }

    /// Returns the index of the cell containing a point.
    ///
    /// * `p` - Point in `[0, 1]³`.
    pub fn cell_index(&self, p: &Point3f) -> usize {
        let r = self.resolution;
        let coord = |v: Float| ((v * r as Float) as usize).min(r - 1);
        (coord(p.z) * r + coord(p.y)) * r + coord(p.x)
    }

    /// Returns the bounds of a cell.
    ///
    /// * `index` - Cell index.
    pub fn cell_bounds(&self, index: usize) -> Bounds3f {
        let r = self.resolution;
        let inv = 1.0 / r as Float;
        let (x, y, z) = (index % r, (index / r) % r, index / (r * r));
        let p_min = Point3f::new(x as Float * inv, y as Float * inv, z as Float * inv);
        Bounds3f::new(p_min, p_min + Vector3f::splat(inv))
    }

    /// Returns the cell bounds in index order.
    pub fn cells(&self) -> Vec<Bounds3f> {
        let r = self.resolution;
        iproduct!(0..r, 0..r, 0..r)
            .map(|(z, y, x)| self.cell_bounds((z * r + y) * r + x))
            .collect()
    }

    /// Replaces the cell masses. Masses below `clamp_mass_thres` times the
    /// total are zeroed. Returns `false` when no mass remains, in which case
    /// the distribution is left unchanged.
    ///
    /// * `mass`             - Mass per cell.
    /// * `clamp_mass_thres` - Relative clamping threshold.
    pub fn set_mass(&mut self, mass: Vec<Float>, clamp_mass_thres: Float) -> bool {
        debug_assert_eq!(mass.len(), self.cell_count());
        let mass = clamp_mass(mass, clamp_mass_thres);
        if !mass.iter().any(|m| *m > 0.0) {
            return false;
        }
        let active = mass.iter().filter(|m| **m > 0.0).count();
        debug!("Grid guiding with {} of {} active cells", active, mass.len());
        self.distr = Distribution1D::new(mass);
        true
    }
}

impl GuidingDistribution for GridDistr {
    fn get_type(&self) -> &'static str {
        "grid"
    }

    fn sample(&self, u: &Point3f) -> (Point3f, Float) {
        let (index, pmf, ux) = self.distr.sample_discrete(u.x);
        if pmf <= 0.0 {
            return (*u, 0.0);
        }
        let p = self.cell_bounds(index).lerp(&Point3f::new(ux, u.y, u.z));
        (p, 1.0 / (self.cell_count() as Float * pmf))
    }

    fn pdf(&self, p: &Point3f) -> Float {
        self.distr.discrete_pdf(self.cell_index(p)) * self.cell_count() as Float
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prb_core::rng::RNG;
    use proptest::prelude::*;

    #[test]
    fn cells_tile_the_unit_cube() {
        let grid = GridDistr::new(3);
        let cells = grid.cells();
        assert_eq!(cells.len(), 27);
        let volume: Float = cells.iter().map(|c| c.volume()).sum();
        assert!((volume - 1.0).abs() < 1e-5);
        for (i, c) in cells.iter().enumerate() {
            assert_eq!(grid.cell_index(&c.center()), i);
        }
    }

    #[test]
    fn all_zero_mass_is_rejected() {
        let mut grid = GridDistr::new(2);
        assert!(!grid.set_mass(vec![0.0; 8], 0.0));
        assert!(grid.pdf(&Point3f::new(0.1, 0.1, 0.1)) > 0.0);
    }

    #[test]
    fn samples_stay_in_massive_cells() {
        let mut grid = GridDistr::new(4);
        let mut mass = vec![0.0; 64];
        mass[5] = 1.0;
        mass[42] = 3.0;
        assert!(grid.set_mass(mass, 0.0));
        let mut rng = RNG::new(11);
        for _ in 0..500 {
            let u = Point3f::new(rng.uniform_float(), rng.uniform_float(), rng.uniform_float());
            let (p, rcp) = grid.sample(&u);
            let cell = grid.cell_index(&p);
            assert!(cell == 5 || cell == 42);
            assert!((rcp * grid.pdf(&p) - 1.0).abs() < 1e-4);
        }
    }

    proptest! {
        #[test]
        fn probabilities_sum_to_one(masses in prop::collection::vec(0.0..10.0f32, 8)) {
            let mut grid = GridDistr::new(2);
            prop_assume!(masses.iter().any(|m| *m > 0.0));
            prop_assert!(grid.set_mass(masses, 0.0));
            let total: Float = grid.cells().iter().map(|c| grid.pdf(&c.center()) * c.volume()).sum();
            prop_assert!((total - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn reciprocal_pdf_integrates_one() {
        let mut grid = GridDistr::new(4);
        let mut rng = RNG::new(5);
        let mass: Vec<Float> = (0..64).map(|_| 0.1 + rng.uniform_float()).collect();
        assert!(grid.set_mass(mass, 0.0));
        let n = 100_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let u = Point3f::new(rng.uniform_float(), rng.uniform_float(), rng.uniform_float());
            sum += grid.sample(&u).1;
        }
        assert!((sum / n as Float - 1.0).abs() < 0.02);
    }
}
