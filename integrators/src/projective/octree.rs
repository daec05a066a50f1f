//! Octree guiding distribution

use super::*;
use prb_core::error::*;
use prb_core::geometry::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;

/// Construction limits of `OcSpaceDistr`.
#[derive(Copy, Clone, Debug)]
pub struct OctreeSettings {
    /// Deepest level below the root slices.
    pub max_depth: u32,

    /// Largest number of leaves.
    pub max_leaf_count: usize,

    /// Number of root cells along `x`.
    pub highres_x_slices: usize,
}

impl Default for OctreeSettings {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_leaf_count: 250_000,
            highres_x_slices: 1,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct OctreeNode {
    bounds: Bounds3f,

    /// Index of the first of eight consecutive children.
    children: Option<usize>,

    /// Leaf index of a node without children.
    leaf: Option<usize>,
}

/// Adaptive octree over the boundary sample space `[0, 1]³`, refined around
/// a set of points, with a discrete distribution over its leaves.
pub struct OcSpaceDistr {
    /// Leaf bounds.
    pub leaves: Vec<Bounds3f>,

    nodes: Vec<OctreeNode>,
    slices: usize,
    distr: Distribution1D,
}

/// Returns the octant of `p` relative to `center` using the bit layout of
/// `Bounds3f::octant`.
fn child_index(center: &Point3f, p: &Point3f) -> usize {
    (p.x >= center.x) as usize | ((p.y >= center.y) as usize) << 1 | ((p.z >= center.z) as usize) << 2
}

impl OcSpaceDistr {
    /// Builds the octree level by level. Every active node is split into
    /// eight children and its points are handed to them; a node becomes a
    /// leaf once it is at least three levels deep and holds at most one
    /// point, or at `max_depth`. Leaf probabilities start out proportional
    /// to volume.
    ///
    /// * `points`   - Points in `[0, 1]³` marking where to refine.
    /// * `settings` - Construction limits.
    pub fn build(points: &[Point3f], settings: &OctreeSettings) -> Result<Self> {
        let slices = settings.highres_x_slices.max(1);
        let slice_of = |p: &Point3f| ((p.x.max(0.0) * slices as Float) as usize).min(slices - 1);

        let mut nodes = Vec::with_capacity(slices * 8);
        let mut active: Vec<(usize, Vec<Point3f>)> = Vec::with_capacity(slices);
        for i in 0..slices {
            let bounds = Bounds3f::new(
                Point3f::new(i as Float / slices as Float, 0.0, 0.0),
                Point3f::new((i + 1) as Float / slices as Float, 1.0, 1.0),
            );
            nodes.push(OctreeNode {
                bounds,
                children: None,
                leaf: None,
            });
            active.push((i, Vec::new()));
        }
        for p in points.iter() {
            active[slice_of(p)].1.push(*p);
        }

        let mut leaves = Vec::new();
        let mut level = 0_u32;
        while !active.is_empty() {
            let mut next = Vec::with_capacity(active.len() * 8);
            for (node, node_points) in active.into_iter() {
                let bounds = nodes[node].bounds;
                if level >= settings.max_depth || (level >= 3 && node_points.len() <= 1) {
                    nodes[node].leaf = Some(leaves.len());
                    leaves.push(bounds);
                    continue;
                }

                let center = bounds.center();
                let first = nodes.len();
                nodes[node].children = Some(first);
                let mut buckets: Vec<Vec<Point3f>> = vec![Vec::new(); 8];
                for p in node_points.into_iter() {
                    buckets[child_index(&center, &p)].push(p);
                }
                for (i, bucket) in buckets.into_iter().enumerate() {
                    nodes.push(OctreeNode {
                        bounds: bounds.octant(i),
                        children: None,
                        leaf: None,
                    });
                    next.push((first + i, bucket));
                }
            }

            // Every pending node ends up as at least one leaf.
            if leaves.len() + next.len() > settings.max_leaf_count {
                return Err(Error::OctreeOverflow(settings.max_leaf_count));
            }
            active = next;
            level += 1;
        }

        debug!(
            "Octree guiding with {} leaves from {} points ({} levels)",
            leaves.len(),
            points.len(),
            level
        );

        let volumes = leaves.iter().map(|b| b.volume()).collect();
        Ok(Self {
            leaves,
            nodes,
            slices,
            distr: Distribution1D::new(volumes),
        })
    }

    /// Returns the index of the leaf containing a point.
    ///
    /// * `p` - Point in `[0, 1]³`.
    pub fn leaf_of(&self, p: &Point3f) -> Option<usize> {
        let mut node = ((p.x.max(0.0) * self.slices as Float) as usize).min(self.slices - 1);
        loop {
            let n = &self.nodes[node];
            match n.children {
                Some(first) => node = first + child_index(&n.bounds.center(), p),
                None => return n.leaf,
            }
        }
    }

    /// Replaces the leaf masses. `mass` holds a density per leaf; leaves
    /// are drawn proportionally to density times volume, and leaves whose
    /// share falls below `clamp_mass_thres` times the total are dropped.
    /// Returns `false` when no mass remains, in which case the distribution
    /// is left unchanged.
    ///
    /// * `mass`             - Mass density per leaf.
    /// * `clamp_mass_thres` - Relative clamping threshold.
    pub fn set_mass(&mut self, mass: &[Float], clamp_mass_thres: Float) -> bool {
        debug_assert_eq!(mass.len(), self.leaves.len());
        let weights: Vec<Float> = mass
            .iter()
            .zip(self.leaves.iter())
            .map(|(m, b)| m * b.volume())
            .collect();
        let weights = clamp_mass(weights, clamp_mass_thres);
        if !weights.iter().any(|w| *w > 0.0) {
            return false;
        }
        self.distr = Distribution1D::new(weights);
        true
    }
}

impl GuidingDistribution for OcSpaceDistr {
    fn get_type(&self) -> &'static str {
        "octree"
    }

    fn sample(&self, u: &Point3f) -> (Point3f, Float) {
        let (leaf, pmf, ux) = self.distr.sample_discrete(u.x);
        if pmf <= 0.0 {
            return (*u, 0.0);
        }
        let bounds = &self.leaves[leaf];
        (bounds.lerp(&Point3f::new(ux, u.y, u.z)), bounds.volume() / pmf)
    }

    fn pdf(&self, p: &Point3f) -> Float {
        match self.leaf_of(p) {
            Some(leaf) => self.distr.discrete_pdf(leaf) / self.leaves[leaf].volume(),
            None => 0.0,
        }
    }
}
