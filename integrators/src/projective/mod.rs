//! Projective Sampling of Visibility Discontinuities
//!
//! Derivatives of the image with respect to geometry contain terms caused by
//! silhouettes sweeping over other surfaces. They are integrals over the
//! silhouette curves of the radiance difference across the curve times the
//! normal velocity of the curve. `ProjectiveDetail` estimates them in two
//! parts:
//!
//! * primarily visible silhouettes, sampled on the silhouette primitives
//!   precomputed from the sensor position,
//! * indirectly visible silhouettes, sampled in the boundary sample space
//!   `[0, 1]³` of the scene and connected to the sensor by a short subpath.
//!
//! The indirect part can be guided by a `GridDistr` or an `OcSpaceDistr`
//! built from mass estimates at the start of every render call.

mod grid;
mod octree;

use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::integrator::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampler::*;
use prb_core::sampling::*;
use prb_core::scene::*;
use prb_core::sensor::*;
use prb_core::spectrum::*;

// Re-export.
pub use grid::*;
pub use octree::*;

/// Number of samples handed to a worker at once.
const DISCONTINUITY_CHUNK: usize = 4096;

/// How the indirect boundary sample space is sampled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GuidingMode {
    /// Uniformly.
    None,

    /// With a `GridDistr`.
    Grid,

    /// With an `OcSpaceDistr`.
    Octree,
}

impl TryFrom<&str> for GuidingMode {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "grid" => Ok(Self::Grid),
            "octree" => Ok(Self::Octree),
            _ => Err(Error::Config(
                "guiding".to_string(),
                format!("'{}' (expected none, grid or octree)", s),
            )),
        }
    }
}

/// Which path segments of a primal path may seed the projection of guiding
/// points onto silhouettes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProjectSeed {
    /// BSDF sampled segments and emitter connections.
    Both,

    /// BSDF sampled segments.
    Bsdf,

    /// Emitter connections.
    Emitter,
}

impl ProjectSeed {
    /// Returns `true` if BSDF sampled segments are candidates.
    pub fn bsdf(&self) -> bool {
        *self != Self::Emitter
    }

    /// Returns `true` if emitter connections are candidates.
    pub fn emitter(&self) -> bool {
        *self != Self::Bsdf
    }
}

impl TryFrom<&str> for ProjectSeed {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "both" => Ok(Self::Both),
            "bsdf" => Ok(Self::Bsdf),
            "emitter" => Ok(Self::Emitter),
            _ => Err(Error::Config(
                "project_seed".to_string(),
                format!("'{}' (expected both, bsdf or emitter)", s),
            )),
        }
    }
}

/// Settings of the discontinuity estimators.
#[derive(Copy, Clone, Debug)]
pub struct ProjectiveConfig {
    /// Samples per pixel of the continuous part; `None` uses the render
    /// call's value.
    pub sppc: Option<usize>,

    /// Samples per pixel of primarily visible silhouettes.
    pub sppp: Option<usize>,

    /// Samples per pixel of indirectly visible silhouettes.
    pub sppi: Option<usize>,

    /// Guiding of the indirect part.
    pub guiding: GuidingMode,

    /// Build the guiding structure from points projected onto silhouettes
    /// instead of uniform points.
    pub guiding_proj: bool,

    /// Number of mass estimation rounds.
    pub guiding_rounds: u32,

    /// Number of mass samples per round.
    pub guiding_samples: usize,

    /// Cells per axis of `GridDistr`.
    pub grid_resolution: usize,

    /// Octree construction limits.
    pub octree: OctreeSettings,

    /// Fixed mass threshold of octree refinement points; zero selects
    /// `octree_mass_multiplier` times the mean nonzero mass.
    pub octree_mass_threshold: Float,

    /// Multiplier of the automatic mass threshold.
    pub octree_mass_multiplier: Float,

    /// Additional uniform mass samples per cell or leaf.
    pub extra_samples: usize,

    /// Relative mass below which cells and leaves are never sampled.
    pub clamp_mass_thres: Float,

    /// Candidate segments for projection.
    pub project_seed: ProjectSeed,
}

impl Default for ProjectiveConfig {
    fn default() -> Self {
        Self {
            sppc: None,
            sppp: None,
            sppi: None,
            guiding: GuidingMode::Octree,
            guiding_proj: true,
            guiding_rounds: 1,
            guiding_samples: 1 << 14,
            grid_resolution: 16,
            octree: OctreeSettings::default(),
            octree_mass_threshold: 0.0,
            octree_mass_multiplier: 1.0,
            extra_samples: 4,
            clamp_mass_thres: 1e-6,
            project_seed: ProjectSeed::Both,
        }
    }
}

/// Reads an optional sample count where `-1` means "use the render call's
/// value".
///
/// * `params` - Parameter set.
/// * `name`   - Parameter name.
fn find_spp(params: &ParamSet, name: &str) -> Result<Option<usize>> {
    match params.find_one_int(name, -1) {
        -1 => Ok(None),
        n if n >= 0 => Ok(Some(n as usize)),
        n => Err(Error::Config(name.to_string(), format!("{} (must be -1 or at least 0)", n))),
    }
}

/// Reads a positive integer.
///
/// * `params`  - Parameter set.
/// * `name`    - Parameter name.
/// * `default` - Default value.
fn find_positive(params: &ParamSet, name: &str, default: usize) -> Result<usize> {
    match params.find_one_int(name, default as Int) {
        n if n >= 1 => Ok(n as usize),
        n => Err(Error::Config(name.to_string(), format!("{} (must be at least 1)", n))),
    }
}

impl TryFrom<&ParamSet> for ProjectiveConfig {
    type Error = Error;

    /// Create a `ProjectiveConfig` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        let defaults = Self::default();

        let guiding = GuidingMode::try_from(params.find_one_string("guiding", String::from("octree")).as_str())?;
        let project_seed = ProjectSeed::try_from(params.find_one_string("project_seed", String::from("both")).as_str())?;

        let extra_samples = params.find_one_int("extra_samples", defaults.extra_samples as Int);
        if extra_samples < 0 {
            return Err(Error::Config("extra_samples".to_string(), format!("{}", extra_samples)));
        }

        let clamp_mass_thres = params.find_one_float("clamp_mass_thres", defaults.clamp_mass_thres);
        if !(0.0..1.0).contains(&clamp_mass_thres) {
            return Err(Error::Config(
                "clamp_mass_thres".to_string(),
                format!("{} (must be in [0, 1))", clamp_mass_thres),
            ));
        }

        let octree = OctreeSettings {
            max_depth: find_positive(params, "octree_max_depth", defaults.octree.max_depth as usize)? as u32,
            max_leaf_count: find_positive(params, "octree_max_leaf_count", defaults.octree.max_leaf_count)?,
            highres_x_slices: find_positive(params, "octree_highres_x_slices", defaults.octree.highres_x_slices)?,
        };

        Ok(Self {
            sppc: find_spp(params, "sppc")?,
            sppp: find_spp(params, "sppp")?,
            sppi: find_spp(params, "sppi")?,
            guiding,
            guiding_proj: params.find_one_bool("guiding_proj", defaults.guiding_proj),
            guiding_rounds: find_positive(params, "guiding_rounds", defaults.guiding_rounds as usize)? as u32,
            guiding_samples: find_positive(params, "guiding_samples", defaults.guiding_samples)?,
            grid_resolution: find_positive(params, "grid_resolution", defaults.grid_resolution)?,
            octree,
            octree_mass_threshold: params.find_one_float("octree_mass_threshold", defaults.octree_mass_threshold),
            octree_mass_multiplier: params.find_one_float("octree_mass_multiplier", defaults.octree_mass_multiplier),
            extra_samples: extra_samples as usize,
            clamp_mass_thres,
            project_seed,
        })
    }
}

/// A distribution over the boundary sample space `[0, 1]³`.
pub trait GuidingDistribution: Send + Sync {
    /// Returns the distribution type for debugging.
    fn get_type(&self) -> &'static str;

    /// Warps a uniform point. Returns the point and the reciprocal of its
    /// density; the reciprocal is zero when nothing can be sampled.
    ///
    /// * `u` - Uniform point in `[0, 1]³`.
    fn sample(&self, u: &Point3f) -> (Point3f, Float);

    /// Returns the density of a point.
    ///
    /// * `p` - Point in `[0, 1]³`.
    fn pdf(&self, p: &Point3f) -> Float;
}

/// Zeroes every mass below `thres` times the total mass.
///
/// * `mass`  - Masses.
/// * `thres` - Relative threshold.
pub fn clamp_mass(mut mass: Vec<Float>, thres: Float) -> Vec<Float> {
    let total: Float = mass.iter().filter(|m| m.is_finite() && **m > 0.0).sum();
    let cut = thres * total;
    for m in mass.iter_mut() {
        if !m.is_finite() || *m < cut || *m < 0.0 {
            *m = 0.0;
        }
    }
    mass
}

/// Returns the mass a point needs to refine the octree: `fixed` when it is
/// positive, else `multiplier` times the mean of the nonzero masses.
///
/// * `masses`     - Point masses.
/// * `fixed`      - User threshold.
/// * `multiplier` - Multiplier of the automatic threshold.
pub fn mass_threshold(masses: &[Float], fixed: Float, multiplier: Float) -> Float {
    if fixed > 0.0 {
        return fixed;
    }
    let (sum, count) = masses
        .iter()
        .filter(|m| **m > 0.0)
        .fold((0.0, 0_usize), |(s, c), m| (s + m, c + 1));
    if count == 0 {
        0.0
    } else {
        multiplier * sum / count as Float
    }
}

/// Primal light transport used on both sides of a silhouette.
pub trait PrimalTracer: Sync {
    /// Returns the radiance arriving along a ray whose first hit is path
    /// vertex `depth`.
    ///
    /// * `scene`   - The scene.
    /// * `sampler` - The sampler.
    /// * `ray`     - The ray.
    /// * `depth`   - Depth of the first hit.
    fn radiance(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray, depth: u32) -> SpectrumF;

    /// Traces a primal path and returns one of its segments, chosen
    /// uniformly among the candidates `kind` allows.
    ///
    /// * `scene`   - The scene.
    /// * `sampler` - The sampler.
    /// * `ray`     - Primary ray.
    /// * `kind`    - Candidate segments.
    fn seed_ray(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray, kind: ProjectSeed) -> Option<Ray>;
}

/// A weighted point on a silhouette ready to be splatted.
#[derive(Copy, Clone, Debug)]
pub struct BoundarySample {
    /// Raster position.
    pub pos: Point2f,

    /// Radiance difference times all detached weights.
    pub value: SpectrumF,

    /// Normal velocity of the silhouette; only its derivative is used.
    pub motion: Real,
}

/// Silhouette primitives of one shape as seen from the sensor.
struct PrimarySilhouette {
    shape: usize,
    prims: Vec<u32>,
    distr: Distribution1D,
}

/// Sensor connection chosen by the indirect estimator.
#[derive(Copy, Clone, Debug)]
struct SensorConnection {
    pos: Point2f,
    weight: SpectrumF,
    depth: u32,
}

/// Estimators of the derivative terms caused by silhouettes, bound to one
/// render call.
pub struct ProjectiveDetail<'a> {
    scene: &'a Scene,
    sensor: &'a dyn Sensor,
    tracer: &'a dyn PrimalTracer,
    config: &'a ProjectiveConfig,
    max_depth: u32,
    threads: usize,
    primary: Vec<PrimarySilhouette>,
    primary_distr: Option<Distribution1D>,
}

impl<'a> ProjectiveDetail<'a> {
    /// Precomputes the silhouettes visible from the sensor position.
    ///
    /// * `scene`      - The scene.
    /// * `sensor`     - The sensor.
    /// * `tracer`     - Primal light transport.
    /// * `config`     - Discontinuity settings.
    /// * `integrator` - Path tracer settings.
    pub fn new(
        scene: &'a Scene,
        sensor: &'a dyn Sensor,
        tracer: &'a dyn PrimalTracer,
        config: &'a ProjectiveConfig,
        integrator: &IntegratorConfig,
    ) -> Self {
        let viewpoint = sensor.world_position();
        let mut primary = Vec::new();
        let mut weights = Vec::new();
        for &shape in scene.silhouette_shapes() {
            let (prims, w) = scene.shapes[shape].precompute_silhouette(&viewpoint);
            let total: Float = w.iter().sum();
            if prims.is_empty() || !(total > 0.0) {
                continue;
            }
            weights.push(total);
            primary.push(PrimarySilhouette {
                shape,
                prims,
                distr: Distribution1D::new(w),
            });
        }
        let primary_distr = if primary.is_empty() {
            None
        } else {
            Some(Distribution1D::new(weights))
        };

        Self {
            scene,
            sensor,
            tracer,
            config,
            max_depth: integrator.max_depth,
            threads: integrator.threads,
            primary,
            primary_distr,
        }
    }

    /// Returns the normal velocity of a silhouette point.
    ///
    /// * `ss` - Silhouette sample.
    fn motion(&self, ss: &SilhouetteSample) -> Real {
        match ss.shape {
            Some(s) => self.scene.shapes[s]
                .differential_motion(ss)
                .dot(&Vector3r::from(ss.n)),
            None => Real::constant(0.0),
        }
    }

    /// Samples a point on a silhouette seen directly by the sensor and
    /// returns its contribution before division by the sample count.
    ///
    /// * `sampler` - The sampler.
    pub fn eval_primary(&self, sampler: &mut dyn Sampler) -> Option<BoundarySample> {
        let distr = self.primary_distr.as_ref()?;
        let u = sampler.next_3d();
        let (k, pmf_shape, _) = distr.sample_discrete(u.x);
        let sil = &self.primary[k];
        let (e, pmf_prim, _) = sil.distr.sample_discrete(u.y);

        let viewpoint = self.sensor.world_position();
        let mut ss = self.scene.shapes[sil.shape].sample_precomputed_silhouette(&viewpoint, sil.prims[e], u.z);
        ss.shape = Some(sil.shape);
        ss.pdf *= pmf_shape * pmf_prim;
        if !ss.is_valid() {
            return None;
        }
        let pos = self.sensor.project(&ss.p)?;

        // Visibility is tested against the free side of the silhouette; a
        // ray grazing `ss.p` itself can clip the shape it came from.
        let free = ss.offset_point(1.0);
        let to_free = free - viewpoint;
        let dist = to_free.length();
        let eps = (1.0 + ss.p.abs().max_component()) * RAY_EPSILON * 10.0;
        if dist <= eps || self.scene.ray_test(&Ray::with_max(viewpoint, to_free / dist, dist - eps)) {
            return None;
        }

        let towards = |p: Point3f| Ray::new(viewpoint, (p - viewpoint).normalize());
        let l_occluded = self.tracer.radiance(self.scene, sampler, &towards(ss.offset_point(-1.0)), 0);
        let l_free = self.tracer.radiance(self.scene, sampler, &towards(ss.offset_point(1.0)), 0);
        let delta = l_occluded - l_free;
        if delta.is_black() {
            return None;
        }

        let jacobian = self.sensor.raster_jacobian(&ss.p, &ss.e, &ss.n);
        Some(BoundarySample {
            pos,
            value: delta * (jacobian / ss.pdf),
            motion: self.motion(&ss),
        })
    }

    /// Builds a subpath from the far end of a boundary segment towards the
    /// sensor and picks one of its sensor connections with reservoir
    /// sampling. The returned weight is already divided by the selection
    /// probability.
    ///
    /// * `sampler` - The sampler.
    /// * `si_s`    - Far end of the boundary segment, looking at the
    ///               silhouette.
    fn connect_sensor(&self, sampler: &mut dyn Sampler, si_s: &SurfaceInteraction) -> Option<SensorConnection> {
        let ctx = BSDFContext::new(TransportMode::Importance);
        let mut reservoir = Reservoir::new();
        let mut si = *si_s;
        let mut beta = SpectrumF::one();
        let mut depth = 0_u32;

        // Vertex `depth` of the subpath sits at path depth `depth`, the
        // silhouette side at `depth + 1`.
        while depth.saturating_add(1) < self.max_depth {
            let bsdf = match si.shape {
                Some(s) => self.scene.shapes[s].bsdf(),
                None => break,
            };

            if bsdf.flags().has_smooth() {
                if let Some((ds, weight)) = self.sensor.sample_direction(&si.p_f()) {
                    if weight > 0.0 && !self.scene.ray_test(&si.spawn_ray_to(&ds.p.value())) {
                        let wo = Vector3r::from(si.to_local_f(&ds.d));
                        let f = bsdf.eval(&ctx, &si, &wo).value();
                        let w = beta * f * weight;
                        if !w.is_black() && !w.has_nans() {
                            let candidate = SensorConnection {
                                pos: ds.uv,
                                weight: w,
                                depth,
                            };
                            reservoir.update(candidate, 1.0, sampler.next_1d());
                        }
                    }
                }
            }

            let u1 = sampler.next_1d();
            let u2 = sampler.next_2d();
            let (bs, bsdf_weight) = bsdf.sample(&ctx, &si, u1, &u2);
            if bs.pdf <= 0.0 || bsdf_weight.is_black() {
                break;
            }
            beta *= bsdf_weight;
            let next = self
                .scene
                .ray_intersect(&si.spawn_ray(&si.to_world_f(&bs.wo)), RayFlags::ALL);
            if !next.is_valid() {
                break;
            }
            si = next.detach();
            depth += 1;
        }

        let total = reservoir.total_weight;
        reservoir.sample.map(|mut c| {
            c.weight *= total;
            c
        })
    }

    /// Evaluates an indirectly visible silhouette point and returns its
    /// contribution before division by the sample count.
    ///
    /// * `sampler` - The sampler.
    /// * `u`       - Point in the boundary sample space.
    /// * `rcp_pdf` - Reciprocal density of `u`.
    pub fn eval_indirect(&self, sampler: &mut dyn Sampler, u: &Point3f, rcp_pdf: Float) -> Option<BoundarySample> {
        if !(rcp_pdf > 0.0) {
            return None;
        }
        let ss = self.scene.sample_silhouette(u, DiscontinuityFlags::ALL);
        if !ss.is_valid() {
            return None;
        }

        let si_s = self.scene.ray_intersect(&ss.spawn_ray(), RayFlags::ALL).detach();
        if !si_s.is_valid() {
            return None;
        }
        let connection = self.connect_sensor(sampler, &si_s)?;

        let p_s = si_s.p_f();
        let towards = |p: Point3f| si_s.spawn_ray(&(p - p_s).normalize());
        let depth = connection.depth + 1;
        let l_occluded = self.tracer.radiance(self.scene, sampler, &towards(ss.offset_point(-1.0)), depth);
        let l_free = self.tracer.radiance(self.scene, sampler, &towards(ss.offset_point(1.0)), depth);
        let delta = l_occluded - l_free;
        if delta.is_black() {
            return None;
        }

        Some(BoundarySample {
            pos: connection.pos,
            value: connection.weight * delta * (ss.foreshortening * rcp_pdf / ss.pdf),
            motion: self.motion(&ss),
        })
    }

    /// Returns the guiding mass of a point in the boundary sample space:
    /// the mean absolute contribution times the L1 norm of the gradient of
    /// the normal velocity.
    ///
    /// * `sampler` - The sampler.
    /// * `u`       - Point in the boundary sample space.
    pub fn indirect_mass(&self, sampler: &mut dyn Sampler, u: &Point3f) -> Float {
        match self.eval_indirect(sampler, u, 1.0) {
            Some(b) => {
                let grad: Float = b.motion.grad().iter().map(|g| g.abs()).sum();
                let mass = b.value.abs().average() * grad;
                if mass.is_finite() {
                    mass
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Traces a primal path from a random raster position, projects one of
    /// its segments onto a nearby silhouette and returns the silhouette
    /// point in the boundary sample space.
    ///
    /// * `sampler` - The sampler.
    pub fn projected_point(&self, sampler: &mut dyn Sampler) -> Option<Point3f> {
        let size = self.sensor.film().size;
        let u = sampler.next_2d();
        let (ray, _) = self
            .sensor
            .sample_ray(&Point2f::new(u.x * size.x as Float, u.y * size.y as Float));
        let seed_ray = self
            .tracer
            .seed_ray(self.scene, sampler, &ray, self.config.project_seed)?;

        let pi = self.scene.ray_intersect_preliminary(&seed_ray);
        let shape = pi.shape?;
        if !pi.is_valid() || !self.scene.silhouette_shapes().contains(&shape) {
            return None;
        }
        let si = pi.compute_surface_interaction(self.scene, &seed_ray, RayFlags::ALL);
        let mut ss = self.scene.shapes[shape].primitive_silhouette_projection(
            &seed_ray.o,
            &si,
            DiscontinuityFlags::ALL,
            sampler.next_1d(),
        );
        ss.shape = Some(shape);
        if !ss.is_valid() {
            return None;
        }
        self.scene.invert_silhouette_sample(&ss)
    }

    /// Evaluates `f` for `count` independently seeded samples in parallel.
    ///
    /// * `label` - Progress message.
    /// * `seed`  - Seed of the sampler streams.
    /// * `count` - Number of samples.
    /// * `f`     - Per-sample body receiving the sample index.
    fn estimate<T, F>(&self, label: &str, seed: u64, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&mut dyn Sampler, usize) -> T + Sync,
    {
        let n_jobs = (count + DISCONTINUITY_CHUNK - 1) / DISCONTINUITY_CHUNK;
        parallel_for(n_jobs, self.threads, label, |job| {
            let mut sampler = self.sensor.sampler().clone_sampler();
            let end = ((job + 1) * DISCONTINUITY_CHUNK).min(count);
            (job * DISCONTINUITY_CHUNK..end)
                .map(|i| {
                    sampler.seed(seed, i as u64);
                    f(sampler.as_mut(), i)
                })
                .collect::<Vec<T>>()
        })
        .into_iter()
        .flatten()
        .collect()
    }

    /// Returns projected points with their masses.
    ///
    /// * `seed`  - Seed of the sampler streams.
    /// * `count` - Number of projection attempts.
    fn projected_masses(&self, seed: u64, count: usize) -> Vec<(Point3f, Float)> {
        self.estimate("Projecting", seed, count, |sampler, _| {
            self.projected_point(sampler)
                .map(|p| (p, self.indirect_mass(sampler, &p)))
        })
        .into_iter()
        .flatten()
        .collect()
    }

    /// Returns the mean mass of uniform points inside each box.
    ///
    /// * `seed`       - Seed of the sampler streams.
    /// * `boxes`      - Regions of the boundary sample space.
    /// * `per_region` - Samples per region.
    fn region_masses(&self, seed: u64, boxes: &[Bounds3f], per_region: usize) -> Vec<Float> {
        let per_region = per_region.max(1);
        let estimates = self.estimate("Guiding mass", seed, boxes.len() * per_region, |sampler, i| {
            let u = boxes[i / per_region].lerp(&sampler.next_3d());
            self.indirect_mass(sampler, &u)
        });
        estimates
            .chunks(per_region)
            .map(|c| c.iter().sum::<Float>() / per_region as Float)
            .collect()
    }

    /// Returns the seed of a guiding round.
    ///
    /// * `seed`  - Seed of the render call.
    /// * `round` - Round index.
    fn round_seed(seed: u64, round: u32) -> u64 {
        (seed ^ SEED_GUIDING).wrapping_add(round as u64)
    }

    /// Builds a `GridDistr`. Returns `None` when all mass vanished.
    ///
    /// * `seed` - Seed of the render call.
    pub fn build_grid(&self, seed: u64) -> Option<GridDistr> {
        let cfg = self.config;
        let mut grid = GridDistr::new(cfg.grid_resolution);
        let cells = grid.cells();
        let mut mass = vec![0.0; cells.len()];
        let mut hits = vec![0_u32; cells.len()];

        for round in 0..cfg.guiding_rounds {
            let seed = Self::round_seed(seed, round);
            if cfg.guiding_proj {
                for (p, m) in self.projected_masses(seed, cfg.guiding_samples) {
                    let c = grid.cell_index(&p);
                    mass[c] += m;
                    hits[c] += 1;
                }
            } else {
                for (c, m) in self.region_masses(seed, &cells, cfg.extra_samples).into_iter().enumerate() {
                    mass[c] += m;
                    hits[c] += 1;
                }
            }
        }

        if cfg.guiding_proj && cfg.extra_samples > 0 {
            let touched: Vec<usize> = (0..cells.len()).filter(|c| hits[*c] > 0).collect();
            let boxes: Vec<Bounds3f> = touched.iter().map(|c| cells[*c]).collect();
            let seed = Self::round_seed(seed, cfg.guiding_rounds);
            for (c, m) in touched.iter().zip(self.region_masses(seed, &boxes, cfg.extra_samples)) {
                mass[*c] += m;
                hits[*c] += 1;
            }
        }

        let mass = mass
            .iter()
            .zip(hits.iter())
            .map(|(m, h)| if *h > 0 { m / *h as Float } else { 0.0 })
            .collect();
        if grid.set_mass(mass, cfg.clamp_mass_thres) {
            Some(grid)
        } else {
            None
        }
    }

    /// Builds an `OcSpaceDistr`. Returns `None` when all mass vanished.
    ///
    /// * `seed` - Seed of the render call.
    pub fn build_octree(&self, seed: u64) -> Result<Option<OcSpaceDistr>> {
        let cfg = self.config;
        let mut points: Vec<(Point3f, Float)> = Vec::new();
        for round in 0..cfg.guiding_rounds {
            let seed = Self::round_seed(seed, round);
            if cfg.guiding_proj {
                points.extend(self.projected_masses(seed, cfg.guiding_samples));
            } else {
                points.extend(self.estimate("Guiding mass", seed, cfg.guiding_samples, |sampler, _| {
                    let u = sampler.next_3d();
                    (u, self.indirect_mass(sampler, &u))
                }));
            }
        }

        let masses: Vec<Float> = points.iter().map(|(_, m)| *m).collect();
        let threshold = mass_threshold(&masses, cfg.octree_mass_threshold, cfg.octree_mass_multiplier);
        let refine: Vec<Point3f> = points
            .iter()
            .filter(|(_, m)| *m > 0.0 && *m >= threshold)
            .map(|(p, _)| *p)
            .collect();
        if refine.is_empty() {
            return Ok(None);
        }
        debug!(
            "Octree guiding: {} of {} points above mass {}",
            refine.len(),
            points.len(),
            threshold
        );

        let mut tree = OcSpaceDistr::build(&refine, &cfg.octree)?;
        let leaf_mass = if cfg.extra_samples > 0 {
            let seed = Self::round_seed(seed, cfg.guiding_rounds);
            self.region_masses(seed, &tree.leaves, cfg.extra_samples)
        } else {
            let mut sum = vec![0.0; tree.leaves.len()];
            let mut hits = vec![0_u32; tree.leaves.len()];
            for (p, m) in points.iter() {
                if let Some(leaf) = tree.leaf_of(p) {
                    sum[leaf] += m;
                    hits[leaf] += 1;
                }
            }
            sum.iter()
                .zip(hits.iter())
                .map(|(s, h)| if *h > 0 { s / *h as Float } else { 0.0 })
                .collect()
        };

        if tree.set_mass(&leaf_mass, cfg.clamp_mass_thres) {
            Ok(Some(tree))
        } else {
            Ok(None)
        }
    }

    /// Builds the configured guiding structure. Returns `Ok(None)` when
    /// every mass estimate vanished.
    ///
    /// * `seed` - Seed of the render call.
    pub fn build_guiding(&self, seed: u64) -> Result<Option<Box<dyn GuidingDistribution>>> {
        let guiding: Option<Box<dyn GuidingDistribution>> = match self.config.guiding {
            GuidingMode::None => return Ok(None),
            GuidingMode::Grid => self.build_grid(seed).map(|g| Box::new(g) as Box<dyn GuidingDistribution>),
            GuidingMode::Octree => self
                .build_octree(seed)?
                .map(|t| Box::new(t) as Box<dyn GuidingDistribution>),
        };
        Ok(guiding)
    }

    /// Draws `count` boundary samples with `f` and splats them (forward) or
    /// propagates their adjoint (backward).
    #[allow(clippy::too_many_arguments)]
    fn splat_pass<F>(
        &self,
        mode: ADMode,
        label: &str,
        seed: u64,
        count: u64,
        grad_in: Option<&Image>,
        tracker: &mut GradientTracker,
        block: &mut ImageBlock,
        f: F,
    ) -> Result<()>
    where
        F: Fn(&mut dyn Sampler) -> Option<BoundarySample> + Sync,
    {
        check_wavefront(count)?;
        let film = self.sensor.film();
        let count = count as usize;
        let norm = 1.0 / count as Float;
        let tangents = tracker.tangents;
        let n_jobs = (count + DISCONTINUITY_CHUNK - 1) / DISCONTINUITY_CHUNK;

        let results = parallel_for(n_jobs, self.threads, label, |job| {
            let mut sampler = self.sensor.sampler().clone_sampler();
            let mut local_block = film.create_block(false);
            let mut local_tracker = GradientTracker::with_tangents(tangents);
            let end = ((job + 1) * DISCONTINUITY_CHUNK).min(count);
            for i in job * DISCONTINUITY_CHUNK..end {
                sampler.seed(seed, i as u64);
                let bs = match f(sampler.as_mut()) {
                    Some(bs) if !bs.value.has_nans() => bs,
                    _ => continue,
                };
                let value = bs.value * norm;
                match mode {
                    ADMode::Forward => {
                        let t = local_tracker.forward_scalar(&bs.motion);
                        if t != 0.0 {
                            local_block.put(&bs.pos, &(value * t));
                        }
                    }
                    ADMode::Backward => {
                        if let Some(g) = grad_in {
                            let w = local_block.adjoint(&bs.pos, g) * value;
                            local_tracker.backward_scalar(&bs.motion, w[0] + w[1] + w[2]);
                        }
                    }
                    ADMode::Primal => {}
                }
            }
            (local_block, local_tracker)
        });

        for (b, t) in results.iter() {
            block.merge(b);
            tracker.merge(t);
        }
        Ok(())
    }

    /// Estimates both silhouette terms. Forward mode returns an
    /// unnormalized block; backward mode accumulates into `tracker`.
    ///
    /// * `mode`    - `Forward` or `Backward`.
    /// * `seed`    - Seed of the render call.
    /// * `spp`     - Samples per pixel of the render call.
    /// * `grad_in` - Adjoint of the developed image (backward mode).
    /// * `tracker` - Gradient tracker of the render call.
    pub fn render(
        &self,
        mode: ADMode,
        seed: u64,
        spp: usize,
        grad_in: Option<&Image>,
        tracker: &mut GradientTracker,
    ) -> Result<Option<ImageBlock>> {
        if mode.is_primal() || self.scene.silhouette_shapes().is_empty() {
            return Ok(None);
        }
        let film = self.sensor.film();
        let pixels = film.pixel_count() as u64;
        let mut block = film.create_block(false);

        let spp_p = self.config.sppp.unwrap_or(spp);
        if spp_p > 0 && self.primary_distr.is_some() {
            self.splat_pass(
                mode,
                "Primary boundary",
                seed ^ SEED_PRIMARY_DISCONTINUITY,
                pixels * spp_p as u64,
                grad_in,
                tracker,
                &mut block,
                |sampler| self.eval_primary(sampler),
            )?;
        }

        let spp_i = self.config.sppi.unwrap_or(spp);
        if spp_i > 0 {
            let guiding = self.build_guiding(seed)?;
            if self.config.guiding != GuidingMode::None && guiding.is_none() {
                warn!("All guiding mass vanished; skipping indirect silhouettes");
            } else {
                self.splat_pass(
                    mode,
                    "Indirect boundary",
                    seed ^ SEED_INDIRECT_DISCONTINUITY,
                    pixels * spp_i as u64,
                    grad_in,
                    tracker,
                    &mut block,
                    |sampler| {
                        let u = sampler.next_3d();
                        let (u, rcp_pdf) = match &guiding {
                            Some(g) => g.sample(&u),
                            None => (u, 1.0),
                        };
                        self.eval_indirect(sampler, &u, rcp_pdf)
                    },
                )?;
            }
        }

        Ok(if mode == ADMode::Forward { Some(block) } else { None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    #[test]
    fn parses_enums() {
        assert_eq!(GuidingMode::try_from("grid").unwrap(), GuidingMode::Grid);
        assert!(GuidingMode::try_from("kd").is_err());
        assert_eq!(ProjectSeed::try_from("bsdf").unwrap(), ProjectSeed::Bsdf);
        assert!(ProjectSeed::try_from("all").is_err());
        assert!(ProjectSeed::Both.bsdf() && ProjectSeed::Both.emitter());
        assert!(!ProjectSeed::Emitter.bsdf());
    }

    #[test]
    fn config_from_params() {
        let mut params = ParamSet::new();
        params.add_int("sppp", &[4]);
        params.add_string("guiding", &[String::from("grid")]);
        params.add_int("grid_resolution", &[8]);
        let cfg = ProjectiveConfig::try_from(&params).unwrap();
        assert_eq!(cfg.sppc, None);
        assert_eq!(cfg.sppp, Some(4));
        assert_eq!(cfg.guiding, GuidingMode::Grid);
        assert_eq!(cfg.grid_resolution, 8);
    }

    #[test]
    fn config_rejects_invalid_values() {
        let mut params = ParamSet::new();
        params.add_string("project_seed", &[String::from("light")]);
        assert!(matches!(ProjectiveConfig::try_from(&params), Err(Error::Config(..))));

        let mut params = ParamSet::new();
        params.add_int("sppi", &[-3]);
        assert!(ProjectiveConfig::try_from(&params).is_err());

        let mut params = ParamSet::new();
        params.add_int("octree_max_leaf_count", &[0]);
        assert!(ProjectiveConfig::try_from(&params).is_err());
    }

    #[test]
    fn clamping_is_a_hard_zero() {
        let m = clamp_mass(vec![1.0, 1e-9, 0.5, Float::NAN, -1.0], 1e-6);
        assert_eq!(m, vec![1.0, 0.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn automatic_threshold_uses_nonzero_mean() {
        let t = mass_threshold(&[0.0, 2.0, 4.0, 0.0], 0.0, 0.5);
        assert!(approx_eq!(Float, t, 1.5, epsilon = 1e-6));
        assert_eq!(mass_threshold(&[0.0, 2.0], 3.0, 0.5), 3.0);
        assert_eq!(mass_threshold(&[0.0], 0.0, 1.0), 0.0);
    }

    proptest! {
        #[test]
        fn clamped_mass_keeps_large_values(m in prop::collection::vec(0.0..100.0f32, 1..20), t in 0.0..0.5f32) {
            let total: Float = m.iter().sum();
            let clamped = clamp_mass(m.clone(), t);
            for (a, b) in m.iter().zip(clamped.iter()) {
                prop_assert!(*b == 0.0 || *b == *a);
                if *a >= t * total {
                    prop_assert_eq!(*a, *b);
                }
            }
        }
    }
}
