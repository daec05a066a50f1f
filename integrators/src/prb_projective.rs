//! Path Replay Backpropagation with Projective Sampling

use crate::common::*;
use crate::projective::*;
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

/// Path Replay Backpropagation with ray-following path vertices.
///
/// The continuous part of the derivative is estimated like
/// `PRBThreePointIntegrator` but every vertex stays where the ray hit it;
/// derivatives flow through shading frames, materials and emitters only.
/// Moving geometry therefore changes the image through visibility alone,
/// and those derivatives are estimated separately by `ProjectiveDetail` on
/// the silhouettes that are visible directly and indirectly.
pub struct PRBProjectiveIntegrator {
    /// Common settings.
    pub config: IntegratorConfig,

    /// Discontinuity settings.
    pub projective: ProjectiveConfig,
}

impl PRBProjectiveIntegrator {
    /// Create a new `PRBProjectiveIntegrator`.
    ///
    /// * `config`     - Common settings.
    /// * `projective` - Discontinuity settings.
    pub fn new(config: IntegratorConfig, projective: ProjectiveConfig) -> Self {
        Self { config, projective }
    }

    /// The random walk. Starts at path depth `depth0`; with `seeds` set, the
    /// segments allowed by the seed kind are offered to the reservoir.
    ///
    /// * `mode`    - Differentiation mode.
    /// * `scene`   - The scene.
    /// * `sampler` - The sampler.
    /// * `ray`     - The ray the path starts with.
    /// * `depth0`  - Path depth of the first hit.
    /// * `ctx`     - Differential inputs.
    /// * `seeds`   - Seed ray reservoir and candidate kind.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        mode: ADMode,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        depth0: u32,
        ctx: &mut SampleContext,
        mut seeds: Option<(&mut Reservoir<Ray>, ProjectSeed)>,
    ) -> SampleResult {
        let primal = mode.is_primal();
        let cfg = &self.config;
        let bsdf_ctx = BSDFContext::default();
        let state_in = ctx.state_in.unwrap_or_default();

        let pi0 = if primal {
            scene.ray_intersect_preliminary(ray)
        } else {
            state_in.pi
        };
        let mut l = if primal { SpectrumF::zero() } else { state_in.l };
        let mut tangent = SpectrumF::zero();
        let mut beta = SpectrumF::one();
        let mut eta: Float = 1.0;
        let mut depth = depth0;
        let mut prev = PrevVertex::origin(&ray.o);
        let mut si = pi0.compute_surface_interaction(scene, ray, RayFlags::ALL);

        while depth < cfg.max_depth {
            let mut le = Spectrum::zero();
            if !(depth == 0 && cfg.hide_emitters) && scene.emitter_at(&si).is_some() {
                let mis = emission_mis(scene, &si, &prev);
                le = scene.eval_emitter(&si) * beta * mis;
            }

            let active_next = si.is_valid() && depth.saturating_add(1) < cfg.max_depth;
            let bsdf = match (active_next, si.shape) {
                (true, Some(s)) => scene.shapes[s].bsdf(),
                _ => {
                    if primal {
                        l += le.value();
                    } else {
                        l -= le.value();
                        propagate(mode, ctx, &le, &mut tangent);
                    }
                    break;
                }
            };

            let mut lr_dir = Spectrum::zero();
            if bsdf.flags().has_smooth() {
                let u = sampler.next_2d();
                let (ds, em_weight) = scene.sample_emitter_direction(&si, &u, true);
                if !em_weight.is_black() {
                    lr_dir = emitter_contribution(
                        scene,
                        bsdf,
                        &bsdf_ctx,
                        &si,
                        &ds,
                        &em_weight,
                        false,
                        cfg.delta_emitter_attached,
                    ) * beta;
                    if let Some((reservoir, kind)) = seeds.as_mut() {
                        if kind.emitter() {
                            reservoir.update(si.spawn_ray(&ds.d), 1.0, sampler.next_1d());
                        }
                    }
                }
            }

            let u1 = sampler.next_1d();
            let u2 = sampler.next_2d();
            let (bs, bsdf_weight) = bsdf.sample(&bsdf_ctx, &si, u1, &u2);

            let local = le + lr_dir;
            if primal {
                l += local.value();
            } else {
                l -= local.value();
            }

            if bs.pdf <= 0.0 || bsdf_weight.is_black() {
                if !primal {
                    propagate(mode, ctx, &local, &mut tangent);
                }
                break;
            }

            let delta_lobe = bs.sampled_type.has_delta();
            let wo_world = si.to_world_f(&bs.wo);
            let next_ray = si.spawn_ray(&wo_world);
            if let Some((reservoir, kind)) = seeds.as_mut() {
                if kind.bsdf() {
                    reservoir.update(next_ray, 1.0, sampler.next_1d());
                }
            }

            if !primal {
                let lr_ind = if delta_lobe {
                    Spectrum::from(l)
                } else {
                    let wo = si.to_local(&Vector3r::from(wo_world));
                    let bsdf_val = bsdf.eval(&bsdf_ctx, &si, &wo);
                    Spectrum::from(l) * unit_ratio(&bsdf_val, &(bsdf_weight * bs.pdf))
                };
                propagate(mode, ctx, &(local + lr_ind), &mut tangent);
            }

            beta *= bsdf_weight;
            eta *= bs.eta;
            prev = PrevVertex {
                p: si.p,
                bsdf_pdf: bs.pdf,
                bsdf_delta: delta_lobe,
            };
            si = scene.ray_intersect(&next_ray, RayFlags::ALL);
            depth += 1;

            if depth >= cfg.rr_depth {
                match russian_roulette(&beta, eta, sampler.next_1d()) {
                    Some(b) => beta = b,
                    None => break,
                }
            }
            if beta.max_value() <= 0.0 {
                break;
            }
        }

        SampleResult {
            l: match mode {
                ADMode::Primal => l,
                ADMode::Forward => tangent,
                ADMode::Backward => SpectrumF::zero(),
            },
            valid: pi0.is_valid(),
            state: PathState { l, pi: pi0 },
            pos: None,
        }
    }
}

impl PrimalTracer for PRBProjectiveIntegrator {
    fn radiance(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray, depth: u32) -> SpectrumF {
        let mut tracker = GradientTracker::default();
        let mut ctx = SampleContext {
            delta_l: SpectrumF::zero(),
            state_in: None,
            tracker: &mut tracker,
        };
        let r = self.walk(ADMode::Primal, scene, sampler, ray, depth, &mut ctx, None);
        r.l.finite_or_zero()
    }

    fn seed_ray(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray, kind: ProjectSeed) -> Option<Ray> {
        let mut tracker = GradientTracker::default();
        let mut ctx = SampleContext {
            delta_l: SpectrumF::zero(),
            state_in: None,
            tracker: &mut tracker,
        };
        let mut reservoir = Reservoir::new();
        self.walk(ADMode::Primal, scene, sampler, ray, 0, &mut ctx, Some((&mut reservoir, kind)));
        reservoir.sample
    }
}

impl ADIntegrator for PRBProjectiveIntegrator {
    fn get_type(&self) -> &'static str {
        "prb_projective"
    }

    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn sample(
        &self,
        mode: ADMode,
        scene: &Scene,
        _sensor: &dyn Sensor,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        ctx: &mut SampleContext,
    ) -> SampleResult {
        self.walk(mode, scene, sampler, ray, 0, ctx, None)
    }

    fn continuous_spp(&self, spp: usize) -> usize {
        self.projective.sppc.unwrap_or(spp)
    }

    fn render_discontinuities(
        &self,
        mode: ADMode,
        scene: &Scene,
        sensor: &dyn Sensor,
        seed: u64,
        spp: usize,
        grad_in: Option<&Image>,
        tracker: &mut GradientTracker,
    ) -> Result<Option<ImageBlock>> {
        let detail = ProjectiveDetail::new(scene, sensor, self, &self.projective, &self.config);
        detail.render(mode, seed, spp, grad_in, tracker)
    }
}

impl TryFrom<&ParamSet> for PRBProjectiveIntegrator {
    type Error = Error;

    /// Create a `PRBProjectiveIntegrator` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        Ok(Self::new(
            IntegratorConfig::try_from(params)?,
            ProjectiveConfig::try_from(params)?,
        ))
    }
}
