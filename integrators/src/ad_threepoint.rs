//! Attached Path Tracer (three-point formulation)

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::error::*;
use prb_core::geometry::*;
use prb_core::integrator::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampler::*;
use prb_core::scene::*;
use prb_core::sensor::*;
use prb_core::spectrum::*;

/// Evaluates the same estimator as `PRBThreePointIntegrator`, but keeps
/// the throughput attached and differentiates the whole path at once
/// instead of replaying it. It serves as a reference for the replay.
pub struct ADThreePointIntegrator {
    /// Common settings.
    pub config: IntegratorConfig,
}

impl ADThreePointIntegrator {
    /// Create a new `ADThreePointIntegrator`.
    ///
    /// * `config` - Common settings.
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }
}

impl ADIntegrator for ADThreePointIntegrator {
    fn get_type(&self) -> &'static str {
        "ad_threepoint"
    }

    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn attached_positions(&self) -> bool {
        true
    }

    fn sample(
        &self,
        mode: ADMode,
        scene: &Scene,
        sensor: &dyn Sensor,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        ctx: &mut SampleContext,
    ) -> SampleResult {
        let cfg = &self.config;
        let bsdf_ctx = BSDFContext::default();

        let pi0 = scene.ray_intersect_preliminary(ray);
        let mut prev = PrevVertex::origin(&ray.o);
        let mut si = three_point_vertex(scene, &pi0, ray, &prev.p);

        let mut l = Spectrum::zero();
        let mut beta = Spectrum::one();
        let mut eta: Float = 1.0;
        let mut depth = 0_u32;
        let mut pos = None;

        if si.is_valid() {
            beta = beta * det_over_det(sensor_to_surface_reparam_det(sensor, &si, false));
            if !mode.is_primal() {
                pos = sensor.project_attached(&si.p);
            }
        }

        while depth < cfg.max_depth {
            if !(depth == 0 && cfg.hide_emitters) && scene.emitter_at(&si).is_some() {
                let mis = emission_mis(scene, &si, &prev);
                l += scene.eval_emitter(&si) * beta * mis;
            }

            let active_next = si.is_valid() && depth + 1 < cfg.max_depth;
            let bsdf = match (active_next, si.shape) {
                (true, Some(s)) => scene.shapes[s].bsdf(),
                _ => break,
            };

            if bsdf.flags().has_smooth() {
                let u = sampler.next_2d();
                let (ds, em_weight) = scene.sample_emitter_direction(&si, &u, true);
                if !em_weight.is_black() {
                    l += emitter_contribution(
                        scene,
                        bsdf,
                        &bsdf_ctx,
                        &si,
                        &ds,
                        &em_weight,
                        true,
                        cfg.delta_emitter_attached,
                    ) * beta;
                }
            }

            let u1 = sampler.next_1d();
            let u2 = sampler.next_2d();
            let (bs, bsdf_weight) = bsdf.sample(&bsdf_ctx, &si, u1, &u2);
            if bs.pdf <= 0.0 || bsdf_weight.is_black() {
                break;
            }

            let delta_lobe = bs.sampled_type.has_delta();
            let wo_world = si.to_world_f(&bs.wo);
            let next_ray = si.spawn_ray(&wo_world);
            let pi_next = scene.ray_intersect_preliminary(&next_ray);
            let si_next = if delta_lobe {
                pi_next.compute_surface_interaction(scene, &next_ray, RayFlags::ALL)
            } else {
                three_point_vertex(scene, &pi_next, &next_ray, &si.p)
            };

            beta = if delta_lobe {
                beta * bsdf_weight
            } else {
                let wo = if si_next.is_valid() {
                    si.to_local(&(si_next.p - si.p).normalize())
                } else {
                    si.to_local(&Vector3r::from(wo_world))
                };
                let bsdf_val = bsdf.eval(&bsdf_ctx, &si, &wo);
                let j = det_over_det(solid_to_surface_reparam_det(&si_next, &si.p));
                beta * bsdf_weight * unit_ratio(&(bsdf_val * j), &(bsdf_weight * bs.pdf))
            };
            eta *= bs.eta;
            prev = PrevVertex {
                p: si.p,
                bsdf_pdf: bs.pdf,
                bsdf_delta: delta_lobe,
            };
            si = si_next;
            depth += 1;

            if depth >= cfg.rr_depth {
                let q = rr_probability(&beta.value(), eta);
                let u = sampler.next_1d();
                if !(q > 0.0 && u < q) {
                    break;
                }
                beta = beta / q;
            }
            if beta.value().max_value() <= 0.0 {
                break;
            }
        }

        let mut tangent = SpectrumF::zero();
        propagate(mode, ctx, &l, &mut tangent);
        SampleResult {
            l: match mode {
                ADMode::Primal => l.value(),
                ADMode::Forward => tangent,
                ADMode::Backward => SpectrumF::zero(),
            },
            valid: pi0.is_valid(),
            state: PathState { l: l.value(), pi: pi0 },
            pos,
        }
    }
}

impl TryFrom<&ParamSet> for ADThreePointIntegrator {
    type Error = Error;

    /// Create a `ADThreePointIntegrator` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        Ok(Self::new(IntegratorConfig::try_from(params)?))
    }
}
