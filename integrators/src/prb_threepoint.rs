//! Path Replay Backpropagation (three-point formulation)

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

/// Path Replay Backpropagation with path vertices attached to the shapes
/// they lie on.
///
/// Every vertex is reconstructed with `RayFlags::FOLLOW_SHAPE`, so moving a
/// shape moves the sampled points with it. The change of sampling density
/// this causes is accounted for by `det_over_det` factors: the sensor
/// Jacobian at the primary vertex and the solid angle to area Jacobian at
/// every vertex reached by a smooth BSDF sample. Because derivatives flow
/// through the vertex positions, the splat position of the primary vertex
/// is attached as well.
///
/// The differential passes replay the primal random walk from the state
/// `(L, first preliminary intersection)` and subtract the local emission
/// at every vertex so that the remaining radiance is known without storing
/// the path.
pub struct PRBThreePointIntegrator {
    /// Common settings.
    pub config: IntegratorConfig,
}

impl PRBThreePointIntegrator {
    /// Create a new `PRBThreePointIntegrator`.
    ///
    /// * `config` - Common settings.
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }
}

impl ADIntegrator for PRBThreePointIntegrator {
    fn get_type(&self) -> &'static str {
        "prb_threepoint"
    }

    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn attached_positions(&self) -> bool {
        true
    }

    /// Traces one path. The primal pass accumulates `L`; the differential
    /// passes start from `ctx.state_in` and replay the same walk.
    ///
    /// * `mode`    - Differentiation mode.
    /// * `scene`   - The scene.
    /// * `sensor`  - The sensor.
    /// * `sampler` - Sampler positioned at the start of the sample's stream.
    /// * `ray`     - Primary ray.
    /// * `ctx`     - Differential inputs.
    fn sample(
        &self,
        mode: ADMode,
        scene: &Scene,
        sensor: &dyn Sensor,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        ctx: &mut SampleContext,
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
        let mut depth = 0_u32;
        let mut prev = PrevVertex::origin(&ray.o);

        let mut si = three_point_vertex(scene, &pi0, ray, &prev.p);

        // The whole path is reparameterized by the primary vertex.
        let mut pos = None;
        if !primal && si.is_valid() {
            let j = det_over_det(sensor_to_surface_reparam_det(sensor, &si, false));
            propagate(mode, ctx, &(Spectrum::from(l) * j), &mut tangent);
            pos = sensor.project_attached(&si.p);
        }

        while depth < cfg.max_depth {
            // Emission found by BSDF sampling (or by the sensor ray).
            let mut le = Spectrum::zero();
            if !(depth == 0 && cfg.hide_emitters) && scene.emitter_at(&si).is_some() {
                let mis = emission_mis(scene, &si, &prev);
                le = scene.eval_emitter(&si) * beta * mis;
            }

            let active_next = si.is_valid() && depth + 1 < cfg.max_depth;
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

            // Next event estimation.
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
                        true,
                        cfg.delta_emitter_attached,
                    ) * beta;
                }
            }

            // Detached BSDF sampling.
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

            // Look ahead to the next vertex; its position enters the BSDF
            // value and the area Jacobian of this bounce.
            let delta_lobe = bs.sampled_type.has_delta();
            let wo_world = si.to_world_f(&bs.wo);
            let next_ray = si.spawn_ray(&wo_world);
            let pi_next = scene.ray_intersect_preliminary(&next_ray);
            let si_next = if delta_lobe {
                pi_next.compute_surface_interaction(scene, &next_ray, RayFlags::ALL)
            } else {
                three_point_vertex(scene, &pi_next, &next_ray, &si.p)
            };

            if !primal {
                let lr_ind = if delta_lobe {
                    Spectrum::from(l)
                } else {
                    let wo = if si_next.is_valid() {
                        si.to_local(&(si_next.p - si.p).normalize())
                    } else {
                        si.to_local(&Vector3r::from(wo_world))
                    };
                    let bsdf_val = bsdf.eval(&bsdf_ctx, &si, &wo);
                    let j = det_over_det(solid_to_surface_reparam_det(&si_next, &si.p));
                    Spectrum::from(l) * unit_ratio(&(bsdf_val * j), &(bsdf_weight * bs.pdf))
                };
                propagate(mode, ctx, &(local + lr_ind), &mut tangent);
            }

            beta = beta * bsdf_weight;
            eta *= bs.eta;
            prev = PrevVertex {
                p: si.p,
                bsdf_pdf: bs.pdf,
                bsdf_delta: delta_lobe,
            };
            si = si_next;
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
            pos,
        }
    }
}

impl TryFrom<&ParamSet> for PRBThreePointIntegrator {
    type Error = Error;

    /// Create a `PRBThreePointIntegrator` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        Ok(Self::new(IntegratorConfig::try_from(params)?))
    }
}
