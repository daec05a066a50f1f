//! Common

use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::emitter::*;
use prb_core::geometry::*;
use prb_core::integrator::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::scene::*;
use prb_core::spectrum::*;

/// Upper bound of the Russian roulette survival probability.
pub const RR_MAX_PROBABILITY: Float = 0.95;

/// Returns the Russian roulette survival probability
/// `min(max(β) · η², 0.95)`.
///
/// * `beta` - Path throughput.
/// * `eta`  - Accumulated relative index of refraction.
pub fn rr_probability(beta: &SpectrumF, eta: Float) -> Float {
    (beta.max_value() * eta * eta).min(RR_MAX_PROBABILITY)
}

/// Plays Russian roulette. Returns the reweighted throughput of a surviving
/// path or `None` when it is terminated.
///
/// * `beta` - Path throughput.
/// * `eta`  - Accumulated relative index of refraction.
/// * `u`    - Sample value to use.
pub fn russian_roulette(beta: &SpectrumF, eta: Float, u: Float) -> Option<SpectrumF> {
    let q = rr_probability(beta, eta);
    if q > 0.0 && u < q {
        Some(*beta / q)
    } else {
        None
    }
}

/// Divides an attached spectrum by a detached one channel by channel;
/// channels with a zero denominator give zero.
///
/// * `num` - Attached numerator.
/// * `den` - Detached denominator.
pub fn spectrum_ratio(num: &Spectrum, den: &SpectrumF) -> Spectrum {
    let ratio = |c: usize| {
        if den[c] != 0.0 {
            num[c] / den[c]
        } else {
            Real::constant(0.0)
        }
    };
    Spectrum::new(ratio(0), ratio(1), ratio(2))
}

/// Returns a spectrum that is exactly one in value with the derivative of
/// `num / den`.
///
/// * `num` - Attached numerator.
/// * `den` - Detached denominator with the same value as `num`.
pub fn unit_ratio(num: &Spectrum, den: &SpectrumF) -> Spectrum {
    Spectrum::replace_grad(&Spectrum::one(), &spectrum_ratio(num, den))
}

/// Hands a local attached contribution to the gradient tracker according
/// to the differentiation mode. Forward tangents are added to `tangent`.
///
/// * `mode`    - Differentiation mode.
/// * `ctx`     - Sample context holding the tracker and the adjoint.
/// * `lo`      - Attached contribution.
/// * `tangent` - Forward mode accumulator.
pub fn propagate(mode: ADMode, ctx: &mut SampleContext, lo: &Spectrum, tangent: &mut SpectrumF) {
    match mode {
        ADMode::Primal => {}
        ADMode::Forward => *tangent += ctx.tracker.forward_to(lo),
        ADMode::Backward => ctx.tracker.backward_from(&(*lo * ctx.delta_l)),
    }
}

/// Reconstructs a path vertex that moves rigidly with the shape it lies on.
/// The incident direction is recomputed from the attached previous vertex.
///
/// * `scene`  - The scene.
/// * `pi`     - Preliminary intersection of the ray.
/// * `ray`    - The ray.
/// * `prev_p` - Attached previous vertex.
pub fn three_point_vertex(
    scene: &Scene,
    pi: &PreliminaryIntersection,
    ray: &Ray,
    prev_p: &Point3r,
) -> SurfaceInteraction {
    let si = pi.compute_surface_interaction(scene, ray, RayFlags::FOLLOW_SHAPE | RayFlags::ALL);
    if si.is_valid() {
        si.with_wi_from(prev_p)
    } else {
        si
    }
}

/// Vertex data carried to the next bounce for multiple importance sampling
/// of emitters hit by BSDF sampling.
#[derive(Copy, Clone, Debug)]
pub struct PrevVertex {
    /// Attached position of the previous vertex.
    pub p: Point3r,

    /// Density of the BSDF sample that left the vertex.
    pub bsdf_pdf: Float,

    /// Whether the BSDF sample came from a delta lobe (or the sensor).
    pub bsdf_delta: bool,
}

impl PrevVertex {
    /// Returns the state at a sensor or any origin whose outgoing direction
    /// was not chosen by a BSDF.
    ///
    /// * `p` - Origin of the path.
    pub fn origin(p: &Point3f) -> Self {
        Self {
            p: Point3r::from(*p),
            bsdf_pdf: 1.0,
            bsdf_delta: true,
        }
    }
}

/// Returns the MIS weight of emission found by BSDF sampling at `si`.
///
/// * `scene` - The scene.
/// * `si`    - The interaction that was hit (or escaped).
/// * `prev`  - The previous vertex.
pub fn emission_mis(scene: &Scene, si: &SurfaceInteraction, prev: &PrevVertex) -> Float {
    if prev.bsdf_delta {
        return 1.0;
    }
    let p_ref = prev.p.value();
    let ds = DirectionSample::from_interaction(si, &p_ref, scene.emitter_at(si));
    let em_pdf = scene.pdf_emitter_direction(&p_ref, &ds);
    mis_weight(prev.bsdf_pdf, em_pdf)
}

/// Re-evaluates an emitter sample with attached values. Returns
/// `mis · f · Le / pdf` (without the path throughput).
///
/// With `follow_shape` set, points on surface emitters are found again by
/// tracing towards the sample and reconstructing the hit with
/// `RayFlags::FOLLOW_SHAPE`, so they move with the emitter; the change of
/// density is tracked with `det_over_det`.
///
/// * `scene`          - The scene.
/// * `bsdf`           - BSDF at `si`.
/// * `bsdf_ctx`       - BSDF evaluation context.
/// * `si`             - Attached interaction.
/// * `ds`             - Emitter sample (detached density).
/// * `em_weight`      - Detached weight returned by the emitter sampling.
/// * `follow_shape`   - Attach points on surface emitters to their shapes.
/// * `delta_attached` - Keep points on delta-position emitters attached.
#[allow(clippy::too_many_arguments)]
pub fn emitter_contribution(
    scene: &Scene,
    bsdf: &dyn BSDF,
    bsdf_ctx: &BSDFContext,
    si: &SurfaceInteraction,
    ds: &DirectionSample,
    em_weight: &SpectrumF,
    follow_shape: bool,
    delta_attached: bool,
) -> Spectrum {
    let flags = ds
        .emitter
        .map(|e| scene.emitters[e].flags())
        .unwrap_or_default();

    let mut ds_att = *ds;
    let mut jacobian = Real::constant(1.0);
    if ds.delta {
        if !delta_attached {
            ds_att.p = ds.p.detach();
        }
    } else if flags.contains(EmitterFlags::SURFACE) && follow_shape {
        let ray = si.spawn_ray(&ds.d);
        let si_em = scene.ray_intersect(&ray, RayFlags::FOLLOW_SHAPE | RayFlags::ALL);
        if si_em.is_valid() && scene.emitter_at(&si_em) == ds.emitter {
            ds_att.p = Point3r::replace_grad(&ds.p.value(), &si_em.p);
            ds_att.n = si_em.n;
            jacobian = det_over_det(solid_to_surface_reparam_det(&si_em, &si.p));
        } else {
            ds_att.p = ds.p.detach();
        }
    } else {
        ds_att.p = ds.p.detach();
    }

    let wo_world = if flags.contains(EmitterFlags::INFINITE) {
        Vector3r::from(ds.d)
    } else {
        (ds_att.p - si.p).normalize()
    };
    let wo = si.to_local(&wo_world);
    let (bsdf_val, bsdf_pdf) = bsdf.eval_pdf(bsdf_ctx, si, &wo);
    let mis = if ds.delta { 1.0 } else { mis_weight(ds.pdf, bsdf_pdf) };

    let em_val = scene.eval_emitter_direction(&si.p, &ds_att) / ds.pdf;
    let em_val = Spectrum::replace_grad(&Spectrum::from(*em_weight), &em_val);
    bsdf_val * em_val * (jacobian * mis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use prb_core::rng::RNG;
    use proptest::prelude::*;

    #[test]
    fn roulette_is_capped() {
        let beta = SpectrumF::new(4.0, 1.0, 0.5);
        assert_eq!(rr_probability(&beta, 1.0), RR_MAX_PROBABILITY);
        assert!(russian_roulette(&beta, 1.0, 0.96).is_none());
        assert!(russian_roulette(&SpectrumF::zero(), 1.0, 0.0).is_none());
    }

    #[test]
    fn roulette_is_unbiased() {
        let beta = SpectrumF::new(0.3, 0.2, 0.1);
        let mut rng = RNG::new(7);
        let n = 200_000;
        let mut sum = SpectrumF::zero();
        for _ in 0..n {
            if let Some(b) = russian_roulette(&beta, 1.0, rng.uniform_float()) {
                sum += b;
            }
        }
        let mean = sum / n as Float;
        for c in 0..3 {
            assert!((mean[c] - beta[c]).abs() < 0.01 * beta[c].max(0.1), "{:?}", mean);
        }
    }

    #[test]
    fn ratio_of_zero_denominator_is_zero() {
        let x = Real::variable(2.0, 0);
        let r = spectrum_ratio(&Spectrum::new(x, x, x), &SpectrumF::new(2.0, 0.0, 4.0));
        assert_eq!(r[0].value(), 1.0);
        assert_eq!(r[1].value(), 0.0);
        assert!(approx_eq!(Float, r[2].grad_at(0), 0.25, epsilon = 1e-6));
    }

    #[test]
    fn unit_ratio_keeps_only_the_derivative() {
        let x = Real::variable(3.0, 1);
        let u = unit_ratio(&Spectrum::new(x * x, x, Real::constant(1.0)), &SpectrumF::new(9.0, 3.0, 1.0));
        assert_eq!(u.value(), SpectrumF::one());
        assert!(approx_eq!(Float, u[0].grad_at(1), 6.0 / 9.0, epsilon = 1e-6));
        assert!(approx_eq!(Float, u[1].grad_at(1), 1.0 / 3.0, epsilon = 1e-6));
        assert!(!u[2].is_attached());
    }

    proptest! {
        #[test]
        fn roulette_never_makes_throughput_negative(
            r in 0.0..2.0f32, g in 0.0..2.0f32, b in 0.0..2.0f32, u in 0.0..1.0f32
        ) {
            if let Some(beta) = russian_roulette(&SpectrumF::new(r, g, b), 1.0, u) {
                prop_assert!(beta[0] >= 0.0 && beta[1] >= 0.0 && beta[2] >= 0.0);
                prop_assert!(beta[0] >= r && beta[1] >= g && beta[2] >= b);
            }
        }
    }
}
