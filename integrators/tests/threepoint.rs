mod common;

use common::*;
use prb_core::ad::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::integrator::*;
use prb_core::pbrt::*;
use prb_core::sampler::*;
use prb_core::sensor::*;
use prb_core::spectrum::*;
use samplers::*;
use std::collections::HashMap;

const PARAMS: [&str; 4] = ["ball.bsdf.reflectance.r", "lamp.scale", "ball.center.x", "backdrop_light.scale"];

fn tangent(key: &str) -> HashMap<String, Float> {
    HashMap::from([(key.to_string(), 1.0)])
}

/// Adjoint image weighting pixels by their column so that horizontal shifts
/// do not cancel out.
fn ramp(size: Point2i) -> Image {
    let pixels = (0..size.y)
        .flat_map(|_| (0..size.x).map(|x| SpectrumF::splat((x + 1) as Float / size.x as Float)))
        .collect();
    Image::from_pixels(size, pixels)
}

fn dot(a: &Image, b: &Image) -> Float {
    a.pixels
        .iter()
        .zip(b.pixels.iter())
        .map(|(p, q)| (0..3).map(|c| p[c] * q[c]).sum::<Float>())
        .sum()
}

#[test]
fn lit_sphere_center_matches_closed_form() {
    let scene = ball_scene(false);
    let camera = ball_camera(1);
    for name in ["prb_threepoint", "ad_threepoint", "prb_projective"] {
        let integrator = integrator(name, &["max_depth=2"]);
        let image = integrator.render(&scene, &camera, 0, 1).unwrap();
        let center = image.get(16, 16);
        for c in 0..3 {
            assert_close(center[c], 0.5, 0.01, name);
        }
    }
}

#[test]
fn single_bounce_sees_emitters_only() {
    let scene = ball_scene(true);
    let camera = ball_camera(2);
    let integrator = integrator("prb_threepoint", &["max_depth=1"]);
    let image = integrator.render(&scene, &camera, 3, 2).unwrap();
    assert!(image.get(16, 16).is_black());
    for (x, y) in [(0, 0), (32, 0), (0, 32), (32, 32)] {
        assert_close(image.get(x, y)[1], 2.0, 1e-4, "backdrop");
    }
}

#[test]
fn primal_image_is_finite_and_nonnegative() {
    let scene = ball_scene(true);
    let camera = ball_camera(4);
    let integrator = integrator("prb_threepoint", &["max_depth=4", "rr_depth=2"]);
    let image = integrator.render(&scene, &camera, 11, 4).unwrap();
    for p in image.pixels.iter() {
        assert!(!p.has_nans());
        assert!((0..3).all(|c| p[c] >= 0.0 && p[c].is_finite()));
    }
}

#[test]
fn same_seed_renders_the_same_image() {
    let scene = ball_scene(true);
    let camera = ball_camera(2);
    let integrator = integrator("ad_threepoint", &["max_depth=3"]);
    let a = integrator.render(&scene, &camera, 5, 2).unwrap();
    let b = integrator.render(&scene, &camera, 5, 2).unwrap();
    assert_eq!(a.pixels, b.pixels);
}

#[test]
fn replay_matches_full_differentiation() {
    let camera = ball_camera(4);
    let grad_in = ramp(camera.film().size);
    let mut gradients = Vec::new();
    for name in ["prb_threepoint", "ad_threepoint"] {
        let mut scene = ball_scene(true);
        for key in PARAMS.iter() {
            scene.enable_grad(key).unwrap();
        }
        let integrator = integrator(name, &["max_depth=3", "rr_depth=2"]);
        integrator.render_backward(&mut scene, &camera, &grad_in, 9, 4).unwrap();
        gradients.push(PARAMS.map(|k| scene.grad(k).unwrap()));
    }
    for (i, key) in PARAMS.iter().enumerate() {
        assert_close(gradients[0][i], gradients[1][i], 1e-2, key);
    }
}

#[test]
fn forward_and_backward_are_adjoint() {
    let camera = ball_camera(2);
    let grad_in = ramp(camera.film().size);
    for name in ["prb_threepoint", "ad_threepoint"] {
        let integrator = integrator(name, &["max_depth=3"]);
        for key in ["ball.bsdf.reflectance.r", "lamp.scale"] {
            let mut scene = ball_scene(true);
            scene.enable_grad(key).unwrap();
            let forward = integrator.render_forward(&scene, &camera, &tangent(key), 21, 2).unwrap();
            integrator.render_backward(&mut scene, &camera, &grad_in, 21, 2).unwrap();
            assert_close(dot(&forward, &grad_in), scene.grad(key).unwrap(), 1e-2, key);
        }
    }
}

#[test]
fn emitter_scale_matches_finite_difference() {
    let camera = ball_camera(2);
    let integrator = integrator("prb_threepoint", &["max_depth=3"]);
    let mut scene = ball_scene(true);
    scene.enable_grad("lamp.scale").unwrap();
    let forward = integrator.render_forward(&scene, &camera, &tangent("lamp.scale"), 4, 2).unwrap();

    let h = 0.1;
    scene.set_param("lamp.scale", 1.0 + h).unwrap();
    let plus = integrator.render(&scene, &camera, 4, 2).unwrap();
    scene.set_param("lamp.scale", 1.0 - h).unwrap();
    let minus = integrator.render(&scene, &camera, 4, 2).unwrap();

    let fd = (plus.get(16, 16).average() - minus.get(16, 16).average()) / (2.0 * h);
    assert_close(forward.get(16, 16).average(), fd, 1e-2, "center pixel");
    let fd_sum = (plus.sum().average() - minus.sum().average()) / (2.0 * h);
    assert_close(forward.sum().average(), fd_sum, 1e-2, "image sum");
}

#[test]
fn delta_emitter_positions_can_be_detached() {
    let camera = ball_camera(1);
    for name in ["prb_threepoint", "ad_threepoint"] {
        let mut scene = ball_scene(false);
        scene.enable_grad("lamp.position.z").unwrap();

        let attached = integrator(name, &["max_depth=2", "delta_emitter_attached=true"]);
        let image = attached.render_forward(&scene, &camera, &tangent("lamp.position.z"), 1, 1).unwrap();
        assert!(!image.is_black(), "{}", name);

        let detached = integrator(name, &["max_depth=2", "delta_emitter_attached=false"]);
        let image = detached.render_forward(&scene, &camera, &tangent("lamp.position.z"), 1, 1).unwrap();
        assert!(image.is_black(), "{}", name);
    }
}

#[test]
fn moving_the_light_away_darkens_the_sphere() {
    let camera = ball_camera(1);
    let mut scene = ball_scene(false);
    scene.enable_grad("lamp.position.z").unwrap();
    let integrator = integrator("prb_threepoint", &["max_depth=2"]);
    let image = integrator.render_forward(&scene, &camera, &tangent("lamp.position.z"), 1, 1).unwrap();
    // I / d² with d = z - 1 gives -2 I / d³ times the diffuse factor.
    assert_close(image.get(16, 16)[0], -0.25, 0.02, "center pixel");
}

#[test]
fn differentiation_needs_enabled_parameters() {
    let mut scene = ball_scene(false);
    let camera = ball_camera(1);
    let integrator = integrator("prb_threepoint", &[]);
    assert!(matches!(
        integrator.render_forward(&scene, &camera, &HashMap::new(), 0, 1),
        Err(Error::NotAttached(_))
    ));
    let grad_in = Image::new(camera.film().size);
    assert!(matches!(
        integrator.render_backward(&mut scene, &camera, &grad_in, 0, 1),
        Err(Error::NotAttached(_))
    ));
}

#[test]
fn backward_checks_the_adjoint_size() {
    let mut scene = ball_scene(false);
    scene.enable_grad("lamp.scale").unwrap();
    let camera = ball_camera(1);
    let integrator = integrator("ad_threepoint", &[]);
    let grad_in = Image::new(Point2i::new(4, 4));
    assert!(matches!(
        integrator.render_backward(&mut scene, &camera, &grad_in, 0, 1),
        Err(Error::ImageSize(16, _))
    ));
}

#[test]
fn unknown_tangent_keys_are_rejected() {
    let mut scene = ball_scene(false);
    scene.enable_grad("lamp.scale").unwrap();
    let camera = ball_camera(1);
    let integrator = integrator("prb_threepoint", &[]);
    assert!(integrator
        .render_forward(&scene, &camera, &tangent("ball.radius"), 0, 1)
        .is_err());
}

#[test]
fn replay_consumes_all_radiance() {
    let mut scene = ball_scene(true);
    scene.enable_grad("ball.bsdf.reflectance.r").unwrap();
    let camera = ball_camera(1);
    for name in ["prb_threepoint", "prb_projective"] {
        let integrator = integrator(name, &["max_depth=5", "rr_depth=2"]);
        let mut sampler = IndependentSampler::new(1);
        let mut lit = 0;
        for i in 0..256_u64 {
            // Both passes see the same stream and the same primary ray.
            let mut trace = |mode: ADMode, state_in: Option<PathState>| {
                sampler.seed(3, i);
                let u = sampler.next_2d();
                let pos = Point2f::new(((i % 16) as Float + u.x) * 33.0 / 16.0, ((i / 16) as Float + u.y) * 33.0 / 16.0);
                let (ray, _) = camera.sample_ray(&pos);
                let mut tracker = GradientTracker::default();
                let mut ctx = SampleContext {
                    delta_l: SpectrumF::zero(),
                    state_in,
                    tracker: &mut tracker,
                };
                integrator.sample(mode, &scene, &camera, &mut sampler, &ray, &mut ctx)
            };
            let primal = trace(ADMode::Primal, None);
            let replay = trace(ADMode::Backward, Some(primal.state));

            let scale = primal.state.l.max_value().max(1.0);
            for c in 0..3 {
                assert!(
                    replay.state.l[c].abs() <= 1e-4 * scale,
                    "{}: sample {} keeps {:?} of {:?}",
                    name,
                    i,
                    replay.state.l,
                    primal.state.l
                );
            }
            if !primal.state.l.is_black() {
                lit += 1;
            }
        }
        assert!(lit > 100, "{}", name);
    }
}
