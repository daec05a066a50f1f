mod common;

use common::*;
use prb_core::film::*;
use prb_core::pbrt::*;
use prb_core::sensor::*;
use prb_core::spectrum::*;
use std::collections::HashMap;

fn shift_x(key: &str) -> HashMap<String, Float> {
    HashMap::from([(key.to_string(), 1.0)])
}

#[test]
fn primary_silhouettes_follow_the_blocker() {
    let mut scene = blocker_scene();
    scene.enable_grad("blocker.center.x").unwrap();
    let camera = blocker_camera(4);
    let integrator = integrator("prb_projective", &["max_depth=2", "sppi=0", "guiding=none"]);
    let image = integrator
        .render_forward(&scene, &camera, &shift_x("blocker.center.x"), 2, 4)
        .unwrap();

    // The wall is uncovered behind the left edge and covered behind the
    // right one.
    assert!(column_sum(&image, 16) > 0.0);
    assert!(column_sum(&image, 25) < 0.0);
    for x in [5, 10, 20, 30] {
        assert_eq!(column_sum(&image, x), 0.0);
    }
}

#[test]
fn primary_silhouette_gradient_matches_edge_length() {
    let mut scene = blocker_scene();
    scene.enable_grad("blocker.center.x").unwrap();
    let camera = blocker_camera(16);
    let integrator = integrator("prb_projective", &["max_depth=2", "sppi=0", "sppp=64", "guiding=none"]);
    let image = integrator
        .render_forward(&scene, &camera, &shift_x("blocker.center.x"), 8, 16)
        .unwrap();

    // Sliding the blocker by dx uncovers a strip of the wall dx wide on the
    // left and covers one on the right, so the two edges cancel and each
    // moves one unit of radiance times its projected length per pixel.
    let left = column_sum(&image, 16);
    let right = column_sum(&image, 25);
    assert_close(left, -right, 0.25, "edge balance");
}

#[test]
fn no_boundary_samples_means_no_visibility_gradient() {
    let mut scene = blocker_scene();
    scene.enable_grad("blocker.center.x").unwrap();
    let camera = blocker_camera(2);
    let integrator = integrator("prb_projective", &["max_depth=3", "sppp=0", "sppi=0"]);
    let image = integrator
        .render_forward(&scene, &camera, &shift_x("blocker.center.x"), 0, 2)
        .unwrap();
    assert!(image.is_black());

    let grad_in = Image::constant(camera.film().size, SpectrumF::one());
    integrator.render_backward(&mut scene, &camera, &grad_in, 0, 2).unwrap();
    assert_eq!(scene.grad("blocker.center.x"), Some(0.0));
}

#[test]
fn primary_forward_and_backward_agree() {
    let camera = blocker_camera(4);
    let integrator = integrator("prb_projective", &["max_depth=2", "sppi=0", "guiding=none"]);
    let grad_in = Image::constant(camera.film().size, SpectrumF::one());

    let mut scene = blocker_scene();
    scene.enable_grad("blocker.center.x").unwrap();
    let forward = integrator
        .render_forward(&scene, &camera, &shift_x("blocker.center.x"), 6, 4)
        .unwrap();
    integrator.render_backward(&mut scene, &camera, &grad_in, 6, 4).unwrap();

    let total: Float = forward.pixels.iter().map(|p| p[0] + p[1] + p[2]).sum();
    assert_close(total, scene.grad("blocker.center.x").unwrap(), 1e-2, "blocker.center.x");
}

fn shadow_gradient(assignments: &[&str]) -> Image {
    let mut scene = shadow_scene();
    scene.enable_grad("occluder.center.x").unwrap();
    let camera = shadow_camera(4);
    let integrator = integrator("prb_projective", assignments);
    integrator
        .render_forward(&scene, &camera, &shift_x("occluder.center.x"), 13, 4)
        .unwrap()
}

#[test]
fn indirect_silhouettes_brighten_the_penumbra() {
    let image = shadow_gradient(&["max_depth=3", "sppc=0", "sppp=0", "sppi=64", "guiding=none"]);
    assert!(image.sum().average() > 0.0);
    assert!(image.pixels.iter().all(|p| !p.has_nans()));
}

#[test]
fn grid_guiding_keeps_the_sign() {
    let image = shadow_gradient(&[
        "max_depth=3",
        "sppc=0",
        "sppp=0",
        "sppi=16",
        "guiding=grid",
        "guiding_proj=false",
        "grid_resolution=4",
        "extra_samples=64",
    ]);
    assert!(image.sum().average() > 0.0);
}

#[test]
fn octree_guiding_keeps_the_sign() {
    let image = shadow_gradient(&[
        "max_depth=3",
        "sppc=0",
        "sppp=0",
        "sppi=16",
        "guiding=octree",
        "guiding_proj=false",
        "guiding_samples=16384",
        "extra_samples=8",
    ]);
    assert!(image.sum().average() > 0.0);
}

#[test]
fn continuous_part_ignores_rigid_motion_of_flat_shapes() {
    let image = shadow_gradient(&["max_depth=3", "sppp=0", "sppi=0"]);
    assert!(image.is_black());
}

#[test]
fn primal_matches_three_point() {
    let scene = shadow_scene();
    let camera = shadow_camera(2);
    let projective = integrator("prb_projective", &["max_depth=3"]);
    let threepoint = integrator("prb_threepoint", &["max_depth=3"]);
    let a = projective.render(&scene, &camera, 1, 2).unwrap();
    let b = threepoint.render(&scene, &camera, 1, 2).unwrap();
    assert_close(a.sum().average(), b.sum().average(), 1e-3, "image sum");
}

#[test]
fn invalid_settings_are_rejected() {
    let mut params = prb_core::paramset::ParamSet::new();
    params.add_assignment("guiding=kdtree").unwrap();
    assert!(integrators::create_integrator("prb_projective", &params).is_err());

    let mut params = prb_core::paramset::ParamSet::new();
    params.add_assignment("sppp=-3").unwrap();
    assert!(integrators::create_integrator("prb_projective", &params).is_err());

    let params = prb_core::paramset::ParamSet::new();
    assert!(integrators::create_integrator("prb_volpath", &params).is_err());
}

/// Silhouette derivative of an off-center sphere against finite differences,
/// on each side of its projected center.
fn check_off_axis_ball(cx: Float, split: Int) {
    let camera = blocker_camera(64);
    let integrator = integrator("prb_projective", &["max_depth=2", "sppc=0", "sppi=0", "sppp=64", "guiding=none"]);

    let mut scene = ball_on_wall_scene(cx);
    scene.enable_grad("ball.center.x").unwrap();
    let gradient = integrator
        .render_forward(&scene, &camera, &shift_x("ball.center.x"), 17, 64)
        .unwrap();
    let fd = finite_difference(integrator.as_ref(), &mut scene, &camera, "ball.center.x", cx, 0.1, 17, 64);

    let (left, right) = half_sums(&gradient, split);
    let (fd_left, fd_right) = half_sums(&fd, split);
    assert!(fd_left > 0.0 && fd_right < 0.0);
    assert_close(left, fd_left, 0.1, "left silhouette");
    assert_close(right, fd_right, 0.1, "right silhouette");
}

#[test]
fn off_axis_sphere_silhouette_matches_finite_difference() {
    // The center projects to column 16 + 0.3 * 43.96 / 5, about 18.6.
    check_off_axis_ball(0.3, 19);
}

#[test]
fn centered_sphere_silhouette_matches_finite_difference() {
    check_off_axis_ball(0.0, 16);
}

/// Penumbra gradient of the occluder's left edge against finite differences
/// seen from `penumbra_camera`. Only visibility between the floor and the
/// light depends on the occluder.
fn check_penumbra(assignments: &[&str]) {
    let camera = penumbra_camera(64);
    let mut settings = vec!["max_depth=2", "sppc=0", "sppp=0"];
    settings.extend_from_slice(assignments);
    let integrator = integrator("prb_projective", &settings);

    let mut scene = shadow_scene();
    scene.enable_grad("occluder.center.x").unwrap();
    let gradient = integrator
        .render_forward(&scene, &camera, &shift_x("occluder.center.x"), 29, 64)
        .unwrap();
    let fd = finite_difference(integrator.as_ref(), &mut scene, &camera, "occluder.center.x", 1.5, 0.05, 29, 64);

    let expected = fd.sum().average();
    assert!(expected > 0.0);
    assert_close(gradient.sum().average(), expected, 0.3, "penumbra");
}

#[test]
fn unguided_penumbra_matches_finite_difference() {
    check_penumbra(&["sppi=1024", "guiding=none"]);
}

#[test]
fn grid_guided_penumbra_matches_finite_difference() {
    check_penumbra(&[
        "sppi=256",
        "guiding=grid",
        "guiding_proj=false",
        "grid_resolution=4",
        "extra_samples=512",
    ]);
}

#[test]
fn octree_guided_penumbra_matches_finite_difference() {
    check_penumbra(&[
        "sppi=256",
        "guiding=octree",
        "guiding_proj=false",
        "guiding_samples=65536",
        "extra_samples=256",
    ]);
}
