//! Scene builders shared by the integration tests.

#![allow(dead_code)]

use cameras::*;
use filters::*;
use integrators::*;
use lights::*;
use materials::*;
use prb_core::bsdf::*;
use prb_core::emitter::*;
use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::integrator::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::scene::*;
use prb_core::sensor::*;
use prb_core::shape::*;
use prb_core::spectrum::*;
use samplers::*;
use shapes::*;
use std::sync::Arc;

pub fn diffuse(r: Float) -> Box<dyn BSDF> {
    Box::new(Diffuse::new(SpectrumF::splat(r)))
}

pub fn film(width: Int, height: Int) -> Film {
    Film::new(Point2i::new(width, height), Arc::new(BoxFilter::new(0.5)))
}

pub fn camera(origin: Point3f, target: Point3f, up: Vector3f, fov: Float, size: Int, spp: usize) -> PerspectiveCamera {
    PerspectiveCamera::new(
        origin,
        target,
        up,
        fov,
        film(size, size),
        Box::new(IndependentSampler::new(spp)),
    )
    .unwrap()
}

pub fn integrator(name: &str, assignments: &[&str]) -> Box<dyn ADIntegrator> {
    let mut params = ParamSet::new();
    for a in assignments {
        params.add_assignment(a).unwrap();
    }
    create_integrator(name, &params).unwrap()
}

/// Unit diffuse sphere at the origin lit by a point light at the camera.
/// With `backdrop` an emissive rectangle at `z = -3` fills the background.
pub fn ball_scene(backdrop: bool) -> Scene {
    let mut shapes: Vec<Box<dyn Shape>> = vec![Box::new(Sphere::new("ball", Point3f::zero(), 1.0, diffuse(0.5)))];
    let mut emitters: Vec<Box<dyn Emitter>> = vec![Box::new(PointLight::new(
        "lamp",
        Point3f::new(0.0, 0.0, 5.0),
        SpectrumF::splat(16.0 * PI),
    ))];
    if backdrop {
        shapes.push(Box::new(Rectangle::new(
            "backdrop",
            Point3f::new(0.0, 0.0, -3.0),
            Vector3f::new(3.0, 0.0, 0.0),
            Vector3f::new(0.0, 3.0, 0.0),
            diffuse(0.0),
        )));
        emitters.push(Box::new(AreaLight::new("backdrop_light", 1, SpectrumF::splat(2.0))));
    }
    Scene::new(shapes, emitters).unwrap()
}

pub fn ball_camera(spp: usize) -> PerspectiveCamera {
    camera(
        Point3f::new(0.0, 0.0, 5.0),
        Point3f::zero(),
        Vector3f::new(0.0, 1.0, 0.0),
        30.0,
        33,
        spp,
    )
}

/// An unlit blocker covering `x` in `[0.1, 1.1]` in front of an emissive
/// wall, seen head on from `z = 5`.
pub fn blocker_scene() -> Scene {
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Rectangle::new(
            "wall",
            Point3f::new(0.0, 0.0, -2.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
            diffuse(0.0),
        )),
        Box::new(Rectangle::new(
            "blocker",
            Point3f::new(0.6, 0.0, 0.0),
            Vector3f::new(0.5, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
            diffuse(0.5),
        )),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(AreaLight::new("wall_light", 0, SpectrumF::one()))];
    Scene::new(shapes, emitters).unwrap()
}

pub fn blocker_camera(spp: usize) -> PerspectiveCamera {
    camera(
        Point3f::new(0.0, 0.0, 5.0),
        Point3f::zero(),
        Vector3f::new(0.0, 1.0, 0.0),
        40.0,
        32,
        spp,
    )
}

/// A black sphere of radius 0.7 centered at `(cx, 0, 0)` in front of the
/// emissive wall of `blocker_scene`; seen through `blocker_camera` its
/// silhouette lies entirely on the wall.
pub fn ball_on_wall_scene(cx: Float) -> Scene {
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Rectangle::new(
            "wall",
            Point3f::new(0.0, 0.0, -2.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
            diffuse(0.0),
        )),
        Box::new(Sphere::new("ball", Point3f::new(cx, 0.0, 0.0), 0.7, diffuse(0.0))),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(AreaLight::new("wall_light", 0, SpectrumF::one()))];
    Scene::new(shapes, emitters).unwrap()
}

/// A floor lit from above by a small area light; a horizontal occluder at
/// `z = 2` with its left edge at `x = 0.5` casts a shadow whose penumbra
/// spans `x` in `[0.5, 1.5]`.
pub fn shadow_scene() -> Scene {
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Rectangle::new(
            "floor",
            Point3f::zero(),
            Vector3f::new(3.0, 0.0, 0.0),
            Vector3f::new(0.0, 3.0, 0.0),
            diffuse(0.8),
        )),
        Box::new(Rectangle::new(
            "light",
            Point3f::new(0.0, 0.0, 4.0),
            Vector3f::new(0.5, 0.0, 0.0),
            Vector3f::new(0.0, -0.5, 0.0),
            diffuse(0.0),
        )),
        Box::new(Rectangle::new(
            "occluder",
            Point3f::new(1.5, 0.0, 2.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
            diffuse(0.5),
        )),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(AreaLight::new("light", 1, SpectrumF::splat(20.0)))];
    Scene::new(shapes, emitters).unwrap()
}

/// Looks at the penumbra from below the occluder.
pub fn shadow_camera(spp: usize) -> PerspectiveCamera {
    camera(
        Point3f::new(1.0, -5.0, 1.5),
        Point3f::new(1.0, 0.0, 0.0),
        Vector3f::new(0.0, 0.0, 1.0),
        60.0,
        24,
        spp,
    )
}

/// Looks straight down on the lit floor of `shadow_scene` from between the
/// floor and the occluder, so the occluder only shows through its shadow.
/// The view covers `x` in `[0, 2]`.
pub fn penumbra_camera(spp: usize) -> PerspectiveCamera {
    camera(
        Point3f::new(1.0, 0.0, 1.0),
        Point3f::new(1.0, 0.0, 0.0),
        Vector3f::new(0.0, 1.0, 0.0),
        90.0,
        16,
        spp,
    )
}

/// Central difference of the primal image with respect to one scene
/// parameter. The parameter is restored afterwards.
#[allow(clippy::too_many_arguments)]
pub fn finite_difference(
    integrator: &dyn ADIntegrator,
    scene: &mut Scene,
    sensor: &dyn Sensor,
    key: &str,
    value: Float,
    h: Float,
    seed: u64,
    spp: usize,
) -> Image {
    scene.set_param(key, value + h).unwrap();
    let plus = integrator.render(scene, sensor, seed, spp).unwrap();
    scene.set_param(key, value - h).unwrap();
    let minus = integrator.render(scene, sensor, seed, spp).unwrap();
    scene.set_param(key, value).unwrap();
    let pixels = plus
        .pixels
        .iter()
        .zip(minus.pixels.iter())
        .map(|(p, m)| (*p - *m) / (2.0 * h))
        .collect();
    Image::from_pixels(plus.size, pixels)
}

/// Sums of the channel averages left of column `split` and from `split` on.
pub fn half_sums(image: &Image, split: Int) -> (Float, Float) {
    let left = (0..split).map(|x| column_sum(image, x)).sum();
    let right = (split..image.size.x).map(|x| column_sum(image, x)).sum();
    (left, right)
}

/// Sum of the channel averages over a pixel column.
pub fn column_sum(image: &Image, x: Int) -> Float {
    (0..image.size.y).map(|y| image.get(x, y).average()).sum()
}

/// Asserts two values agree to a relative tolerance.
pub fn assert_close(a: Float, b: Float, rel: Float, what: &str) {
    let scale = a.abs().max(b.abs()).max(1e-4);
    assert!((a - b).abs() <= rel * scale, "{}: {} vs {}", what, a, b);
}
