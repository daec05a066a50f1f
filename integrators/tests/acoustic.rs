mod common;

use cameras::*;
use common::*;
use integrators::*;
use lights::*;
use prb_core::emitter::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::pbrt::*;
use prb_core::scene::*;
use prb_core::shape::*;
use prb_core::spectrum::*;
use samplers::*;
use shapes::*;
use std::collections::HashMap;

const BINS: Int = 64;

/// Speaker and microphone one unit above a large floor; sound travels 0.1
/// units per bin.
const SETTINGS: [&str; 5] = [
    "max_depth=2",
    "speed_of_sound=10",
    "bin_width=0.01",
    "time_bins=64",
    "threads=2",
];

fn room() -> Scene {
    let shapes: Vec<Box<dyn Shape>> = vec![Box::new(Rectangle::new(
        "floor",
        Point3f::zero(),
        Vector3f::new(10.0, 0.0, 0.0),
        Vector3f::new(0.0, 10.0, 0.0),
        diffuse(0.5),
    ))];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(PointLight::new(
        "speaker",
        Point3f::new(0.0, 0.0, 1.0),
        SpectrumF::one(),
    ))];
    Scene::new(shapes, emitters).unwrap()
}

fn microphone(bins: Int, spp: usize) -> Receiver {
    Receiver::new(
        Point3f::new(0.0, 0.0, 1.0),
        film(bins, 1),
        Box::new(IndependentSampler::new(spp)),
    )
}

fn tangent(key: &str) -> HashMap<String, Float> {
    HashMap::from([(key.to_string(), 1.0)])
}

#[test]
fn nothing_arrives_before_the_first_echo() {
    let integrator = integrator("prb_acoustic", &SETTINGS);
    let histogram = integrator.render(&room(), &microphone(BINS, 32), 0, 32).unwrap();
    // The shortest echo travels two units.
    for bin in 0..20 {
        assert!(histogram.get(bin, 0).is_black(), "bin {}", bin);
    }
    assert!(histogram.sum().average() > 0.0);
    assert!(histogram.pixels.iter().all(|p| (0..3).all(|c| p[c] >= 0.0)));
}

#[test]
fn histogram_must_match_the_film() {
    let integrator = integrator("prb_acoustic", &SETTINGS);
    assert!(matches!(
        integrator.render(&room(), &microphone(32, 4), 0, 4),
        Err(Error::Config(..))
    ));
}

#[test]
fn energy_is_linear_in_the_source_scale() {
    let integrator = integrator("prb_acoustic", &SETTINGS);
    let receiver = microphone(BINS, 8);
    let mut scene = room();
    let histogram = integrator.render(&scene, &receiver, 5, 8).unwrap();

    scene.enable_grad("speaker.scale").unwrap();
    let forward = integrator
        .render_forward(&scene, &receiver, &tangent("speaker.scale"), 5, 8)
        .unwrap();
    for bin in 0..BINS {
        assert_close(forward.get(bin, 0)[1], histogram.get(bin, 0)[1], 1e-3, "bin");
    }

    let grad_in = Image::constant(Point2i::new(BINS, 1), SpectrumF::one());
    integrator.render_backward(&mut scene, &receiver, &grad_in, 5, 8).unwrap();
    let total = histogram.sum();
    assert_close(
        scene.grad("speaker.scale").unwrap(),
        total[0] + total[1] + total[2],
        1e-3,
        "speaker.scale",
    );
}

#[test]
fn single_bounce_energy_is_linear_in_the_reflectance() {
    let integrator = integrator("prb_acoustic", &SETTINGS);
    let receiver = microphone(BINS, 8);
    let mut scene = room();
    let histogram = integrator.render(&scene, &receiver, 2, 8).unwrap();

    scene.enable_grad("floor.bsdf.reflectance.r").unwrap();
    let grad_in = Image::constant(Point2i::new(BINS, 1), SpectrumF::one());
    integrator.render_backward(&mut scene, &receiver, &grad_in, 2, 8).unwrap();
    assert_close(
        scene.grad("floor.bsdf.reflectance.r").unwrap(),
        histogram.sum()[0] / 0.5,
        1e-3,
        "floor.bsdf.reflectance.r",
    );
}

#[test]
fn acoustic_gradients_need_enabled_parameters() {
    let integrator = integrator("prb_acoustic", &SETTINGS);
    let receiver = microphone(BINS, 1);
    assert!(matches!(
        integrator.render_forward(&room(), &receiver, &HashMap::new(), 0, 1),
        Err(Error::NotAttached(_))
    ));
}

#[test]
fn rays_start_at_the_receiver() {
    let acoustic = PRBAcousticIntegrator::try_from(&prb_core::paramset::ParamSet::new()).unwrap();
    let receiver = microphone(1000, 1);
    let mut sampler = IndependentSampler::new(1);
    prb_core::sampler::Sampler::seed(&mut sampler, 0, 0);
    for _ in 0..16 {
        let ray = acoustic.sample_rays(&receiver, &mut sampler);
        assert_eq!(ray.o, Point3f::new(0.0, 0.0, 1.0));
        assert!((ray.d.length() - 1.0).abs() < 1e-4);
    }
}
