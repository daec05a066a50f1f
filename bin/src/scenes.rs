//! Built-in scenes

use cameras::*;
use filters::*;
use lights::*;
use materials::*;
use prb_core::bsdf::*;
use prb_core::emitter::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::filter::*;
use prb_core::geometry::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::scene::*;
use prb_core::sensor::*;
use prb_core::shape::*;
use prb_core::spectrum::*;
use samplers::*;
use shapes::*;

/// Names of the built-in scenes.
pub const SCENE_NAMES: [&str; 3] = ["cornell", "occluder", "acoustic"];

/// A scene with the sensor that observes it.
pub type SceneSetup = (Scene, Box<dyn Sensor>);

fn diffuse(r: Float, g: Float, b: Float) -> Box<dyn BSDF> {
    Box::new(Diffuse::new(SpectrumF::new(r, g, b)))
}

fn grey(v: Float) -> Box<dyn BSDF> {
    diffuse(v, v, v)
}

fn rect(id: &str, center: (Float, Float, Float), u: (Float, Float, Float), v: (Float, Float, Float), bsdf: Box<dyn BSDF>) -> Box<dyn Shape> {
    Box::new(Rectangle::new(
        id,
        Point3f::new(center.0, center.1, center.2),
        Vector3f::new(u.0, u.1, u.2),
        Vector3f::new(v.0, v.1, v.2),
        bsdf,
    ))
}

/// Builds a built-in scene.
///
/// * `name`   - Scene name.
/// * `params` - Integrator parameters; the acoustic scene reads `time_bins`.
/// * `spp`    - Samples per pixel of the sampler.
pub fn build(name: &str, params: &ParamSet, spp: usize) -> Result<SceneSetup> {
    let sampler = Box::new(IndependentSampler::new(spp));
    match name {
        "cornell" => cornell(create_filter("gaussian", &ParamSet::new())?, sampler),
        "occluder" => occluder(create_filter("gaussian", &ParamSet::new())?, sampler),
        "acoustic" => {
            let bins = params.find_one_int("time_bins", 1000);
            acoustic(bins, sampler)
        }
        _ => Err(Error::Config(
            "scene".to_string(),
            format!("'{}' (expected one of {})", name, SCENE_NAMES.join(", ")),
        )),
    }
}

/// The Cornell box with a diffuse and a mirror sphere. The light is a small
/// square just below the ceiling.
fn cornell(filter: ArcFilter, sampler: Box<IndependentSampler>) -> Result<SceneSetup> {
    let shapes: Vec<Box<dyn Shape>> = vec![
        rect("floor", (0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, -1.0), grey(0.75)),
        rect("ceiling", (0.0, 2.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, 1.0), grey(0.75)),
        rect("back_wall", (0.0, 1.0, -1.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0), grey(0.75)),
        rect("left_wall", (-1.0, 1.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 1.0), diffuse(0.63, 0.07, 0.05)),
        rect("right_wall", (1.0, 1.0, 0.0), (0.0, 0.0, 1.0), (0.0, 1.0, 0.0), diffuse(0.14, 0.45, 0.09)),
        rect("light", (0.0, 1.99, 0.0), (0.25, 0.0, 0.0), (0.0, 0.0, 0.25), grey(0.0)),
        Box::new(Sphere::new("ball", Point3f::new(-0.4, 0.35, -0.3), 0.35, grey(0.6))),
        Box::new(Sphere::new(
            "mirror_ball",
            Point3f::new(0.45, 0.3, 0.3),
            0.3,
            Box::new(Conductor::new(SpectrumF::splat(0.9))),
        )),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(AreaLight::new("ceiling_light", 5, SpectrumF::splat(15.0)))];
    let scene = Scene::new(shapes, emitters)?;

    let film = Film::new(Point2i::new(128, 128), filter);
    let camera = PerspectiveCamera::new(
        Point3f::new(0.0, 1.0, 3.4),
        Point3f::new(0.0, 1.0, 0.0),
        Vector3f::new(0.0, 1.0, 0.0),
        40.0,
        film,
        sampler,
    )?;
    let sensor: Box<dyn Sensor> = Box::new(camera);
    Ok((scene, sensor))
}

/// A thin blocker in front of an emissive wall, for visibility derivatives
/// of `blocker.center.x`.
fn occluder(filter: ArcFilter, sampler: Box<IndependentSampler>) -> Result<SceneSetup> {
    let shapes: Vec<Box<dyn Shape>> = vec![
        rect("wall", (0.0, 0.0, -2.0), (2.0, 0.0, 0.0), (0.0, 2.0, 0.0), grey(0.0)),
        rect("blocker", (0.6, 0.0, 0.0), (0.5, 0.0, 0.0), (0.0, 2.0, 0.0), grey(0.5)),
        Box::new(Sphere::new("ball", Point3f::new(-0.8, 0.5, 0.5), 0.3, grey(0.5))),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![
        Box::new(AreaLight::new("wall_light", 0, SpectrumF::one())),
        Box::new(PointLight::new("lamp", Point3f::new(0.0, 0.0, 4.0), SpectrumF::splat(10.0))),
    ];
    let scene = Scene::new(shapes, emitters)?;

    let film = Film::new(Point2i::new(96, 96), filter);
    let camera = PerspectiveCamera::new(
        Point3f::new(0.0, 0.0, 5.0),
        Point3f::zero(),
        Vector3f::new(0.0, 1.0, 0.0),
        40.0,
        film,
        sampler,
    )?;
    let sensor: Box<dyn Sensor> = Box::new(camera);
    Ok((scene, sensor))
}

/// A shoebox room with a speaker and a microphone.
fn acoustic(bins: Int, sampler: Box<IndependentSampler>) -> Result<SceneSetup> {
    if bins < 1 {
        return Err(Error::Config("time_bins".to_string(), format!("{}", bins)));
    }
    let shapes: Vec<Box<dyn Shape>> = vec![
        rect("floor", (0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 0.0, -2.5), grey(0.7)),
        rect("ceiling", (0.0, 3.0, 0.0), (2.0, 0.0, 0.0), (0.0, 0.0, 2.5), grey(0.7)),
        rect("back_wall", (0.0, 1.5, -2.5), (2.0, 0.0, 0.0), (0.0, 1.5, 0.0), grey(0.7)),
        rect("front_wall", (0.0, 1.5, 2.5), (0.0, 1.5, 0.0), (2.0, 0.0, 0.0), grey(0.7)),
        rect("left_wall", (-2.0, 1.5, 0.0), (0.0, 1.5, 0.0), (0.0, 0.0, 2.5), grey(0.7)),
        rect("right_wall", (2.0, 1.5, 0.0), (0.0, 0.0, 2.5), (0.0, 1.5, 0.0), grey(0.7)),
    ];
    let emitters: Vec<Box<dyn Emitter>> = vec![Box::new(PointLight::new(
        "speaker",
        Point3f::new(1.0, 1.5, 1.0),
        SpectrumF::one(),
    ))];
    let scene = Scene::new(shapes, emitters)?;

    let film = Film::new(Point2i::new(bins, 1), std::sync::Arc::new(BoxFilter::new(0.5)));
    let receiver = Receiver::new(Point3f::new(-1.0, 1.2, -1.0), film, sampler);
    let sensor: Box<dyn Sensor> = Box::new(receiver);
    Ok((scene, sensor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_every_scene() {
        let params = ParamSet::new();
        for name in SCENE_NAMES.iter() {
            let (scene, sensor) = build(name, &params, 1).unwrap();
            assert!(!scene.shapes.is_empty());
            assert!(sensor.film().pixel_count() > 0);
        }
        assert!(build("sponza", &params, 1).is_err());
    }

    #[test]
    fn acoustic_film_follows_time_bins() {
        let mut params = ParamSet::new();
        params.add_int("time_bins", &[250]);
        let (_, sensor) = build("acoustic", &params, 1).unwrap();
        assert_eq!(sensor.film().size, Point2i::new(250, 1));
    }
}
