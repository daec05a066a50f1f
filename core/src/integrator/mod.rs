//! Integrator

mod common;
mod reparam;

use crate::ad::*;
use crate::error::*;
use crate::film::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;
use crate::sampler::*;
use crate::scene::*;
use crate::sensor::*;
use crate::spectrum::*;
use std::collections::HashMap;

// Re-export.
pub use common::*;
pub use reparam::*;

/// State threaded from the primal pass into the differential pass so the
/// random walk can be replayed without storing its history.
#[derive(Copy, Clone, Debug, Default)]
pub struct PathState {
    /// Primal radiance of the path.
    pub l: SpectrumF,

    /// First preliminary intersection of the path.
    pub pi: PreliminaryIntersection,
}

/// Inputs of one call to `ADIntegrator::sample`.
pub struct SampleContext<'a> {
    /// Adjoint radiance of the sample (backward mode).
    pub delta_l: SpectrumF,

    /// State produced by the primal pass (differential modes).
    pub state_in: Option<PathState>,

    /// Receives derivatives in the differential modes.
    pub tracker: &'a mut GradientTracker,
}

/// Output of one call to `ADIntegrator::sample`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SampleResult {
    /// Primal radiance, or its tangent in forward mode.
    pub l: SpectrumF,

    /// Whether the primary ray hit something.
    pub valid: bool,

    /// State to hand to the differential pass.
    pub state: PathState,

    /// Raster position attached to the scene parameters, for integrators
    /// that make the primary vertex follow the geometry.
    pub pos: Option<Point2r>,
}

/// Per-tile output of a primal pass.
pub struct PrimalTile {
    /// Path states in sample order.
    pub states: Vec<PathState>,

    /// Splatted primal radiance.
    pub block: ImageBlock,
}

/// Interface of the differentiable integrators. Implementations provide the
/// per-sample random walk; rendering in the three modes is provided on top
/// of it.
pub trait ADIntegrator: Send + Sync {
    /// Returns the integrator type for debugging.
    fn get_type(&self) -> &'static str;

    /// Returns the shared configuration.
    fn config(&self) -> &IntegratorConfig;

    /// Traces one path.
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
    ) -> SampleResult;

    /// Returns `true` when `sample` reports attached splat positions.
    fn attached_positions(&self) -> bool {
        false
    }

    /// Returns the samples per pixel used for the continuous derivative
    /// passes.
    ///
    /// * `spp` - Requested samples per pixel.
    fn continuous_spp(&self, spp: usize) -> usize {
        spp
    }

    /// Estimates derivatives caused by visibility discontinuities. Forward
    /// mode returns an unnormalized block to add to the film; backward mode
    /// accumulates into `tracker`.
    ///
    /// * `mode`    - `Forward` or `Backward`.
    /// * `scene`   - The scene.
    /// * `sensor`  - The sensor.
    /// * `seed`    - Seed of the render call.
    /// * `spp`     - Requested samples per pixel.
    /// * `grad_in` - Adjoint of the developed image (backward mode).
    /// * `tracker` - Gradient tracker of the render call.
    fn render_discontinuities(
        &self,
        _mode: ADMode,
        _scene: &Scene,
        _sensor: &dyn Sensor,
        _seed: u64,
        _spp: usize,
        _grad_in: Option<&Image>,
        _tracker: &mut GradientTracker,
    ) -> Result<Option<ImageBlock>> {
        Ok(None)
    }

    /// Renders the scene.
    ///
    /// * `scene`  - The scene.
    /// * `sensor` - The sensor.
    /// * `seed`   - Seed of the sampler streams.
    /// * `spp`    - Samples per pixel; zero selects the sampler default.
    fn render(&self, scene: &Scene, sensor: &dyn Sensor, seed: u64, spp: usize) -> Result<Image> {
        let spp = resolve_spp(sensor, spp);
        info!("{}: rendering {} spp", self.get_type(), spp);
        let film = sensor.film();
        film.clear();
        if spp > 0 {
            for tile in self.primal_pass(scene, sensor, seed, spp)? {
                film.put_block(&tile.block);
            }
        }
        Ok(film.develop())
    }

    /// Renders the directional derivative of the image along the given
    /// parameter tangents.
    ///
    /// * `scene`    - The scene.
    /// * `sensor`   - The sensor.
    /// * `tangents` - Tangent per enabled parameter key.
    /// * `seed`     - Seed of the sampler streams.
    /// * `spp`      - Samples per pixel; zero selects the sampler default.
    fn render_forward(
        &self,
        scene: &Scene,
        sensor: &dyn Sensor,
        tangents: &HashMap<String, Float>,
        seed: u64,
        spp: usize,
    ) -> Result<Image> {
        if scene.num_enabled() == 0 {
            return Err(Error::NotAttached("forward"));
        }
        let slot_tangents = scene.tangents(tangents)?;
        self.check_filter(sensor);
        let spp = resolve_spp(sensor, spp);
        let spp_c = self.continuous_spp(spp);
        let film = sensor.film();
        film.clear();

        let mut attached_seen = false;
        if spp_c > 0 {
            let primal_tiles = self.primal_pass(scene, sensor, seed, spp_c)?;
            let primal = merge_blocks(film, &primal_tiles);
            let tiles = film.bounds().tiles(self.config().tile_size);

            let results = parallel_for(tiles.len(), self.config().threads, "Forward", |t| {
                let mut sampler = sensor.sampler().clone_sampler();
                let mut tracker = GradientTracker::with_tangents(slot_tangents);
                let mut block = film.create_block(true);
                let states = &primal_tiles[t].states;
                for (k, (pixel, index)) in sample_indices(film, &tiles[t], spp_c).enumerate() {
                    sampler.seed(seed, index);
                    let pos = pixel_sample_position(&pixel, sampler.as_mut());
                    let (ray, weight) = sensor.sample_ray(&pos);
                    let mut ctx = SampleContext {
                        delta_l: SpectrumF::zero(),
                        state_in: Some(states[k]),
                        tracker: &mut tracker,
                    };
                    let r = self.sample(ADMode::Forward, scene, sensor, sampler.as_mut(), &ray, &mut ctx);
                    match r.pos {
                        Some(pos_attached) => {
                            let dpos = Vector2f::new(
                                tracker.forward_scalar(&pos_attached.x),
                                tracker.forward_scalar(&pos_attached.y),
                            );
                            block.put_tangent(&pos, &dpos, &(r.l * weight), &(states[k].l * weight), &primal);
                        }
                        None => block.put(&pos, &(r.l * weight)),
                    }
                }
                (block, tracker.attached_seen)
            });

            for (block, seen) in results.iter() {
                film.put_block(block);
                attached_seen |= seen;
            }
        }

        let mut tracker = GradientTracker::with_tangents(slot_tangents);
        if let Some(block) =
            self.render_discontinuities(ADMode::Forward, scene, sensor, seed, spp, None, &mut tracker)?
        {
            film.put_block(&block);
        }
        attached_seen |= tracker.attached_seen;

        if !attached_seen {
            warn!("{}: forward pass found no attached contribution", self.get_type());
        }
        Ok(film.develop())
    }

    /// Propagates the adjoint of the developed image to the enabled scene
    /// parameters; gradients are accumulated in the scene.
    ///
    /// * `scene`   - The scene.
    /// * `sensor`  - The sensor.
    /// * `grad_in` - Adjoint of the developed image.
    /// * `seed`    - Seed of the sampler streams.
    /// * `spp`     - Samples per pixel; zero selects the sampler default.
    fn render_backward(
        &self,
        scene: &mut Scene,
        sensor: &dyn Sensor,
        grad_in: &Image,
        seed: u64,
        spp: usize,
    ) -> Result<()> {
        let film = sensor.film();
        if grad_in.pixels.len() != film.pixel_count() {
            return Err(Error::ImageSize(grad_in.pixels.len(), film.pixel_count()));
        }
        if scene.num_enabled() == 0 {
            return Err(Error::NotAttached("backward"));
        }
        self.check_filter(sensor);
        let spp = resolve_spp(sensor, spp);
        let spp_c = self.continuous_spp(spp);

        let mut tracker = GradientTracker::default();
        {
            let scene: &Scene = scene;
            if spp_c > 0 {
                let primal_tiles = self.primal_pass(scene, sensor, seed, spp_c)?;
                let primal = merge_blocks(film, &primal_tiles);
                let tiles = film.bounds().tiles(self.config().tile_size);

                let trackers = parallel_for(tiles.len(), self.config().threads, "Backward", |t| {
                    let mut sampler = sensor.sampler().clone_sampler();
                    let mut tracker = GradientTracker::default();
                    let states = &primal_tiles[t].states;
                    for (k, (pixel, index)) in sample_indices(film, &tiles[t], spp_c).enumerate() {
                        sampler.seed(seed, index);
                        let pos = pixel_sample_position(&pixel, sampler.as_mut());
                        let (ray, weight) = sensor.sample_ray(&pos);
                        let delta_l = primal.adjoint(&pos, grad_in) * weight;
                        let mut ctx = SampleContext {
                            delta_l,
                            state_in: Some(states[k]),
                            tracker: &mut tracker,
                        };
                        let r = self.sample(ADMode::Backward, scene, sensor, sampler.as_mut(), &ray, &mut ctx);
                        if let Some(pos_attached) = r.pos {
                            primal.backward_position(&mut tracker, &pos_attached, &(states[k].l * weight), grad_in);
                        }
                    }
                    tracker
                });

                for t in trackers.iter() {
                    tracker.merge(t);
                }
            }

            self.render_discontinuities(ADMode::Backward, scene, sensor, seed, spp, Some(grad_in), &mut tracker)?;
        }

        if !tracker.attached_seen {
            warn!("{}: backward pass found no attached contribution", self.get_type());
        }
        scene.accumulate_grad(&tracker);
        Ok(())
    }

    /// Warns when the splat position is attached but the reconstruction
    /// filter has no derivative.
    ///
    /// * `sensor` - The sensor.
    #[doc(hidden)]
    fn check_filter(&self, sensor: &dyn Sensor) {
        let filter = &sensor.film().filter;
        if self.attached_positions() && !filter.is_differentiable() {
            warn!(
                "{}: the '{}' filter is not differentiable; pixel position derivatives are ignored",
                self.get_type(),
                filter.get_type()
            );
        }
    }

    /// Runs the primal pass tile by tile and keeps the path states for a
    /// later replay.
    ///
    /// * `scene`  - The scene.
    /// * `sensor` - The sensor.
    /// * `seed`   - Seed of the sampler streams.
    /// * `spp`    - Samples per pixel.
    #[doc(hidden)]
    fn primal_pass(&self, scene: &Scene, sensor: &dyn Sensor, seed: u64, spp: usize) -> Result<Vec<PrimalTile>> {
        let film = sensor.film();
        check_wavefront(film.pixel_count() as u64 * spp as u64)?;
        let tiles = film.bounds().tiles(self.config().tile_size);

        Ok(parallel_for(tiles.len(), self.config().threads, "Primal", |t| {
            let mut sampler = sensor.sampler().clone_sampler();
            let mut tracker = GradientTracker::default();
            let mut block = film.create_block(true);
            let mut states = Vec::with_capacity(tiles[t].area() * spp);
            for (pixel, index) in sample_indices(film, &tiles[t], spp) {
                sampler.seed(seed, index);
                let pos = pixel_sample_position(&pixel, sampler.as_mut());
                let (ray, weight) = sensor.sample_ray(&pos);
                let mut ctx = SampleContext {
                    delta_l: SpectrumF::zero(),
                    state_in: None,
                    tracker: &mut tracker,
                };
                let r = self.sample(ADMode::Primal, scene, sensor, sampler.as_mut(), &ray, &mut ctx);
                block.put(&pos, &(r.l * weight));
                states.push(r.state);
            }
            PrimalTile { states, block }
        }))
    }
}

/// Returns `spp`, or the sampler default when it is zero.
///
/// * `sensor` - The sensor.
/// * `spp`    - Requested samples per pixel.
pub fn resolve_spp(sensor: &dyn Sensor, spp: usize) -> usize {
    if spp == 0 {
        sensor.sampler().sample_count()
    } else {
        spp
    }
}

/// Iterates the samples of a tile as `(pixel, global sample index)`.
///
/// * `film` - The film.
/// * `tile` - The tile.
/// * `spp`  - Samples per pixel.
pub fn sample_indices<'a>(film: &'a Film, tile: &Bounds2i, spp: usize) -> impl Iterator<Item = (Point2i, u64)> + 'a {
    let width = film.size.x as u64;
    tile.pixels().flat_map(move |p| {
        let base = (p.y as u64 * width + p.x as u64) * spp as u64;
        (0..spp as u64).map(move |s| (p, base + s))
    })
}

/// Returns a jittered raster position inside a pixel.
///
/// * `pixel`   - The pixel.
/// * `sampler` - The sampler.
pub fn pixel_sample_position(pixel: &Point2i, sampler: &mut dyn Sampler) -> Point2f {
    let u = sampler.next_2d();
    Point2f::new(pixel.x as Float + u.x, pixel.y as Float + u.y)
}

/// Sums the primal blocks of all tiles.
///
/// * `film`  - The film.
/// * `tiles` - Per-tile primal output.
fn merge_blocks(film: &Film, tiles: &[PrimalTile]) -> ImageBlock {
    let mut block = film.create_block(true);
    for t in tiles.iter() {
        block.merge(&t.block);
    }
    block
}
