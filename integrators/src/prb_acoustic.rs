//! Path Replay Backpropagation for Acoustic Transport

use crate::common::*;
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
use prb_core::scene::*;
use prb_core::sensor::*;
use prb_core::spectrum::*;
use std::collections::HashMap;

/// Number of rays handed to a worker at once.
const ACOUSTIC_CHUNK: usize = 4096;

/// Settings of the energy-time histogram.
#[derive(Copy, Clone, Debug)]
pub struct AcousticConfig {
    /// Speed of sound in scene units per second.
    pub speed_of_sound: Float,

    /// Number of histogram bins; must match the film width.
    pub time_bins: usize,

    /// Duration of a bin in seconds.
    pub bin_width: Float,
}

impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            speed_of_sound: 343.0,
            time_bins: 1000,
            bin_width: 1e-3,
        }
    }
}

impl AcousticConfig {
    /// Returns the bin reached after travelling a distance, if it lies in
    /// the histogram.
    ///
    /// * `length` - Path length.
    pub fn bin(&self, length: Float) -> Option<usize> {
        let t = length / (self.speed_of_sound * self.bin_width);
        if t.is_finite() && t >= 0.0 && (t as usize) < self.time_bins {
            Some(t as usize)
        } else {
            None
        }
    }
}

impl TryFrom<&ParamSet> for AcousticConfig {
    type Error = Error;

    /// Create an `AcousticConfig` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        let defaults = Self::default();

        let speed_of_sound = params.find_one_float("speed_of_sound", defaults.speed_of_sound);
        if !(speed_of_sound > 0.0) {
            return Err(Error::Config("speed_of_sound".to_string(), format!("{}", speed_of_sound)));
        }
        let bin_width = params.find_one_float("bin_width", defaults.bin_width);
        if !(bin_width > 0.0) {
            return Err(Error::Config("bin_width".to_string(), format!("{}", bin_width)));
        }
        let time_bins = params.find_one_int("time_bins", defaults.time_bins as Int);
        if time_bins < 1 {
            return Err(Error::Config("time_bins".to_string(), format!("{}", time_bins)));
        }

        Ok(Self {
            speed_of_sound,
            time_bins: time_bins as usize,
            bin_width,
        })
    }
}

/// Path Replay Backpropagation of time-resolved energy transport towards an
/// omnidirectional receiver. Each contribution lands in the histogram bin of
/// its detached path length; the three spectrum channels are frequency
/// bands.
///
/// The replay state is the adjoint-weighted energy `Σ g(bin) · c` of the
/// path, so that the indirect derivative at every vertex covers all later
/// bins at once.
pub struct PRBAcousticIntegrator {
    /// Common settings.
    pub config: IntegratorConfig,

    /// Histogram settings.
    pub acoustic: AcousticConfig,
}

impl PRBAcousticIntegrator {
    /// Create a new `PRBAcousticIntegrator`.
    ///
    /// * `config`   - Common settings.
    /// * `acoustic` - Histogram settings.
    pub fn new(config: IntegratorConfig, acoustic: AcousticConfig) -> Self {
        Self { config, acoustic }
    }

    /// Returns an error if the film does not hold one row of `time_bins`
    /// bins.
    ///
    /// * `sensor` - The sensor.
    fn check_film(&self, sensor: &dyn Sensor) -> Result<()> {
        let size = sensor.film().size;
        if size.x as usize != self.acoustic.time_bins || size.y != 1 {
            return Err(Error::Config(
                "time_bins".to_string(),
                format!(
                    "film is {}x{}, expected {}x1",
                    size.x, size.y, self.acoustic.time_bins
                ),
            ));
        }
        Ok(())
    }

    /// Returns the number of rays of a render call.
    ///
    /// * `sensor` - The sensor.
    /// * `spp`    - Rays per bin; zero selects the sampler default.
    fn ray_count(&self, sensor: &dyn Sensor, spp: usize) -> Result<usize> {
        let count = sensor.film().pixel_count() as u64 * resolve_spp(sensor, spp) as u64;
        check_wavefront(count)?;
        Ok(count as usize)
    }

    /// Generates the ray of one sample. The receiver decides the origin; the
    /// direction is uniform over the sphere.
    ///
    /// * `sensor`  - The receiver.
    /// * `sampler` - The sampler.
    pub fn sample_rays(&self, sensor: &dyn Sensor, sampler: &mut dyn Sampler) -> Ray {
        let size = sensor.film().size;
        let u = sampler.next_2d();
        let (ray, _) = sensor.sample_ray(&Point2f::new(u.x * size.x as Float, u.y * size.y as Float));
        ray
    }

    /// Hands one local contribution to the histogram and the tracker.
    ///
    /// * `mode`    - Differentiation mode.
    /// * `ctx`     - Differential inputs.
    /// * `adjoint` - Adjoint weight per bin.
    /// * `sink`    - Receives `(bin, value)` for splatting.
    /// * `c`       - Contribution including the path throughput.
    /// * `bin`     - Bin of the contribution.
    /// * `l`       - Running primal energy, tangent or replay state.
    #[allow(clippy::too_many_arguments)]
    fn contribute(
        mode: ADMode,
        ctx: &mut SampleContext,
        adjoint: Option<&[SpectrumF]>,
        sink: &mut dyn FnMut(usize, SpectrumF),
        c: &Spectrum,
        bin: Option<usize>,
        l: &mut SpectrumF,
    ) {
        let bin = match bin {
            Some(b) => b,
            None => return,
        };
        let g = adjoint.map(|a| a[bin]).unwrap_or_else(SpectrumF::one);
        match mode {
            ADMode::Primal => {
                let v = c.value();
                sink(bin, v);
                *l += v * g;
            }
            ADMode::Forward => {
                let t = ctx.tracker.forward_to(c);
                sink(bin, t);
                *l += t;
            }
            ADMode::Backward => {
                ctx.tracker.backward_from(&(*c * g));
                *l -= c.value() * g;
            }
        }
    }

    /// The random walk.
    ///
    /// The primal pass reports every contribution through `sink` and
    /// returns the adjoint-weighted energy as state. Forward mode keeps the
    /// throughput attached and reports tangents. Backward mode replays the
    /// walk from `ctx.state_in`.
    ///
    /// * `mode`    - Differentiation mode.
    /// * `scene`   - The scene.
    /// * `sampler` - The sampler.
    /// * `ray`     - Ray leaving the receiver.
    /// * `ctx`     - Differential inputs.
    /// * `adjoint` - Adjoint weight per bin (primal and backward passes of a
    ///               backward render).
    /// * `sink`    - Receives `(bin, value)` for splatting.
    #[allow(clippy::too_many_arguments)]
    fn trace(
        &self,
        mode: ADMode,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        ctx: &mut SampleContext,
        adjoint: Option<&[SpectrumF]>,
        sink: &mut dyn FnMut(usize, SpectrumF),
    ) -> SampleResult {
        let cfg = &self.config;
        let forward = mode == ADMode::Forward;
        let backward = mode == ADMode::Backward;
        let bsdf_ctx = BSDFContext::default();
        let state_in = ctx.state_in.unwrap_or_default();

        let pi0 = if backward {
            state_in.pi
        } else {
            scene.ray_intersect_preliminary(ray)
        };
        let mut l = if backward { state_in.l } else { SpectrumF::zero() };
        let mut beta = SpectrumF::one();
        let mut beta_att = Spectrum::one();
        let mut eta: Float = 1.0;
        let mut depth = 0_u32;
        let mut prev = PrevVertex::origin(&ray.o);
        let mut si = pi0.compute_surface_interaction(scene, ray, RayFlags::ALL);
        let mut length: Float = 0.0;

        let throughput = |beta: &SpectrumF, beta_att: &Spectrum| {
            if forward {
                *beta_att
            } else {
                Spectrum::from(*beta)
            }
        };

        while depth < cfg.max_depth {
            length += si.t.value();

            if !(depth == 0 && cfg.hide_emitters) && scene.emitter_at(&si).is_some() {
                let mis = emission_mis(scene, &si, &prev);
                let le = scene.eval_emitter(&si) * throughput(&beta, &beta_att) * mis;
                Self::contribute(mode, ctx, adjoint, sink, &le, self.acoustic.bin(length), &mut l);
            }

            let active_next = si.is_valid() && depth.saturating_add(1) < cfg.max_depth;
            let bsdf = match (active_next, si.shape) {
                (true, Some(s)) => scene.shapes[s].bsdf(),
                _ => break,
            };

            if bsdf.flags().has_smooth() {
                let u = sampler.next_2d();
                let (ds, em_weight) = scene.sample_emitter_direction(&si, &u, true);
                if !em_weight.is_black() {
                    let lr_dir = emitter_contribution(
                        scene,
                        bsdf,
                        &bsdf_ctx,
                        &si,
                        &ds,
                        &em_weight,
                        false,
                        cfg.delta_emitter_attached,
                    ) * throughput(&beta, &beta_att);
                    let bin = self.acoustic.bin(length + ds.dist);
                    Self::contribute(mode, ctx, adjoint, sink, &lr_dir, bin, &mut l);
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
            let ratio = if delta_lobe || !(forward || backward) {
                None
            } else {
                let wo = si.to_local(&Vector3r::from(wo_world));
                let bsdf_val = bsdf.eval(&bsdf_ctx, &si, &wo);
                Some(unit_ratio(&bsdf_val, &(bsdf_weight * bs.pdf)))
            };

            if backward {
                if let Some(r) = ratio {
                    ctx.tracker.backward_from(&(Spectrum::from(l) * r));
                }
            }
            if forward {
                beta_att = match ratio {
                    Some(r) => beta_att * bsdf_weight * r,
                    None => beta_att * bsdf_weight,
                };
            }

            beta *= bsdf_weight;
            eta *= bs.eta;
            prev = PrevVertex {
                p: si.p,
                bsdf_pdf: bs.pdf,
                bsdf_delta: delta_lobe,
            };
            si = scene.ray_intersect(&si.spawn_ray(&wo_world), RayFlags::ALL);
            depth += 1;

            if depth >= cfg.rr_depth {
                let q = rr_probability(&beta, eta);
                let u = sampler.next_1d();
                if !(q > 0.0 && u < q) {
                    break;
                }
                beta /= q;
                beta_att = beta_att / q;
            }
            if beta.max_value() <= 0.0 {
                break;
            }
        }

        SampleResult {
            l: match mode {
                ADMode::Backward => SpectrumF::zero(),
                _ => l,
            },
            valid: pi0.is_valid(),
            state: PathState { l, pi: pi0 },
            pos: None,
        }
    }

    /// Runs one pass over all rays in parallel. `f` traces ray `index` and
    /// receives the job's block and tracker.
    ///
    /// * `sensor` - The receiver.
    /// * `seed`   - Seed of the sampler streams.
    /// * `count`  - Number of rays.
    /// * `label`  - Progress message.
    /// * `f`      - Per-ray body.
    fn pass<T, F>(&self, sensor: &dyn Sensor, seed: u64, count: usize, label: &str, f: F) -> Vec<T>
    where
        T: Default + Send,
        F: Fn(&mut dyn Sampler, usize, &mut T) + Sync,
    {
        let n_jobs = (count + ACOUSTIC_CHUNK - 1) / ACOUSTIC_CHUNK;
        parallel_for(n_jobs, self.config.threads, label, |job| {
            let mut sampler = sensor.sampler().clone_sampler();
            let mut out = T::default();
            let end = ((job + 1) * ACOUSTIC_CHUNK).min(count);
            for index in job * ACOUSTIC_CHUNK..end {
                sampler.seed(seed, index as u64);
                f(sampler.as_mut(), index, &mut out);
            }
            out
        })
    }
}

/// Per-job output of an acoustic pass.
#[derive(Default)]
struct AcousticJob {
    block: Option<ImageBlock>,
    tracker: GradientTracker,
    states: Vec<PathState>,
}

/// Returns the raster position of a histogram bin.
///
/// * `bin` - Bin index.
fn bin_position(bin: usize) -> Point2f {
    Point2f::new(bin as Float + 0.5, 0.5)
}

impl ADIntegrator for PRBAcousticIntegrator {
    fn get_type(&self) -> &'static str {
        "prb_acoustic"
    }

    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Returns the energy of one path summed over all bins.
    fn sample(
        &self,
        mode: ADMode,
        scene: &Scene,
        _sensor: &dyn Sensor,
        sampler: &mut dyn Sampler,
        ray: &Ray,
        ctx: &mut SampleContext,
    ) -> SampleResult {
        self.trace(mode, scene, sampler, ray, ctx, None, &mut |_, _| {})
    }

    fn render(&self, scene: &Scene, sensor: &dyn Sensor, seed: u64, spp: usize) -> Result<Image> {
        self.check_film(sensor)?;
        let count = self.ray_count(sensor, spp)?;
        info!("{}: tracing {} rays", self.get_type(), count);
        let film = sensor.film();
        film.clear();
        let norm = 1.0 / count.max(1) as Float;

        let jobs = self.pass(sensor, seed, count, "Acoustic", |sampler, _, job: &mut AcousticJob| {
            let block = job.block.get_or_insert_with(|| film.create_block(false));
            let ray = self.sample_rays(sensor, sampler);
            let mut ctx = SampleContext {
                delta_l: SpectrumF::zero(),
                state_in: None,
                tracker: &mut job.tracker,
            };
            self.trace(ADMode::Primal, scene, sampler, &ray, &mut ctx, None, &mut |bin, v| {
                block.put(&bin_position(bin), &(v * norm))
            });
        });
        for block in jobs.iter().filter_map(|j| j.block.as_ref()) {
            film.put_block(block);
        }
        Ok(film.develop())
    }

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
        self.check_film(sensor)?;
        let slot_tangents = scene.tangents(tangents)?;
        let count = self.ray_count(sensor, spp)?;
        let film = sensor.film();
        film.clear();
        let norm = 1.0 / count.max(1) as Float;

        let jobs = self.pass(sensor, seed, count, "Acoustic forward", |sampler, _, job: &mut AcousticJob| {
            let block = job.block.get_or_insert_with(|| film.create_block(false));
            job.tracker.tangents = slot_tangents;
            let ray = self.sample_rays(sensor, sampler);
            let mut ctx = SampleContext {
                delta_l: SpectrumF::zero(),
                state_in: None,
                tracker: &mut job.tracker,
            };
            self.trace(ADMode::Forward, scene, sampler, &ray, &mut ctx, None, &mut |bin, t| {
                block.put(&bin_position(bin), &(t * norm))
            });
        });

        let mut attached_seen = false;
        for job in jobs.iter() {
            if let Some(block) = job.block.as_ref() {
                film.put_block(block);
            }
            attached_seen |= job.tracker.attached_seen;
        }
        if !attached_seen {
            warn!("{}: forward pass found no attached contribution", self.get_type());
        }
        Ok(film.develop())
    }

    fn render_backward(
        &self,
        scene: &mut Scene,
        sensor: &dyn Sensor,
        grad_in: &Image,
        seed: u64,
        spp: usize,
    ) -> Result<()> {
        self.check_film(sensor)?;
        let film = sensor.film();
        if grad_in.pixels.len() != film.pixel_count() {
            return Err(Error::ImageSize(grad_in.pixels.len(), film.pixel_count()));
        }
        if scene.num_enabled() == 0 {
            return Err(Error::NotAttached("backward"));
        }
        let count = self.ray_count(sensor, spp)?;
        let norm = 1.0 / count.max(1) as Float;
        let adjoint: Vec<SpectrumF> = grad_in.pixels.iter().map(|g| *g * norm).collect();

        let mut tracker = GradientTracker::default();
        {
            let scene: &Scene = scene;
            let primal = self.pass(sensor, seed, count, "Acoustic primal", |sampler, _, job: &mut AcousticJob| {
                let ray = self.sample_rays(sensor, sampler);
                let mut ctx = SampleContext {
                    delta_l: SpectrumF::zero(),
                    state_in: None,
                    tracker: &mut job.tracker,
                };
                let r = self.trace(ADMode::Primal, scene, sampler, &ray, &mut ctx, Some(&adjoint), &mut |_, _| {});
                job.states.push(r.state);
            });

            let trackers = self.pass(sensor, seed, count, "Acoustic backward", |sampler, index, job: &mut AcousticJob| {
                let state = primal[index / ACOUSTIC_CHUNK].states[index % ACOUSTIC_CHUNK];
                let ray = self.sample_rays(sensor, sampler);
                let mut ctx = SampleContext {
                    delta_l: SpectrumF::one(),
                    state_in: Some(state),
                    tracker: &mut job.tracker,
                };
                self.trace(ADMode::Backward, scene, sampler, &ray, &mut ctx, Some(&adjoint), &mut |_, _| {});
            });
            for job in trackers.iter() {
                tracker.merge(&job.tracker);
            }
        }

        if !tracker.attached_seen {
            warn!("{}: backward pass found no attached contribution", self.get_type());
        }
        scene.accumulate_grad(&tracker);
        Ok(())
    }
}

impl TryFrom<&ParamSet> for PRBAcousticIntegrator {
    type Error = Error;

    /// Create a `PRBAcousticIntegrator` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        Ok(Self::new(
            IntegratorConfig::try_from(params)?,
            AcousticConfig::try_from(params)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_follow_travel_time() {
        let cfg = AcousticConfig {
            speed_of_sound: 10.0,
            time_bins: 8,
            bin_width: 0.1,
        };
        assert_eq!(cfg.bin(0.0), Some(0));
        assert_eq!(cfg.bin(0.99), Some(0));
        assert_eq!(cfg.bin(2.5), Some(2));
        assert_eq!(cfg.bin(7.99), Some(7));
        assert_eq!(cfg.bin(8.0), None);
        assert_eq!(cfg.bin(INFINITY), None);
    }

    #[test]
    fn invalid_histogram_settings_are_rejected() {
        let mut params = ParamSet::new();
        params.add_float("speed_of_sound", &[0.0]);
        assert!(matches!(AcousticConfig::try_from(&params), Err(Error::Config(..))));

        let mut params = ParamSet::new();
        params.add_int("time_bins", &[0]);
        assert!(AcousticConfig::try_from(&params).is_err());

        let mut params = ParamSet::new();
        params.add_int("time_bins", &[64]);
        params.add_float("bin_width", &[0.01]);
        let cfg = AcousticConfig::try_from(&params).unwrap();
        assert_eq!(cfg.time_bins, 64);
    }
}
