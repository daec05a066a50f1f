//! Omnidirectional Receiver

use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampler::*;
use prb_core::sampling::*;
use prb_core::sensor::*;

/// Point receiver for acoustic simulation. It records energy from all
/// directions; its film is an energy-time histogram with one column per
/// time bin, so raster coordinates carry no spatial meaning. `sample_ray`
/// maps the normalized raster position to a uniformly distributed
/// direction.
pub struct Receiver {
    /// Position of the receiver.
    pub position: Point3f,

    /// The energy-time histogram.
    pub film: Film,

    /// Sampler prototype.
    pub sampler: Box<dyn Sampler>,
}

impl Receiver {
    /// Create a new receiver.
    ///
    /// * `position` - Position of the receiver.
    /// * `film`     - The histogram film.
    /// * `sampler`  - Sampler prototype.
    pub fn new(position: Point3f, film: Film, sampler: Box<dyn Sampler>) -> Self {
        Self {
            position,
            film,
            sampler,
        }
    }
}

impl Sensor for Receiver {
    fn get_type(&self) -> &'static str {
        "receiver"
    }

    fn film(&self) -> &Film {
        &self.film
    }

    fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    fn world_position(&self) -> Point3f {
        self.position
    }

    fn forward(&self) -> Vector3f {
        Vector3f::new(0.0, 0.0, 1.0)
    }

    /// Returns a ray in a uniformly sampled direction; the weight is one so
    /// that the estimate is the directional average of incident energy.
    ///
    /// * `p_raster` - Raster position; normalized to `[0, 1)²` by the film
    ///                size.
    fn sample_ray(&self, p_raster: &Point2f) -> (Ray, Float) {
        let u = Point2f::new(
            p_raster.x / self.film.size.x as Float,
            p_raster.y / self.film.size.y as Float,
        );
        (Ray::new(self.position, uniform_sample_sphere(&u)), 1.0)
    }

    fn sample_direction(&self, _p: &Point3f) -> Option<(DirectionSample, Float)> {
        None
    }

    fn project(&self, _p: &Point3f) -> Option<Point2f> {
        None
    }

    fn project_attached(&self, _p: &Point3r) -> Option<Point2r> {
        None
    }

    fn raster_jacobian(&self, _p: &Point3f, _e: &Vector3f, _n: &Vector3f) -> Float {
        0.0
    }

    fn near_factor(&self) -> Float {
        1.0
    }
}

impl From<(&ParamSet, Film, Box<dyn Sampler>)> for Receiver {
    /// Create a `Receiver` from given parameter set, film and sampler.
    ///
    /// * `p` - A tuple containing parameter set, film and sampler.
    fn from(p: (&ParamSet, Film, Box<dyn Sampler>)) -> Self {
        let (params, film, sampler) = p;
        let position = params.find_one_point3f("position", Point3f::zero());
        Self::new(position, film, sampler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filters::*;
    use samplers::*;
    use std::sync::Arc;

    #[test]
    fn rays_leave_the_receiver_in_unit_directions() {
        let film = Film::new(Point2i::new(100, 1), Arc::new(BoxFilter::new(0.5)));
        let rx = Receiver::new(Point3f::new(1.0, 2.0, 3.0), film, Box::new(IndependentSampler::new(1)));
        for (x, y) in [(0.5, 0.1), (37.2, 0.9), (99.0, 0.5)] {
            let (ray, w) = rx.sample_ray(&Point2f::new(x, y));
            assert_eq!(ray.o, rx.position);
            assert!((ray.d.length() - 1.0).abs() < 1e-5);
            assert_eq!(w, 1.0);
        }
        assert!(rx.project(&Point3f::zero()).is_none());
    }
}
