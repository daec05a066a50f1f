//! Perspective Camera

use prb_core::ad::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampler::*;
use prb_core::sensor::*;

/// Pinhole perspective camera. Camera space has `x` to the right, `y` down
/// the raster and `z` along the viewing direction; the field of view is
/// measured along the raster x axis.
pub struct PerspectiveCamera {
    /// Center of projection.
    pub origin: Point3f,

    /// Camera space x axis in world space.
    pub right: Vector3f,

    /// Camera space y axis in world space (raster down).
    pub down: Vector3f,

    /// Viewing direction.
    pub forward: Vector3f,

    /// Focal length in pixels.
    pub focal_px: Float,

    /// The film to capture the rendered image.
    pub film: Film,

    /// Sampler prototype.
    pub sampler: Box<dyn Sampler>,
}

impl PerspectiveCamera {
    /// Create a new perspective camera.
    ///
    /// * `origin`  - Center of projection.
    /// * `target`  - Point the camera looks at.
    /// * `up`      - Up vector.
    /// * `fov`     - Horizontal field-of-view angle in degrees.
    /// * `film`    - The film to capture the rendered image.
    /// * `sampler` - Sampler prototype.
    pub fn new(
        origin: Point3f,
        target: Point3f,
        up: Vector3f,
        fov: Float,
        film: Film,
        sampler: Box<dyn Sampler>,
    ) -> Result<Self> {
        let forward = (target - origin).normalize();
        let right = forward.cross(&up);
        if forward.has_non_finite() || right.length() < 1e-6 {
            return Err(Error::Config(
                "camera".to_string(),
                "the viewing direction must be non-zero and not parallel to 'up'".to_string(),
            ));
        }
        if !(fov > 0.0 && fov < 180.0) {
            return Err(Error::Config("fov".to_string(), format!("{} is not in (0, 180)", fov)));
        }
        let right = right.normalize();
        let down = forward.cross(&right);
        let focal_px = 0.5 * film.size.x as Float / (0.5 * fov.to_radians()).tan();
        debug!("Perspective camera at {} with focal length {} px", origin, focal_px);
        Ok(Self {
            origin,
            right,
            down,
            forward,
            focal_px,
            film,
            sampler,
        })
    }

    /// Returns the raster position of the image center.
    fn center(&self) -> Point2f {
        Point2f::new(0.5 * self.film.size.x as Float, 0.5 * self.film.size.y as Float)
    }

    /// Returns `true` if a raster position lies on the film.
    ///
    /// * `p` - Raster position.
    fn on_film(&self, p: &Point2f) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.film.size.x as Float && p.y < self.film.size.y as Float
    }

    /// Returns the camera space coordinates of a world space vector.
    ///
    /// * `v` - The vector.
    fn to_camera(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.right), v.dot(&self.down), v.dot(&self.forward))
    }
}

impl Sensor for PerspectiveCamera {
    fn get_type(&self) -> &'static str {
        "perspective"
    }

    fn film(&self) -> &Film {
        &self.film
    }

    fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    fn world_position(&self) -> Point3f {
        self.origin
    }

    fn forward(&self) -> Vector3f {
        self.forward
    }

    /// Returns a ray through a raster position with unit importance.
    ///
    /// * `p_raster` - Raster position.
    fn sample_ray(&self, p_raster: &Point2f) -> (Ray, Float) {
        let c = self.center();
        let x = (p_raster.x - c.x) / self.focal_px;
        let y = (p_raster.y - c.y) / self.focal_px;
        let d = (self.right * x + self.down * y + self.forward).normalize();
        (Ray::new(self.origin, d), 1.0)
    }

    /// Connects a point to the pinhole. The weight converts radiance leaving
    /// `p` into raster measure: `f² / (cos³θ · dist²)`, the cosine at `p`
    /// being left to the caller.
    ///
    /// * `p` - Point in the scene.
    fn sample_direction(&self, p: &Point3f) -> Option<(DirectionSample, Float)> {
        let uv = self.project(p)?;
        let v = self.origin - *p;
        let dist = v.length();
        let d = v / dist;
        let cos_theta = -d.dot(&self.forward);
        if cos_theta <= 0.0 {
            return None;
        }
        let ds = DirectionSample {
            p: Point3r::from(self.origin),
            n: Normal3r::from(self.forward),
            d,
            dist,
            pdf: 1.0,
            delta: true,
            uv,
            ..Default::default()
        };
        let weight = self.near_factor() / (cos_theta * cos_theta * cos_theta * dist * dist);
        Some((ds, weight))
    }

    fn project(&self, p: &Point3f) -> Option<Point2f> {
        let q = self.to_camera(&(*p - self.origin));
        if q.z <= RAY_EPSILON {
            return None;
        }
        let c = self.center();
        let raster = Point2f::new(c.x + self.focal_px * q.x / q.z, c.y + self.focal_px * q.y / q.z);
        if self.on_film(&raster) {
            Some(raster)
        } else {
            None
        }
    }

    fn project_attached(&self, p: &Point3r) -> Option<Point2r> {
        let raster = self.project(&p.value())?;
        let v = *p - self.origin;
        let x = v.dot(&Vector3r::from(self.right));
        let y = v.dot(&Vector3r::from(self.down));
        let z = v.dot(&Vector3r::from(self.forward));
        let px = Real::from(self.focal_px) * x / z;
        let py = Real::from(self.focal_px) * y / z;
        // Keep the primal exactly equal to the detached projection.
        Some(Point2r::new(
            Real::replace_grad(Real::from(raster.x), px),
            Real::replace_grad(Real::from(raster.y), py),
        ))
    }

    /// Returns `|Dπ e × Dπ n|` where `Dπ` is the derivative of the
    /// projection at `p`.
    fn raster_jacobian(&self, p: &Point3f, e: &Vector3f, n: &Vector3f) -> Float {
        let q = self.to_camera(&(*p - self.origin));
        if q.z <= RAY_EPSILON {
            return 0.0;
        }
        let project_vector = |w: &Vector3f| {
            let wc = self.to_camera(w);
            let s = self.focal_px / q.z;
            Point2f::new(s * (wc.x - q.x / q.z * wc.z), s * (wc.y - q.y / q.z * wc.z))
        };
        let de = project_vector(e);
        let dn = project_vector(n);
        abs(de.x * dn.y - de.y * dn.x)
    }

    fn near_factor(&self) -> Float {
        self.focal_px * self.focal_px
    }
}

impl TryFrom<(&ParamSet, Film, Box<dyn Sampler>)> for PerspectiveCamera {
    type Error = Error;

    /// Create a `PerspectiveCamera` from given parameter set, film and
    /// sampler.
    ///
    /// * `p` - A tuple containing parameter set, film and sampler.
    fn try_from(p: (&ParamSet, Film, Box<dyn Sampler>)) -> Result<Self> {
        let (params, film, sampler) = p;
        let origin = params.find_one_point3f("origin", Point3f::new(0.0, 0.0, 0.0));
        let target = params.find_one_point3f("target", Point3f::new(0.0, 0.0, 1.0));
        let up = params.find_one_point3f("up", Vector3f::new(0.0, 1.0, 0.0));
        let fov = params.find_one_float("fov", 45.0);
        Self::new(origin, target, up, fov, film, sampler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filters::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;
    use samplers::*;
    use std::sync::Arc;

    fn camera() -> PerspectiveCamera {
        let film = Film::new(Point2i::new(64, 48), Arc::new(TriangleFilter::new(1.0)));
        PerspectiveCamera::new(
            Point3f::new(0.0, -5.0, 1.0),
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, 1.0),
            40.0,
            film,
            Box::new(IndependentSampler::new(1)),
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn project_inverts_sample_ray(x in 0.5f32..63.5, y in 0.5f32..47.5, t in 0.5f32..10.0) {
            let cam = camera();
            let (ray, _) = cam.sample_ray(&Point2f::new(x, y));
            let raster = cam.project(&ray.at(t)).unwrap();
            prop_assert!(approx_eq!(f32, raster.x, x, epsilon = 1e-2));
            prop_assert!(approx_eq!(f32, raster.y, y, epsilon = 1e-2));
        }
    }

    #[test]
    fn attached_projection_follows_the_point() {
        let cam = camera();
        let mut p = Point3r::from(Point3f::new(0.3, 0.0, 0.2));
        p.x = Real::variable(0.3, 0);
        let raster = cam.project_attached(&p).unwrap();
        let h = 1e-3;
        let a = cam.project(&Point3f::new(0.3 + h, 0.0, 0.2)).unwrap();
        let b = cam.project(&Point3f::new(0.3 - h, 0.0, 0.2)).unwrap();
        let fd = (a.x - b.x) / (2.0 * h);
        assert!(approx_eq!(f32, raster.x.grad_at(0), fd, epsilon = 0.05));
        assert_eq!(raster.x.value(), cam.project(&p.value()).unwrap().x);
    }

    #[test]
    fn raster_jacobian_of_image_aligned_edge() {
        let cam = camera();
        // A point on the optical axis at distance z maps unit world lengths
        // to f/z pixels along both raster axes.
        let z = cam.origin.distance(&Point3f::zero());
        let j = cam.raster_jacobian(&Point3f::zero(), &cam.right, &cam.down);
        let s = cam.focal_px / z;
        assert!(approx_eq!(f32, j, s * s, epsilon = 1e-2));
    }

    #[test]
    fn connection_weight_on_axis() {
        let cam = camera();
        let (ds, w) = cam.sample_direction(&Point3f::zero()).unwrap();
        let dist = ds.dist;
        assert!(approx_eq!(f32, w, cam.near_factor() / (dist * dist), epsilon = 1e-2));
        assert!(ds.delta);
        assert!(approx_eq!(f32, ds.uv.x, 32.0, epsilon = 1e-3));
    }
}
