//! Sensors

use crate::film::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;
use crate::sampler::*;

/// Sensor interface. Raster coordinates place pixel `(i, j)` on
/// `[i, i+1) × [j, j+1)`.
pub trait Sensor: Send + Sync {
    /// Returns the sensor type for debugging.
    fn get_type(&self) -> &'static str;

    /// Returns the film.
    fn film(&self) -> &Film;

    /// Returns the sampler prototype.
    fn sampler(&self) -> &dyn Sampler;

    /// Returns the position of the center of projection.
    fn world_position(&self) -> Point3f;

    /// Returns the viewing direction.
    fn forward(&self) -> Vector3f;

    /// Generates a primary ray through a raster position. Returns the ray
    /// and its importance weight.
    ///
    /// * `p_raster` - Raster position.
    fn sample_ray(&self, p_raster: &Point2f) -> (Ray, Float);

    /// Connects a scene point to the sensor. The returned sample stores the
    /// raster position in `uv` and the direction from `p` towards the sensor;
    /// the weight is the importance divided by the density.
    ///
    /// * `p` - Point in the scene.
    fn sample_direction(&self, p: &Point3f) -> Option<(DirectionSample, Float)>;

    /// Projects a world space point onto the raster.
    ///
    /// * `p` - Point in the scene.
    fn project(&self, p: &Point3f) -> Option<Point2f>;

    /// Projects an attached point so that the raster position follows it.
    ///
    /// * `p` - Point in the scene.
    fn project_attached(&self, p: &Point3r) -> Option<Point2r>;

    /// Returns the Jacobian from the line measure of a discontinuity at `p`
    /// with tangent `e` and normal `n` to raster area.
    ///
    /// * `p` - Point on the discontinuity.
    /// * `e` - Unit tangent of the discontinuity curve.
    /// * `n` - Unit normal of the discontinuity.
    fn raster_jacobian(&self, p: &Point3f, e: &Vector3f, n: &Vector3f) -> Float;

    /// Returns the squared focal length in pixels, the constant factor that
    /// converts solid angle at the sensor into raster area.
    fn near_factor(&self) -> Float;
}
