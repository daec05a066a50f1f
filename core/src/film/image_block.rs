//! Image Block

use super::Image;
use crate::ad::*;
use crate::filter::*;
use crate::geometry::*;
use crate::pbrt::*;
use crate::spectrum::*;

/// Accumulates filtered sample splats over the whole film raster.
///
/// A normalized block stores `Σ h·L` and `Σ h` per pixel and develops to
/// their ratio. An unnormalized block stores `Σ h·L / ∫h` and develops to
/// that sum directly.
#[derive(Clone)]
pub struct ImageBlock {
    /// Raster size.
    size: Point2i,

    /// Reconstruction filter.
    filter: ArcFilter,

    /// Whether development divides by the filter weight sums.
    normalize: bool,

    /// Weighted sums of contributions.
    values: Vec<SpectrumF>,

    /// Sums of filter weights.
    weights: Vec<Float>,
}

impl ImageBlock {
    /// Returns an empty block.
    ///
    /// * `size`      - Raster size.
    /// * `filter`    - Reconstruction filter.
    /// * `normalize` - Whether development divides by the filter weight sums.
    pub fn new(size: Point2i, filter: ArcFilter, normalize: bool) -> Self {
        let n = (size.x.max(0) * size.y.max(0)) as usize;
        Self {
            size,
            filter,
            normalize,
            values: vec![SpectrumF::zero(); n],
            weights: vec![0.0; n],
        }
    }

    /// Returns `true` for normalized blocks.
    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Returns the raster size.
    pub fn size(&self) -> Point2i {
        self.size
    }

    /// Returns the filter weight sum of a pixel.
    ///
    /// * `offset` - Pixel offset in row-major order.
    pub fn weight(&self, offset: usize) -> Float {
        self.weights[offset]
    }

    /// Returns the developed value of a pixel.
    ///
    /// * `offset` - Pixel offset in row-major order.
    pub fn pixel(&self, offset: usize) -> SpectrumF {
        if self.normalize {
            let w = self.weights[offset];
            if w > 0.0 {
                self.values[offset] / w
            } else {
                SpectrumF::zero()
            }
        } else {
            self.values[offset]
        }
    }

    /// Calls `f(offset, d)` for every pixel whose center lies within the
    /// filter footprint around `pos`; `d` is the pixel center minus `pos`.
    ///
    /// * `pos` - Raster position.
    /// * `f`   - Callback.
    fn for_each_in_footprint<F>(&self, pos: &Point2f, mut f: F)
    where
        F: FnMut(usize, Vector2f),
    {
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            return;
        }
        let r = self.filter.radius();
        let x0 = ((pos.x - 0.5 - r).ceil() as Int).max(0);
        let x1 = ((pos.x - 0.5 + r).floor() as Int).min(self.size.x - 1);
        let y0 = ((pos.y - 0.5 - r).ceil() as Int).max(0);
        let y1 = ((pos.y - 0.5 + r).floor() as Int).min(self.size.y - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vector2f::new(x as Float + 0.5 - pos.x, y as Float + 0.5 - pos.y);
                f((y * self.size.x + x) as usize, d);
            }
        }
    }

    /// Splats a sample.
    ///
    /// * `pos`   - Raster position.
    /// * `value` - Sample value.
    pub fn put(&mut self, pos: &Point2f, value: &SpectrumF) {
        if value.has_nans() {
            warn!("Dropping non-finite sample at {}", pos);
            return;
        }
        let inv_integral = 1.0 / self.filter.integral();
        for (offset, d) in self.footprint(pos) {
            let h = self.filter.eval_2d(&d);
            if self.normalize {
                self.values[offset] += *value * h;
                self.weights[offset] += h;
            } else {
                self.values[offset] += *value * (h * inv_integral);
            }
        }
    }

    /// Returns the footprint of `pos` as `(offset, d)` pairs.
    fn footprint(&self, pos: &Point2f) -> Vec<(usize, Vector2f)> {
        let mut touched = Vec::with_capacity(16);
        self.for_each_in_footprint(pos, |offset, d| touched.push((offset, d)));
        touched
    }

    /// Splats the forward derivative of a sample whose raster position moves
    /// with tangent `dpos`. Besides `h·δL` the numerator receives
    /// `(L_s − I_k)·ḣ_k`, the derivative of the normalized reconstruction
    /// with respect to the splat position.
    ///
    /// * `pos`    - Raster position.
    /// * `dpos`   - Tangent of the raster position.
    /// * `value`  - Tangent of the sample value.
    /// * `l_s`    - Primal sample value.
    /// * `primal` - Normalized primal block of the same pass.
    pub fn put_tangent(&mut self, pos: &Point2f, dpos: &Vector2f, value: &SpectrumF, l_s: &SpectrumF, primal: &ImageBlock) {
        if value.has_nans() {
            warn!("Dropping non-finite tangent at {}", pos);
            return;
        }
        for (offset, d) in self.footprint(pos) {
            let h = self.filter.eval_2d(&d);
            // d = center - pos so ∂h/∂pos = -∇h.
            let g = self.filter.gradient_2d(&d);
            let h_dot = -(g.x * dpos.x + g.y * dpos.y);
            self.values[offset] += *value * h;
            if h_dot != 0.0 {
                self.values[offset] += (*l_s - primal.pixel(offset)) * h_dot;
            }
            self.weights[offset] += h;
        }
    }

    /// Returns the adjoint radiance of a sample splatted at `pos`, obtained
    /// by differentiating the splat and the division by the weight sums of
    /// this (primal) block.
    ///
    /// * `pos`     - Raster position.
    /// * `grad_in` - Adjoint of the developed image.
    pub fn adjoint(&self, pos: &Point2f, grad_in: &Image) -> SpectrumF {
        let inv_integral = 1.0 / self.filter.integral();
        let mut delta = SpectrumF::zero();
        self.for_each_in_footprint(pos, |offset, d| {
            let h = self.filter.eval_2d(&d);
            if self.normalize {
                let w = self.weights[offset];
                if w > 0.0 {
                    delta += grad_in.pixels[offset] * (h / w);
                }
            } else {
                delta += grad_in.pixels[offset] * (h * inv_integral);
            }
        });
        delta
    }

    /// Returns the adjoint of a splat position:
    /// `Σ_k Σ_c g_kc (L_sc − I_kc)/W_k · ∂h_k/∂pos`.
    ///
    /// * `pos`     - Raster position.
    /// * `l_s`     - Primal sample value.
    /// * `grad_in` - Adjoint of the developed image.
    pub fn position_adjoint(&self, pos: &Point2f, l_s: &SpectrumF, grad_in: &Image) -> Vector2f {
        let mut adj = Vector2f::new(0.0, 0.0);
        if !self.normalize {
            return adj;
        }
        self.for_each_in_footprint(pos, |offset, d| {
            let w = self.weights[offset];
            if w <= 0.0 {
                return;
            }
            let diff = (*l_s - self.pixel(offset)) * grad_in.pixels[offset];
            let s = (diff[0] + diff[1] + diff[2]) / w;
            let g = self.filter.gradient_2d(&d);
            adj.x -= s * g.x;
            adj.y -= s * g.y;
        });
        adj
    }

    /// Propagates the position adjoint of a sample into the tracker.
    ///
    /// * `tracker` - Gradient tracker of the pass.
    /// * `pos`     - Attached raster position.
    /// * `l_s`     - Primal sample value.
    /// * `grad_in` - Adjoint of the developed image.
    pub fn backward_position(&self, tracker: &mut GradientTracker, pos: &Point2r, l_s: &SpectrumF, grad_in: &Image) {
        let adj = self.position_adjoint(&pos.value(), l_s, grad_in);
        tracker.backward_scalar(&pos.x, adj.x);
        tracker.backward_scalar(&pos.y, adj.y);
    }

    /// Adds the contents of another block of the same size.
    ///
    /// * `other` - The other block.
    pub fn merge(&mut self, other: &ImageBlock) {
        for (v, o) in self.values.iter_mut().zip(other.values.iter()) {
            *v += *o;
        }
        for (w, o) in self.weights.iter_mut().zip(other.weights.iter()) {
            *w += *o;
        }
    }

    /// Resets all sums to zero.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = SpectrumF::zero());
        self.weights.iter_mut().for_each(|w| *w = 0.0);
    }

    /// Returns the developed image.
    pub fn develop(&self) -> Image {
        let pixels = (0..self.values.len()).map(|i| self.pixel(i)).collect();
        Image::from_pixels(self.size, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use std::sync::Arc;

    struct Tent(FilterData);

    impl Filter for Tent {
        fn get_type(&self) -> &'static str {
            "tent"
        }

        fn get_data(&self) -> &FilterData {
            &self.0
        }

        fn eval(&self, x: Float) -> Float {
            (1.0 - x.abs()).max(0.0)
        }

        fn eval_derivative(&self, x: Float) -> Float {
            if x.abs() < 1.0 {
                -x.signum()
            } else {
                0.0
            }
        }

        fn integral_1d(&self) -> Float {
            1.0
        }
    }

    fn block(normalize: bool) -> ImageBlock {
        ImageBlock::new(Point2i::new(4, 3), Arc::new(Tent(FilterData::new(1.0))), normalize)
    }

    #[test]
    fn normalized_block_develops_to_weighted_mean() {
        let mut b = block(true);
        b.put(&Point2f::new(1.5, 1.5), &SpectrumF::splat(2.0));
        b.put(&Point2f::new(1.7, 1.5), &SpectrumF::splat(4.0));
        let img = b.develop();
        let v = img.pixels[4 + 1][0];
        // Weights 1.0 and 0.8 at the center of pixel (1, 1).
        assert!(approx_eq!(f32, v, (2.0 + 0.8 * 4.0) / 1.8, epsilon = 1e-5));
    }

    #[test]
    fn unnormalized_block_preserves_total_energy() {
        let mut b = block(false);
        b.put(&Point2f::new(2.0, 1.5), &SpectrumF::splat(1.0));
        let total: Float = b.develop().pixels.iter().map(|p| p[0]).sum();
        assert!(approx_eq!(f32, total, 1.0, epsilon = 1e-5));
    }

    #[test]
    fn adjoint_matches_finite_difference_of_develop() {
        let pos = Point2f::new(1.3, 1.6);
        let mut primal = block(true);
        primal.put(&Point2f::new(1.5, 1.5), &SpectrumF::splat(1.0));
        primal.put(&pos, &SpectrumF::splat(3.0));

        let grad_in = Image::constant(Point2i::new(4, 3), SpectrumF::splat(1.0));
        let adj = primal.adjoint(&pos, &grad_in);

        let eps = 1e-2;
        let mut bumped = block(true);
        bumped.put(&Point2f::new(1.5, 1.5), &SpectrumF::splat(1.0));
        bumped.put(&pos, &SpectrumF::splat(3.0 + eps));
        let f0 = primal.develop().sum();
        let f1 = bumped.develop().sum();
        assert!(approx_eq!(f32, adj[0], (f1[0] - f0[0]) / eps, epsilon = 1e-2));
    }

    #[test]
    fn position_adjoint_matches_finite_difference() {
        let l_s = SpectrumF::splat(3.0);
        let pos = Point2f::new(1.3, 1.6);
        let develop_at = |p: Point2f| {
            let mut b = block(true);
            b.put(&Point2f::new(1.5, 1.5), &SpectrumF::splat(1.0));
            b.put(&p, &l_s);
            b
        };
        let primal = develop_at(pos);
        let grad_in = Image::constant(Point2i::new(4, 3), SpectrumF::splat(1.0));
        let adj = primal.position_adjoint(&pos, &l_s, &grad_in);

        // The adjoint weights every channel by `grad_in`.
        let total = |p: Point2f| {
            let s = develop_at(p).develop().sum();
            s[0] + s[1] + s[2]
        };
        let eps = 1e-2;
        let dx = (total(Point2f::new(pos.x + eps, pos.y)) - total(Point2f::new(pos.x - eps, pos.y))) / (2.0 * eps);
        let dy = (total(Point2f::new(pos.x, pos.y + eps)) - total(Point2f::new(pos.x, pos.y - eps))) / (2.0 * eps);
        assert!(approx_eq!(f32, adj.x, dx, epsilon = 5e-2), "adj.x = {}, fd = {}", adj.x, dx);
        assert!(approx_eq!(f32, adj.y, dy, epsilon = 5e-2), "adj.y = {}, fd = {}", adj.y, dy);
    }
}
