//! EM-weighted affine subpixel refinement.
//!
//! Each left window is related to the right image by a local affine warp
//!
//! ```text
//! x' = x + dx + a*u + b*v
//! y' = y + dy + c*u + e*v
//! ```
//!
//! where `(u, v)` is the offset from the window centre. Residuals are modelled
//! as a mixture of Gaussian inliers and uniformly distributed outliers. Each
//! iteration computes per-sample inlier responsibilities (E-step), then takes a
//! weighted Gauss-Newton step on the warp and re-estimates the noise variance
//! and the inlier prior (M-step). Down-weighting outliers keeps the estimate
//! stable near occlusion boundaries.
//!
//! The translation `(dx, dy)` becomes the refined disparity. A pixel is
//! invalidated when the iteration budget runs out, the normal equations are
//! singular, the warp degenerates, or the translation drifts too far from the
//! starting estimate.

use nalgebra::{Matrix6, Vector6};

use crate::disparity::DisparityMap;
use crate::image::{EdgeExtension, Image, ImageView};
use crate::kernel::{check_inputs, RefineParams, RefineStats, SubpixelKernel};
use crate::trace::{trace_event, trace_span};
use crate::util::SubpixelResult;

const PARAMS: usize = 6;

/// Configuration for [`AffineEmKernel`].
#[derive(Clone, Copy, Debug)]
pub struct AffineEmConfig {
    /// Iteration budget per pixel.
    pub max_iterations: usize,
    /// Convergence threshold on the translation step, in pixels.
    pub epsilon: f32,
    /// Maximum distance the translation may move from its start, in pixels.
    pub max_drift: f32,
    /// Maximum magnitude of any linear warp coefficient.
    pub max_deformation: f32,
    /// Initial inlier prior.
    pub inlier_prior: f32,
    /// Floor on the inlier noise variance.
    pub min_variance: f32,
}

impl Default for AffineEmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon: 1e-3,
            max_drift: 2.0,
            max_deformation: 0.5,
            inlier_prior: 0.9,
            min_variance: 1e-2,
        }
    }
}

/// Affine EM refinement kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct AffineEmKernel {
    config: AffineEmConfig,
}

impl AffineEmKernel {
    pub fn new(config: AffineEmConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone, Copy)]
struct Sample {
    residual: f32,
    jacobian: [f32; PARAMS],
    spatial: f32,
}

struct Window<'a> {
    left: ImageView<'a, f32>,
    right: ImageView<'a, f32>,
    grad_x: ImageView<'a, f32>,
    grad_y: ImageView<'a, f32>,
    hw: i32,
    hh: i32,
    spatial: &'a [f32],
    free: [bool; PARAMS],
}

impl AffineEmKernel {
    fn refine_pixel(
        &self,
        win: &Window<'_>,
        x: i32,
        y: i32,
        start: (f32, f32),
        samples: &mut Vec<Sample>,
    ) -> Option<(f32, f32)> {
        let cfg = &self.config;
        let mut p = [start.0, start.1, 0.0, 0.0, 0.0, 0.0];
        let mut variance: Option<f32> = None;
        let mut prior = cfg.inlier_prior.clamp(0.05, 0.99);

        for _ in 0..cfg.max_iterations {
            samples.clear();
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            let mut idx = 0;
            for v in -win.hh..=win.hh {
                for u in -win.hw..=win.hw {
                    let (uf, vf) = (u as f32, v as f32);
                    let l = win.left.get_extended(x + u, y + v, EdgeExtension::Zero);
                    let rx = (x + u) as f32 + p[0] + p[2] * uf + p[3] * vf;
                    let ry = (y + v) as f32 + p[1] + p[4] * uf + p[5] * vf;
                    let r = win.right.sample_bilinear(rx, ry, EdgeExtension::Zero);
                    let gx = win.grad_x.sample_bilinear(rx, ry, EdgeExtension::Zero);
                    let gy = win.grad_y.sample_bilinear(rx, ry, EdgeExtension::Zero);
                    lo = lo.min(l);
                    hi = hi.max(l);
                    samples.push(Sample {
                        residual: l - r,
                        jacobian: [gx, gy, gx * uf, gx * vf, gy * uf, gy * vf],
                        spatial: win.spatial[idx],
                    });
                    idx += 1;
                }
            }

            let variance_now = variance
                .unwrap_or_else(|| {
                    let (num, den) = samples.iter().fold((0.0f32, 0.0f32), |acc, s| {
                        (acc.0 + s.spatial * s.residual * s.residual, acc.1 + s.spatial)
                    });
                    if den > 0.0 {
                        num / den
                    } else {
                        0.0
                    }
                })
                .max(cfg.min_variance);
            let outlier_density = 1.0 / (hi - lo).max(1.0);
            let norm = 1.0 / (2.0 * std::f32::consts::PI * variance_now).sqrt();

            let mut h = Matrix6::<f64>::zeros();
            let mut g = Vector6::<f64>::zeros();
            let mut sum_spatial = 0.0f64;
            let mut sum_weight = 0.0f64;
            let mut sum_weighted_sq = 0.0f64;
            for s in samples.iter() {
                let inlier =
                    prior * norm * (-0.5 * s.residual * s.residual / variance_now).exp();
                let outlier = (1.0 - prior) * outlier_density;
                let total = inlier + outlier;
                let responsibility = if total > 0.0 { inlier / total } else { 0.0 };
                let w = f64::from(s.spatial * responsibility);
                let r = f64::from(s.residual);

                sum_spatial += f64::from(s.spatial);
                sum_weight += w;
                sum_weighted_sq += w * r * r;
                let j = Vector6::from_iterator(s.jacobian.iter().map(|&v| f64::from(v)));
                h += w * (j * j.transpose());
                g += w * (j * r);
            }
            if sum_weight <= 1e-9 || sum_spatial <= 0.0 {
                return None;
            }
            variance = Some(((sum_weighted_sq / sum_weight) as f32).max(cfg.min_variance));
            prior = ((sum_weight / sum_spatial) as f32).clamp(0.05, 0.99);

            for a in 0..PARAMS {
                if win.free[a] {
                    continue;
                }
                h.row_mut(a).fill(0.0);
                h.column_mut(a).fill(0.0);
                h[(a, a)] = 1.0;
                g[a] = 0.0;
            }

            let delta = h.lu().solve(&g)?;
            if delta.iter().any(|v| !v.is_finite()) {
                return None;
            }
            for (param, step) in p.iter_mut().zip(delta.iter()) {
                *param += *step as f32;
            }

            if p.iter().any(|v| !v.is_finite()) {
                return None;
            }
            let drift = ((p[0] - start.0).powi(2) + (p[1] - start.1).powi(2)).sqrt();
            if drift > cfg.max_drift {
                return None;
            }
            if p[2..].iter().any(|v| v.abs() > cfg.max_deformation) {
                return None;
            }
            if (delta[0].abs() as f32) < cfg.epsilon && (delta[1].abs() as f32) < cfg.epsilon {
                return Some((p[0], p[1]));
            }
        }
        None
    }
}

impl SubpixelKernel for AffineEmKernel {
    fn refine(
        &self,
        disparity: &mut DisparityMap,
        left: ImageView<'_, f32>,
        right: ImageView<'_, f32>,
        params: &RefineParams,
    ) -> SubpixelResult<RefineStats> {
        check_inputs(disparity, left, right, params)?;
        let _span = trace_span!(
            "refine",
            algorithm = "affine_em",
            width = left.width(),
            height = left.height()
        )
        .entered();

        let (hw, hh) = params.half_window();
        let region = params.region(left.width(), left.height());
        let mut stats = RefineStats::default();
        if region.is_empty() {
            return Ok(stats);
        }

        let (grad_x, grad_y) = central_gradients(right);
        let spatial = spatial_weights(hw, hh);
        let free = [
            params.horizontal,
            params.vertical,
            params.horizontal,
            params.horizontal,
            params.vertical,
            params.vertical,
        ];
        let win = Window {
            left,
            right,
            grad_x: grad_x.view(),
            grad_y: grad_y.view(),
            hw,
            hh,
            spatial: &spatial,
            free,
        };
        let mut samples = Vec::with_capacity(spatial.len());

        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                let Some(cell) = disparity.get_mut(x as usize, y as usize) else {
                    continue;
                };
                if !cell.valid {
                    continue;
                }
                stats.visited += 1;
                if !params.horizontal && !params.vertical {
                    continue;
                }

                match self.refine_pixel(&win, x, y, (cell.dx, cell.dy), &mut samples) {
                    Some((dx, dy)) => {
                        cell.dx = dx;
                        cell.dy = dy;
                        stats.refined += 1;
                    }
                    None => {
                        cell.invalidate();
                        stats.invalidated += 1;
                    }
                }
            }
        }

        if params.verbose {
            trace_event!(
                "refine_stats",
                algorithm = "affine_em",
                visited = stats.visited,
                refined = stats.refined,
                invalidated = stats.invalidated
            );
        }
        Ok(stats)
    }
}

/// Central-difference gradients with zero edge extension.
fn central_gradients(image: ImageView<'_, f32>) -> (Image<f32>, Image<f32>) {
    let (width, height) = image.dims();
    let at = |x: i32, y: i32| image.get_extended(x, y, EdgeExtension::Zero);
    let gx = Image::from_fn(width, height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        0.5 * (at(x + 1, y) - at(x - 1, y))
    });
    let gy = Image::from_fn(width, height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        0.5 * (at(x, y + 1) - at(x, y - 1))
    });
    (gx, gy)
}

/// Gaussian window weights in row-major order, sigma half the window size.
fn spatial_weights(hw: i32, hh: i32) -> Vec<f32> {
    let sx = (hw as f32 + 0.5).max(0.5);
    let sy = (hh as f32 + 0.5).max(0.5);
    let mut weights = Vec::with_capacity(((2 * hw + 1) * (2 * hh + 1)) as usize);
    for v in -hh..=hh {
        for u in -hw..=hw {
            let (uf, vf) = (u as f32, v as f32);
            weights.push((-0.5 * (uf * uf / (sx * sx) + vf * vf / (sy * sy))).exp());
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::{spatial_weights, AffineEmConfig, AffineEmKernel};
    use crate::disparity::{Disparity, DisparityMap};
    use crate::image::{BBox2i, Image};
    use crate::kernel::{RefineParams, SubpixelKernel};

    fn texture(x: f32, y: f32) -> f32 {
        100.0 + 40.0 * (0.35 * x).sin() + 30.0 * (0.27 * y).cos() + 20.0 * (0.19 * (x + y)).sin()
    }

    fn params() -> RefineParams {
        RefineParams {
            kernel_width: 9,
            kernel_height: 9,
            horizontal: true,
            vertical: true,
            roi: Some(BBox2i::new(10, 10, 20, 20)),
            verbose: false,
        }
    }

    #[test]
    fn recovers_fractional_shift() {
        let (w, h) = (40, 40);
        let left = Image::from_fn(w, h, |x, y| texture(x as f32, y as f32));
        let right = Image::from_fn(w, h, |x, y| texture(x as f32 - 1.4, y as f32 + 0.6));
        let mut disparity = DisparityMap::filled(w, h, Disparity::new(1.0, -1.0));

        let stats = AffineEmKernel::default()
            .refine(&mut disparity, left.view(), right.view(), &params())
            .unwrap();
        assert_eq!(stats.visited, 400);
        assert_eq!(stats.invalidated, 0);
        for y in 10..30 {
            for x in 10..30 {
                let d = disparity.get(x, y).unwrap();
                assert!(d.valid);
                assert!((d.dx - 1.4).abs() < 0.05, "dx {} at ({x}, {y})", d.dx);
                assert!((d.dy + 0.6).abs() < 0.05, "dy {} at ({x}, {y})", d.dy);
            }
        }
    }

    #[test]
    fn disabled_axis_stays_frozen() {
        let (w, h) = (40, 40);
        let left = Image::from_fn(w, h, |x, y| texture(x as f32, y as f32));
        let right = Image::from_fn(w, h, |x, y| texture(x as f32 - 1.4, y as f32));
        let mut disparity = DisparityMap::filled(w, h, Disparity::new(1.0, 0.0));
        let mut p = params();
        p.vertical = false;

        let stats = AffineEmKernel::default()
            .refine(&mut disparity, left.view(), right.view(), &p)
            .unwrap();
        assert_eq!(stats.invalidated, 0);
        let d = disparity.get(20, 20).unwrap();
        assert!((d.dx - 1.4).abs() < 0.05, "dx {}", d.dx);
        assert_eq!(d.dy, 0.0);
    }

    #[test]
    fn textureless_window_is_invalidated() {
        let left = Image::filled(24, 24, 50.0f32);
        let right = Image::filled(24, 24, 50.0f32);
        let mut disparity = DisparityMap::filled(24, 24, Disparity::new(0.0, 0.0));
        let mut p = params();
        p.roi = Some(BBox2i::new(10, 10, 2, 2));
        let stats = AffineEmKernel::default()
            .refine(&mut disparity, left.view(), right.view(), &p)
            .unwrap();
        assert_eq!(stats.invalidated, 4);
        assert!(!disparity.get(10, 10).unwrap().valid);
        assert!(disparity.get(0, 0).unwrap().valid);
    }

    #[test]
    fn zero_iteration_budget_invalidates() {
        let left = Image::from_fn(24, 24, |x, y| texture(x as f32, y as f32));
        let mut disparity = DisparityMap::filled(24, 24, Disparity::new(0.0, 0.0));
        let kernel = AffineEmKernel::new(AffineEmConfig {
            max_iterations: 0,
            ..AffineEmConfig::default()
        });
        let mut p = params();
        p.roi = Some(BBox2i::new(10, 10, 1, 1));
        kernel
            .refine(&mut disparity, left.view(), left.view(), &p)
            .unwrap();
        assert!(!disparity.get(10, 10).unwrap().valid);
    }

    #[test]
    fn spatial_weights_peak_at_centre() {
        let w = spatial_weights(2, 1);
        assert_eq!(w.len(), 15);
        assert!((w[7] - 1.0).abs() < 1e-6);
        assert!(w[0] < w[7]);
    }
}
