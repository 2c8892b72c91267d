//! Mask-aware disparity decimation and interpolation.
//!
//! Disparities are stored in the pixel units of their own level, so
//! decimation halves the vectors and interpolation doubles them. Coarse cell
//! `i` sits over fine cell `2 * i`, the same alignment the image pyramid uses.

use crate::disparity::{Disparity, DisparityMap};
use crate::image::EdgeExtension;

/// Default minimum number of valid contributors for a decimated cell.
pub const DEFAULT_QUORUM: usize = 2;

const BINOMIAL_3: [f32; 3] = [1.0, 2.0, 1.0];

/// Decimates a disparity map by two.
///
/// Each coarse cell takes the `[1, 2, 1]^2`-weighted mean of the valid cells
/// in the 3x3 neighbourhood of fine cell `(2x, 2y)`. The cell is valid only
/// when at least `quorum` neighbours (clamped to `1..=9`) are valid.
pub fn downsample_disparity(disparity: &DisparityMap, quorum: usize) -> DisparityMap {
    let quorum = quorum.clamp(1, 9);
    let (width, height) = disparity.dims();
    let view = disparity.view();

    DisparityMap::from_fn(width.div_ceil(2), height.div_ceil(2), |x, y| {
        let cx = 2 * x as i32;
        let cy = 2 * y as i32;
        let mut sum = (0.0f32, 0.0f32);
        let mut weight = 0.0f32;
        let mut count = 0usize;
        for (j, wy) in BINOMIAL_3.iter().enumerate() {
            for (i, wx) in BINOMIAL_3.iter().enumerate() {
                let d = view.get_extended(cx + i as i32 - 1, cy + j as i32 - 1, EdgeExtension::Zero);
                if !d.valid || !d.dx.is_finite() || !d.dy.is_finite() {
                    continue;
                }
                let w = wx * wy;
                sum.0 += w * d.dx;
                sum.1 += w * d.dy;
                weight += w;
                count += 1;
            }
        }
        if count >= quorum && weight > 0.0 {
            Disparity::new(0.5 * sum.0 / weight, 0.5 * sum.1 / weight)
        } else {
            Disparity::invalid()
        }
    })
}

/// Interpolates a disparity map onto a grid twice as fine, cropped to
/// `target_width x target_height`.
///
/// Bilinear weights are renormalised over valid neighbours; reads past the
/// coarse border repeat the edge cell. A fine cell is invalid only when every
/// neighbour with non-zero weight is invalid.
pub fn upsample_disparity(
    disparity: &DisparityMap,
    target_width: usize,
    target_height: usize,
) -> DisparityMap {
    let view = disparity.view();

    DisparityMap::from_fn(target_width, target_height, |x, y| {
        let x0 = (x / 2) as i32;
        let y0 = (y / 2) as i32;
        let fx = if x % 2 == 1 { 0.5f32 } else { 0.0 };
        let fy = if y % 2 == 1 { 0.5f32 } else { 0.0 };
        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];

        let mut sum = (0.0f32, 0.0f32);
        let mut weight = 0.0f32;
        for (sx, sy, w) in taps {
            if w <= 0.0 {
                continue;
            }
            let d = view.get_extended(sx, sy, EdgeExtension::Constant);
            if !d.valid {
                continue;
            }
            sum.0 += w * d.dx;
            sum.1 += w * d.dy;
            weight += w;
        }
        if weight > 0.0 {
            Disparity::new(2.0 * sum.0 / weight, 2.0 * sum.1 / weight)
        } else {
            Disparity::invalid()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{downsample_disparity, upsample_disparity};
    use crate::disparity::{Disparity, DisparityMap};

    #[test]
    fn downsample_halves_constant_field() {
        let map = DisparityMap::filled(8, 6, Disparity::new(4.0, -2.0));
        let down = downsample_disparity(&map, 2);
        assert_eq!(down.dims(), (4, 3));
        for d in down.data() {
            assert!(d.valid);
            assert!((d.dx - 2.0).abs() < 1e-6);
            assert!((d.dy + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn downsample_enforces_quorum() {
        let mut map = DisparityMap::new(6, 6);
        *map.get_mut(2, 2).unwrap() = Disparity::new(2.0, 0.0);
        let lenient = downsample_disparity(&map, 1);
        assert!(lenient.get(1, 1).unwrap().valid);
        assert!((lenient.get(1, 1).unwrap().dx - 1.0).abs() < 1e-6);

        let strict = downsample_disparity(&map, 2);
        assert!(!strict.get(1, 1).unwrap().valid);
    }

    #[test]
    fn upsample_fills_from_valid_neighbours() {
        let mut coarse = DisparityMap::new(2, 1);
        *coarse.get_mut(0, 0).unwrap() = Disparity::new(1.0, 0.5);
        let fine = upsample_disparity(&coarse, 4, 2);
        assert_eq!(fine.dims(), (4, 2));
        assert_eq!(*fine.get(0, 0).unwrap(), Disparity::new(2.0, 1.0));
        assert_eq!(*fine.get(1, 1).unwrap(), Disparity::new(2.0, 1.0));
        assert!(!fine.get(2, 0).unwrap().valid);
    }
}
