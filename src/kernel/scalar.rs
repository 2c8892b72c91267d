//! Scalar reference window costs.

use crate::image::{EdgeExtension, ImageView};

#[cfg(feature = "simd")]
use crate::kernel::simd::ssd_row;

/// Sum of squared differences of two equally long rows.
#[cfg(not(feature = "simd"))]
#[inline]
pub(crate) fn ssd_row(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&l, &r)| {
            let diff = l - r;
            diff * diff
        })
        .sum()
}

/// SSD between the left window centred at `(x, y)` and the right window
/// centred at `(x + sx, y + sy)`, half-size `(hw, hh)`.
///
/// Windows fully inside both images take the row-slice fast path; any other
/// window reads through zero edge extension.
#[allow(clippy::too_many_arguments)]
pub(crate) fn window_ssd(
    left: ImageView<'_, f32>,
    right: ImageView<'_, f32>,
    x: i32,
    y: i32,
    sx: i32,
    sy: i32,
    hw: i32,
    hh: i32,
) -> f32 {
    let inside = |img: &ImageView<'_, f32>, cx: i32, cy: i32| {
        cx - hw >= 0
            && cy - hh >= 0
            && cx + hw < img.width() as i32
            && cy + hh < img.height() as i32
    };

    if inside(&left, x, y) && inside(&right, x + sx, y + sy) {
        let len = (2 * hw + 1) as usize;
        let lx = (x - hw) as usize;
        let rx = (x + sx - hw) as usize;
        let mut acc = 0.0f32;
        for v in -hh..=hh {
            let (Some(lrow), Some(rrow)) = (
                left.row((y + v) as usize),
                right.row((y + sy + v) as usize),
            ) else {
                return f32::INFINITY;
            };
            acc += ssd_row(&lrow[lx..lx + len], &rrow[rx..rx + len]);
        }
        return acc;
    }

    let mut acc = 0.0f32;
    for v in -hh..=hh {
        for u in -hw..=hw {
            let l = left.get_extended(x + u, y + v, EdgeExtension::Zero);
            let r = right.get_extended(x + sx + u, y + sy + v, EdgeExtension::Zero);
            let diff = l - r;
            acc += diff * diff;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::{ssd_row, window_ssd};
    use crate::image::Image;

    #[test]
    fn ssd_row_matches_manual_sum() {
        let a: Vec<f32> = (0..19).map(|v| v as f32).collect();
        let b: Vec<f32> = (0..19).map(|v| (v * 2) as f32).collect();
        let expected: f32 = (0..19).map(|v| (v * v) as f32).sum();
        assert!((ssd_row(&a, &b) - expected).abs() < 1e-3);
    }

    #[test]
    fn fast_and_extended_paths_agree() {
        let left = Image::from_fn(16, 16, |x, y| ((x * 7 + y * 3) % 11) as f32);
        let right = Image::from_fn(16, 16, |x, y| ((x * 5 + y * 2) % 13) as f32);
        let fast = window_ssd(left.view(), right.view(), 8, 8, 1, -1, 2, 2);

        let mut manual = 0.0f32;
        for v in -2..=2i32 {
            for u in -2..=2i32 {
                let l = *left.get((8 + u) as usize, (8 + v) as usize).unwrap();
                let r = *right.get((9 + u) as usize, (7 + v) as usize).unwrap();
                manual += (l - r) * (l - r);
            }
        }
        assert!((fast - manual).abs() < 1e-3);

        let border = window_ssd(left.view(), right.view(), 0, 0, 0, 0, 1, 1);
        assert!(border.is_finite());
    }
}
