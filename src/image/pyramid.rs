//! Gaussian image pyramid construction for `f32` tiles.
//!
//! Each level is produced by a separable Gaussian blur followed by 2x
//! decimation. Decimated dimensions round up (`ceil(n / 2)`), so a level is
//! never empty and coarse pixel `i` sits over fine pixel `2 * i`. The blur
//! reads zero outside the tile, matching the zero edge extension used when the
//! tile was cropped.

use crate::image::{EdgeExtension, Image};
use crate::util::math::gaussian_kernel_1d;

/// Smoothing applied before every decimation step.
pub const DEFAULT_PYRAMID_SIGMA: f32 = 1.4;

/// Separable Gaussian blur with zero edge extension.
pub fn gaussian_blur(image: &Image<f32>, sigma: f32) -> Image<f32> {
    let taps = gaussian_kernel_1d(sigma);
    if taps.len() == 1 {
        return image.clone();
    }
    let radius = (taps.len() / 2) as i32;
    let (width, height) = image.dims();

    let src = image.view();
    let horizontal = Image::from_fn(width, height, |x, y| {
        let mut acc = 0.0f32;
        for (k, &tap) in taps.iter().enumerate() {
            let sx = x as i32 + k as i32 - radius;
            acc += tap * src.get_extended(sx, y as i32, EdgeExtension::Zero);
        }
        acc
    });

    let tmp = horizontal.view();
    Image::from_fn(width, height, |x, y| {
        let mut acc = 0.0f32;
        for (k, &tap) in taps.iter().enumerate() {
            let sy = y as i32 + k as i32 - radius;
            acc += tap * tmp.get_extended(x as i32, sy, EdgeExtension::Zero);
        }
        acc
    })
}

/// Keeps every `factor`-th sample in both directions.
///
/// Output dimensions are `ceil(n / factor)`; a zero factor is treated as 1.
pub fn subsample<T: Copy + Default>(image: &Image<T>, factor: usize) -> Image<T> {
    let factor = factor.max(1);
    let (width, height) = image.dims();
    let out_w = width.div_ceil(factor);
    let out_h = height.div_ceil(factor);
    Image::from_fn(out_w, out_h, |x, y| {
        image
            .get(x * factor, y * factor)
            .copied()
            .unwrap_or_default()
    })
}

/// Blurs with `sigma` and decimates by two.
pub fn downsample_with_sigma(image: &Image<f32>, sigma: f32) -> Image<f32> {
    subsample(&gaussian_blur(image, sigma), 2)
}

/// Blurs with sigma 1.4 and decimates by two.
pub fn downsample(image: &Image<f32>) -> Image<f32> {
    downsample_with_sigma(image, DEFAULT_PYRAMID_SIGMA)
}

/// Owned image pyramid built from a base level.
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    levels: Vec<Image<f32>>,
}

impl ImagePyramid {
    /// Builds a pyramid with the base tile plus `coarse_levels` reduced levels.
    pub fn build(base: Image<f32>, coarse_levels: usize, sigma: f32) -> Self {
        let mut levels = Vec::with_capacity(coarse_levels + 1);
        levels.push(base);
        for _ in 0..coarse_levels {
            let next = match levels.last() {
                Some(prev) => downsample_with_sigma(prev, sigma),
                None => break,
            };
            levels.push(next);
        }
        Self { levels }
    }

    /// Returns all levels (level 0 is the base resolution).
    pub fn levels(&self) -> &[Image<f32>] {
        &self.levels
    }

    /// Returns a specific level.
    pub fn level(&self, index: usize) -> Option<&Image<f32>> {
        self.levels.get(index)
    }

    /// Returns the number of levels including the base.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the pyramid has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
