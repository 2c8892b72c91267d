//! Preprocessing filters applied to both image tiles before correlation.
//!
//! A filter is any value with a single `apply(image) -> image` method; plain
//! closures qualify. Filters must be pure: the same tile always produces the
//! same output, so overlapping tiles agree.

use crate::image::pyramid::gaussian_blur;
use crate::image::{EdgeExtension, Image};

/// Image-to-image preprocessing contract.
pub trait PreprocessFilter {
    /// Filters one image tile.
    fn apply(&self, image: Image<f32>) -> Image<f32>;
}

impl<F> PreprocessFilter for F
where
    F: Fn(Image<f32>) -> Image<f32>,
{
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        self(image)
    }
}

/// Identity filter.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullFilter;

impl PreprocessFilter for NullFilter {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        image
    }
}

/// Laplacian of Gaussian.
#[derive(Copy, Clone, Debug)]
pub struct LaplacianOfGaussian {
    pub sigma: f32,
}

impl LaplacianOfGaussian {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl PreprocessFilter for LaplacianOfGaussian {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        laplacian(&gaussian_blur(&image, self.sigma))
    }
}

/// Sign of the Laplacian of Gaussian: `1` where positive, `0` elsewhere.
#[derive(Copy, Clone, Debug)]
pub struct SignOfLog {
    pub sigma: f32,
}

impl SignOfLog {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl PreprocessFilter for SignOfLog {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        LaplacianOfGaussian::new(self.sigma)
            .apply(image)
            .map(|&v| if v > 0.0 { 1.0 } else { 0.0 })
    }
}

/// Subtracts a Gaussian-weighted local mean.
#[derive(Copy, Clone, Debug)]
pub struct SubtractedMean {
    pub sigma: f32,
}

impl SubtractedMean {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl PreprocessFilter for SubtractedMean {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        let mean = gaussian_blur(&image, self.sigma);
        let mut out = image;
        for (v, m) in out.data_mut().iter_mut().zip(mean.data()) {
            *v -= m;
        }
        out
    }
}

/// 4-neighbour discrete Laplacian with zero edge extension.
fn laplacian(image: &Image<f32>) -> Image<f32> {
    let view = image.view();
    let (width, height) = image.dims();
    Image::from_fn(width, height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let at = |dx: i32, dy: i32| view.get_extended(x + dx, y + dy, EdgeExtension::Zero);
        at(-1, 0) + at(1, 0) + at(0, -1) + at(0, 1) - 4.0 * at(0, 0)
    })
}
