//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::Image;
use crate::util::{SubpixelError, SubpixelResult};
use std::path::Path;

/// Converts a grayscale buffer into an `f32` image with raw intensity values.
pub fn image_from_gray(img: &image::GrayImage) -> SubpixelResult<Image<f32>> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.as_raw().iter().map(|&v| f32::from(v)).collect();
    Image::from_vec(data, width, height)
}

/// Converts a dynamic image preserving its channel layout.
///
/// Samples are normalised to `[0, 1]`.
///
/// Color images produce multi-channel buffers, which the refinement view
/// rejects; use [`load_gray_image`] for stereo inputs.
pub fn image_from_dynamic(img: &image::DynamicImage) -> SubpixelResult<Image<f32>> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let channels = usize::from(img.color().channel_count());
    let data = img.to_rgba32f().into_raw();
    let data = match channels {
        4 => data,
        2 => data.chunks_exact(4).flat_map(|px| [px[0], px[3]]).collect(),
        n => data
            .chunks_exact(4)
            .flat_map(|px| px[..n].iter().copied())
            .collect(),
    };
    Image::from_interleaved(data, width, height, channels)
}

/// Loads an image from disk and converts it to grayscale `f32`.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> SubpixelResult<Image<f32>> {
    let img = image::open(path).map_err(|err| SubpixelError::ImageIo {
        reason: err.to_string(),
    })?;
    image_from_gray(&img.to_luma8())
}
