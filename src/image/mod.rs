//! Image views, owned buffers and edge-extended addressing.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than `width * channels` represents padded rows. Views also
//! record the interleaved channel count and the number of stacked planes so
//! that callers can reject layouts the correlation engine does not handle;
//! all addressing reads channel 0 of plane 0.
//!
//! Reads outside the image bounds go through [`EdgeExtension`] and never
//! fault.

use crate::util::{SubpixelError, SubpixelResult};

pub mod bbox;
#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;

pub use bbox::BBox2i;

/// Policy for values read outside the image bounds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EdgeExtension {
    /// Out-of-bounds reads return `T::default()` (zero / invalid).
    #[default]
    Zero,
    /// Out-of-bounds reads return the nearest edge sample.
    Constant,
}

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
    channels: usize,
    planes: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous single-channel view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> SubpixelResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a single-channel view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> SubpixelResult<Self> {
        Self::with_layout(data, width, height, stride, 1, 1)
    }

    /// Creates a view over interleaved channels and stacked planes.
    ///
    /// Planes are stored back to back, each `stride * height` elements long.
    pub fn with_layout(
        data: &'a [T],
        width: usize,
        height: usize,
        stride: usize,
        channels: usize,
        planes: usize,
    ) -> SubpixelResult<Self> {
        if channels == 0 || planes == 0 {
            return Err(SubpixelError::UnsupportedFormat { channels, planes });
        }
        let needed = required_len(width, height, stride, channels, planes)?;
        if data.len() < needed {
            return Err(SubpixelError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            channels,
            planes,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the number of stacked planes.
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// Returns the box covering the whole view.
    pub fn bbox(&self) -> BBox2i {
        BBox2i::from_size(self.width, self.height)
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y
            .checked_mul(self.stride)?
            .checked_add(x.checked_mul(self.channels)?)?;
        self.data.get(idx)
    }

    /// Returns row `y` when the view is single-channel.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height || self.channels != 1 {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }
}

impl<'a, T: Copy + Default> ImageView<'a, T> {
    /// Reads `(x, y)` with signed coordinates, applying `ext` outside the
    /// image bounds.
    #[inline]
    pub fn get_extended(&self, x: i32, y: i32, ext: EdgeExtension) -> T {
        if x >= 0 && y >= 0 {
            if let Some(value) = self.get(x as usize, y as usize) {
                return *value;
            }
        }
        match ext {
            EdgeExtension::Zero => T::default(),
            EdgeExtension::Constant => {
                if self.width == 0 || self.height == 0 {
                    return T::default();
                }
                let cx = x.clamp(0, self.width as i32 - 1) as usize;
                let cy = y.clamp(0, self.height as i32 - 1) as usize;
                self.get(cx, cy).copied().unwrap_or_default()
            }
        }
    }

    /// Copies `bbox` into an owned image, edge-extending reads outside the
    /// view.
    pub fn crop_extended(&self, bbox: BBox2i, ext: EdgeExtension) -> Image<T> {
        let (width, height) = bbox.dims();
        let mut data = Vec::with_capacity(width * height);
        let inside = self.bbox().contains_box(&bbox) && self.channels == 1;
        for y in bbox.min_y..bbox.max_y {
            match (inside, self.row(y.max(0) as usize)) {
                (true, Some(row)) => {
                    let x0 = bbox.min_x as usize;
                    data.extend_from_slice(&row[x0..x0 + width]);
                }
                _ => {
                    for x in bbox.min_x..bbox.max_x {
                        data.push(self.get_extended(x, y, ext));
                    }
                }
            }
        }
        Image {
            data,
            width,
            height,
            channels: 1,
        }
    }

    /// Copies the view into an owned single-channel image.
    pub fn to_owned_image(&self) -> Image<T> {
        self.crop_extended(self.bbox(), EdgeExtension::Zero)
    }
}

impl ImageView<'_, f32> {
    /// Bilinearly interpolates the image at `(x, y)`.
    ///
    /// Corner reads outside the image follow `ext`; non-finite coordinates
    /// read as zero.
    #[inline]
    pub fn sample_bilinear(&self, x: f32, y: f32, ext: EdgeExtension) -> f32 {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (ix, iy) = (x0 as i32, y0 as i32);

        let p00 = self.get_extended(ix, iy, ext);
        let p10 = self.get_extended(ix.saturating_add(1), iy, ext);
        let p01 = self.get_extended(ix, iy.saturating_add(1), ext);
        let p11 = self.get_extended(ix.saturating_add(1), iy.saturating_add(1), ext);

        let top = p00 + fx * (p10 - p00);
        let bottom = p01 + fx * (p11 - p01);
        top + fy * (bottom - top)
    }
}

/// Owned contiguous image buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    channels: usize,
}

impl<T: Clone> Image<T> {
    /// Creates a `width x height` image filled with `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
            channels: 1,
        }
    }
}

impl<T: Clone + Default> Image<T> {
    /// Creates a `width x height` image filled with `T::default()`.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }
}

impl<T> Image<T> {
    /// Creates a single-channel image from a contiguous buffer.
    pub fn from_vec(data: Vec<T>, width: usize, height: usize) -> SubpixelResult<Self> {
        Self::from_interleaved(data, width, height, 1)
    }

    /// Creates an image from an interleaved multi-channel buffer.
    pub fn from_interleaved(
        data: Vec<T>,
        width: usize,
        height: usize,
        channels: usize,
    ) -> SubpixelResult<Self> {
        if channels == 0 {
            return Err(SubpixelError::UnsupportedFormat {
                channels,
                planes: 1,
            });
        }
        let row_len = width
            .checked_mul(channels)
            .ok_or(SubpixelError::InvalidDimensions { width, height })?;
        let needed = required_len(width, height, row_len, channels, 1)?;
        if data.len() != needed {
            return Err(SubpixelError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
            channels: 1,
        }
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width * self.channels,
            channels: self.channels,
            planes: 1,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the contiguous sample buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the contiguous sample buffer mutably.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the image and returns its buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Returns the sample at `(x, y)` (channel 0).
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) * self.channels)
    }

    /// Returns the sample at `(x, y)` mutably (channel 0).
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get_mut((y * self.width + x) * self.channels)
    }

    /// Applies `f` to every sample, producing a new image of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Image<U> {
        Image {
            data: self.data.iter().map(f).collect(),
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }
}

impl<T: Copy + Default> Image<T> {
    /// Copies `bbox` into a new image, edge-extending reads outside bounds.
    pub fn crop_extended(&self, bbox: BBox2i, ext: EdgeExtension) -> Image<T> {
        self.view().crop_extended(bbox, ext)
    }
}

fn required_len(
    width: usize,
    height: usize,
    stride: usize,
    channels: usize,
    planes: usize,
) -> SubpixelResult<usize> {
    if width == 0 || height == 0 {
        return Err(SubpixelError::InvalidDimensions { width, height });
    }
    let row_len = width
        .checked_mul(channels)
        .ok_or(SubpixelError::InvalidDimensions { width, height })?;
    if stride < row_len {
        return Err(SubpixelError::InvalidStride { row_len, stride });
    }
    let plane_len = height
        .checked_mul(stride)
        .ok_or(SubpixelError::InvalidDimensions { width, height })?;
    let needed = (planes - 1)
        .checked_mul(plane_len)
        .and_then(|v| v.checked_add((height - 1).checked_mul(stride)?))
        .and_then(|v| v.checked_add(row_len))
        .ok_or(SubpixelError::InvalidDimensions { width, height })?;
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::{BBox2i, EdgeExtension, Image, ImageView};

    #[test]
    fn zero_extension_returns_default_outside() {
        let img = Image::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let view = img.view();
        assert_eq!(view.get_extended(1, 1, EdgeExtension::Zero), 4.0);
        assert_eq!(view.get_extended(-1, 0, EdgeExtension::Zero), 0.0);
        assert_eq!(view.get_extended(0, 5, EdgeExtension::Zero), 0.0);
    }

    #[test]
    fn constant_extension_clamps_to_edge() {
        let img = Image::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let view = img.view();
        assert_eq!(view.get_extended(-3, -3, EdgeExtension::Constant), 1.0);
        assert_eq!(view.get_extended(7, 0, EdgeExtension::Constant), 2.0);
        assert_eq!(view.get_extended(7, 7, EdgeExtension::Constant), 4.0);
    }

    #[test]
    fn crop_extended_straddling_border_pads_with_zero() {
        let img = Image::from_fn(3, 3, |x, y| (y * 3 + x) as f32 + 1.0);
        let crop = img.crop_extended(BBox2i::new(-1, 1, 3, 3), EdgeExtension::Zero);
        assert_eq!(crop.dims(), (3, 3));
        assert_eq!(crop.data(), &[0.0, 4.0, 5.0, 0.0, 7.0, 8.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn crop_extended_inside_matches_rows() {
        let img = Image::from_fn(4, 4, |x, y| (y * 4 + x) as u8);
        let crop = img.crop_extended(BBox2i::new(1, 1, 2, 2), EdgeExtension::Zero);
        assert_eq!(crop.data(), &[5u8, 6, 9, 10]);
    }

    #[test]
    fn bilinear_sampling_interpolates_and_extends() {
        let img = Image::from_vec(vec![0.0f32, 2.0, 4.0, 6.0], 2, 2).unwrap();
        let view = img.view();
        assert!((view.sample_bilinear(0.5, 0.5, EdgeExtension::Zero) - 3.0).abs() < 1e-6);
        assert!((view.sample_bilinear(1.0, 0.0, EdgeExtension::Zero) - 2.0).abs() < 1e-6);
        assert!((view.sample_bilinear(1.5, 0.0, EdgeExtension::Zero) - 1.0).abs() < 1e-6);
        assert!((view.sample_bilinear(1.5, 0.0, EdgeExtension::Constant) - 2.0).abs() < 1e-6);
        assert_eq!(view.sample_bilinear(f32::NAN, 0.0, EdgeExtension::Zero), 0.0);
    }

    #[test]
    fn interleaved_view_reads_first_channel() {
        let data = vec![1u8, 9, 2, 9, 3, 9, 4, 9];
        let view = ImageView::with_layout(&data, 2, 2, 4, 2, 1).unwrap();
        assert_eq!(view.channels(), 2);
        assert_eq!(view.get(1, 1).copied(), Some(4));
        assert!(view.row(0).is_none());
    }
}
