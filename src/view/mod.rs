//! Tiled, lazily evaluated subpixel refinement view.
//!
//! [`SubpixelView`] borrows the seed disparity map and the two source images
//! and refines disparity one output tile at a time. Evaluation is split into
//! [`SubpixelView::prepare`], which computes a [`Tile`] without side effects,
//! and [`SubpixelView::write`], which copies it into any [`DisparitySink`].
//! Tiles are independent, so they can be computed in any order or in
//! parallel.
//!
//! Per tile the view:
//! 1. estimates the seed's disparity range inside the tile (no valid seed
//!    means an empty range, not an error);
//! 2. crops the right image over the tile shifted by that range and the left
//!    image over an equally sized box at the tile corner, both grown by half
//!    the kernel plus [`PROBE_MARGIN`], reading zeros outside the images;
//! 3. filters both crops, shifts the seed into crop-local coordinates and
//!    builds image and disparity pyramids;
//! 4. refines coarse to fine, upsampling between levels;
//! 5. merges the propagated estimate with the seed, refines once more at full
//!    resolution and shifts back to image coordinates.

use crate::disparity::{
    disparity_range, downsample_disparity, merge_disparity, translate_disparity,
    upsample_disparity, Disparity, DisparityMap, MergePolicy, DEFAULT_QUORUM,
};
use crate::filter::PreprocessFilter;
use crate::image::pyramid::{ImagePyramid, DEFAULT_PYRAMID_SIGMA};
use crate::image::{BBox2i, EdgeExtension, ImageView};
use crate::kernel::{
    AffineEmConfig, AffineEmKernel, Algorithm, ParabolaConfig, ParabolaKernel, RefineParams,
    RefineStats, SubpixelKernel,
};
use crate::trace::{trace_event, trace_span};
use crate::util::{SubpixelError, SubpixelResult};

#[cfg(feature = "rayon")]
mod rayon;
mod tile;

pub use tile::{DisparitySink, Tile};

/// Extra crop margin covering the one-pixel cost probes around an estimate.
pub const PROBE_MARGIN: i32 = 1;

/// Configuration for a refinement view.
#[derive(Clone, Copy, Debug)]
pub struct SubpixelConfig {
    /// Correlation window width in pixels.
    pub kernel_width: usize,
    /// Correlation window height in pixels.
    pub kernel_height: usize,
    /// Refine the horizontal disparity component.
    pub horizontal: bool,
    /// Refine the vertical disparity component.
    pub vertical: bool,
    pub algorithm: Algorithm,
    /// Number of reduced pyramid levels below full resolution.
    pub pyramid_levels: usize,
    /// Blur applied before each decimation.
    pub pyramid_sigma: f32,
    /// Valid neighbours needed for a decimated disparity cell.
    pub quorum: usize,
    pub merge_policy: MergePolicy,
    pub parabola: ParabolaConfig,
    pub affine_em: AffineEmConfig,
    /// Emit per-pass refinement statistics.
    pub verbose: bool,
}

impl Default for SubpixelConfig {
    fn default() -> Self {
        Self {
            kernel_width: 7,
            kernel_height: 7,
            horizontal: true,
            vertical: true,
            algorithm: Algorithm::default(),
            pyramid_levels: 2,
            pyramid_sigma: DEFAULT_PYRAMID_SIGMA,
            quorum: DEFAULT_QUORUM,
            merge_policy: MergePolicy::default(),
            parabola: ParabolaConfig::default(),
            affine_em: AffineEmConfig::default(),
            verbose: false,
        }
    }
}

impl SubpixelConfig {
    fn refine_params(&self, roi: BBox2i) -> RefineParams {
        RefineParams {
            kernel_width: self.kernel_width,
            kernel_height: self.kernel_height,
            horizontal: self.horizontal,
            vertical: self.vertical,
            roi: Some(roi),
            verbose: self.verbose,
        }
    }

    fn crop_margin(&self) -> (i32, i32) {
        (
            (self.kernel_width / 2) as i32 + PROBE_MARGIN,
            (self.kernel_height / 2) as i32 + PROBE_MARGIN,
        )
    }
}

/// Lazy subpixel refinement over borrowed stereo inputs.
#[derive(Clone, Debug)]
pub struct SubpixelView<'a, F> {
    disparity: ImageView<'a, Disparity>,
    left: ImageView<'a, f32>,
    right: ImageView<'a, f32>,
    config: SubpixelConfig,
    filter: F,
}

impl<'a, F: PreprocessFilter> SubpixelView<'a, F> {
    /// Creates a view, validating the inputs up front.
    ///
    /// Left, right and seed must share dimensions, the images must be single
    /// channel and single plane, and the kernel must be non-empty.
    pub fn new(
        disparity: ImageView<'a, Disparity>,
        left: ImageView<'a, f32>,
        right: ImageView<'a, f32>,
        config: SubpixelConfig,
        filter: F,
    ) -> SubpixelResult<Self> {
        if left.dims() != right.dims() {
            return Err(SubpixelError::DimensionMismatch {
                what: "right image",
                expected: left.dims(),
                got: right.dims(),
            });
        }
        if disparity.dims() != left.dims() {
            return Err(SubpixelError::DimensionMismatch {
                what: "seed disparity",
                expected: left.dims(),
                got: disparity.dims(),
            });
        }
        for (channels, planes) in [
            (left.channels(), left.planes()),
            (right.channels(), right.planes()),
            (disparity.channels(), disparity.planes()),
        ] {
            if channels != 1 || planes != 1 {
                return Err(SubpixelError::UnsupportedFormat { channels, planes });
            }
        }
        if config.kernel_width == 0 || config.kernel_height == 0 {
            return Err(SubpixelError::InvalidKernel {
                width: config.kernel_width,
                height: config.kernel_height,
            });
        }
        Ok(Self {
            disparity,
            left,
            right,
            config,
            filter,
        })
    }

    pub fn width(&self) -> usize {
        self.left.width()
    }

    pub fn height(&self) -> usize {
        self.left.height()
    }

    /// Returns the box covering the whole view.
    pub fn bbox(&self) -> BBox2i {
        self.left.bbox()
    }

    pub fn config(&self) -> &SubpixelConfig {
        &self.config
    }

    /// Computes the refined tile covering `bbox`.
    ///
    /// `bbox` may extend past the view; pixels outside it come out invalid
    /// or best effort. An empty box is rejected.
    pub fn prepare(&self, bbox: BBox2i) -> SubpixelResult<Tile> {
        if bbox.is_empty() {
            return Err(SubpixelError::InvalidBBox {
                min_x: bbox.min_x,
                min_y: bbox.min_y,
                max_x: bbox.max_x,
                max_y: bbox.max_y,
            });
        }
        let _span = trace_span!(
            "prepare_tile",
            x = bbox.min_x,
            y = bbox.min_y,
            width = bbox.width(),
            height = bbox.height()
        )
        .entered();

        let range = disparity_range(
            self.disparity
                .crop_extended(bbox, EdgeExtension::Zero)
                .view(),
        );
        let (limit_x, limit_y) = self.search_limit();
        let range = range.clamp(limit_x, limit_y);
        let search = range.unwrap_or_empty();
        trace_event!(
            "search_range",
            empty = range.is_empty(),
            min_x = search.min_x,
            min_y = search.min_y,
            max_x = search.max_x,
            max_y = search.max_y
        );

        let (mx, my) = self.config.crop_margin();
        let right_box = BBox2i::from_corners(
            (bbox.min_x + search.min_x, bbox.min_y + search.min_y),
            (bbox.max_x + search.max_x, bbox.max_y + search.max_y),
        );
        let left_box = bbox
            .with_size(right_box.width(), right_box.height())
            .expand(mx, my);
        let right_box = right_box.expand(mx, my);

        let left_tile = self
            .filter
            .apply(self.left.crop_extended(left_box, EdgeExtension::Zero));
        let right_tile = self
            .filter
            .apply(self.right.crop_extended(right_box, EdgeExtension::Zero));
        let mut seed = self.disparity.crop_extended(left_box, EdgeExtension::Zero);

        // Output pixels sit one margin into the crops.
        let output = BBox2i::new(mx, my, bbox.width(), bbox.height());
        if self.config.algorithm == Algorithm::PassThrough {
            return Ok(Tile::new(
                bbox,
                seed.crop_extended(output, EdgeExtension::Zero),
            ));
        }

        translate_disparity(&mut seed, -search.min_x as f32, -search.min_y as f32);

        let levels = self.config.pyramid_levels;
        let sigma = self.config.pyramid_sigma;
        let left_pyramid = ImagePyramid::build(left_tile, levels, sigma);
        let right_pyramid = ImagePyramid::build(right_tile, levels, sigma);
        let pairs: Vec<_> = left_pyramid
            .levels()
            .iter()
            .zip(right_pyramid.levels())
            .collect();

        let mut estimate = seed.clone();
        for _ in 1..pairs.len() {
            estimate = downsample_disparity(&estimate, self.config.quorum);
        }
        for level in (1..pairs.len()).rev() {
            let _level_span = trace_span!("pyramid_level", level = level).entered();
            let (left, right) = pairs[level];
            let roi = output.downscale(level as u32).expand(1, 1);
            self.refine(&mut estimate, left.view(), right.view(), roi)?;
            let (width, height) = pairs[level - 1].0.dims();
            estimate = upsample_disparity(&estimate, width, height);
        }

        debug_assert_eq!(estimate.dims(), seed.dims());
        let mut merged = merge_disparity(&estimate, &seed, self.config.merge_policy)?;
        let (left, right) = pairs[0];
        self.refine(&mut merged, left.view(), right.view(), output)?;
        translate_disparity(&mut merged, search.min_x as f32, search.min_y as f32);

        Ok(Tile::new(
            bbox,
            merged.crop_extended(output, EdgeExtension::Zero),
        ))
    }

    /// Computes the refined disparity covering `bbox`.
    pub fn compute(&self, bbox: BBox2i) -> SubpixelResult<DisparityMap> {
        self.prepare(bbox).map(Tile::into_disparity)
    }

    /// Copies a prepared tile into `dest`.
    pub fn write<S: DisparitySink + ?Sized>(&self, tile: &Tile, dest: &mut S) -> SubpixelResult<()> {
        dest.write_tile(tile)
    }

    /// Computes `bbox` and writes it into `dest`.
    pub fn rasterize<S: DisparitySink + ?Sized>(
        &self,
        bbox: BBox2i,
        dest: &mut S,
    ) -> SubpixelResult<()> {
        let tile = self.prepare(bbox)?;
        self.write(&tile, dest)
    }

    /// Refines the whole view tile by tile.
    pub fn rasterize_tiled(
        &self,
        tile_width: usize,
        tile_height: usize,
    ) -> SubpixelResult<DisparityMap> {
        let mut out = DisparityMap::new(self.width(), self.height());
        for bbox in self.bbox().tiles(tile_width, tile_height) {
            self.rasterize(bbox, &mut out)?;
        }
        Ok(out)
    }

    /// Largest disparity magnitude per axis that can still land on image data.
    fn search_limit(&self) -> (i32, i32) {
        let cap = (i32::MAX / 4) as usize;
        (
            (self.left.width() + self.config.kernel_width).min(cap) as i32,
            (self.left.height() + self.config.kernel_height).min(cap) as i32,
        )
    }

    fn refine(
        &self,
        disparity: &mut DisparityMap,
        left: ImageView<'_, f32>,
        right: ImageView<'_, f32>,
        roi: BBox2i,
    ) -> SubpixelResult<RefineStats> {
        let params = self.config.refine_params(roi);
        match self.config.algorithm {
            Algorithm::PassThrough => Ok(RefineStats::default()),
            Algorithm::Parabola => {
                ParabolaKernel::new(self.config.parabola).refine(disparity, left, right, &params)
            }
            Algorithm::AffineEm => {
                AffineEmKernel::new(self.config.affine_em).refine(disparity, left, right, &params)
            }
        }
    }
}
