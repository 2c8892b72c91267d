//! Subpixel correlation kernels.
//!
//! Both refinement algorithms share one contract: given a disparity estimate
//! and equally sized left/right windows they update the estimate in place,
//! invalidating pixels whose local fit fails. Left pixel `p` corresponds to
//! right pixel `p + d`.

use crate::disparity::DisparityMap;
use crate::image::{BBox2i, ImageView};
use crate::util::{SubpixelError, SubpixelResult};

pub mod affine_em;
pub mod parabola;
pub(crate) mod scalar;

#[cfg(feature = "simd")]
pub(crate) mod simd;

pub use affine_em::{AffineEmConfig, AffineEmKernel};
pub use parabola::{ParabolaConfig, ParabolaKernel};

/// Refinement algorithm selector.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Return the seed disparity without refinement.
    PassThrough,
    /// Parabola vertex fit on a 1D SSD profile per axis.
    #[default]
    Parabola,
    /// EM-weighted local affine warp estimation.
    AffineEm,
}

impl Algorithm {
    /// Returns the integer selector used by configuration files.
    pub fn selector(self) -> i32 {
        match self {
            Algorithm::PassThrough => 0,
            Algorithm::Parabola => 1,
            Algorithm::AffineEm => 2,
        }
    }
}

impl TryFrom<i32> for Algorithm {
    type Error = SubpixelError;

    fn try_from(selector: i32) -> SubpixelResult<Self> {
        match selector {
            0 => Ok(Algorithm::PassThrough),
            1 => Ok(Algorithm::Parabola),
            2 => Ok(Algorithm::AffineEm),
            _ => Err(SubpixelError::UnsupportedAlgorithm { selector }),
        }
    }
}

/// Per-call refinement parameters shared by every kernel.
#[derive(Clone, Copy, Debug)]
pub struct RefineParams {
    /// Correlation window width in pixels.
    pub kernel_width: usize,
    /// Correlation window height in pixels.
    pub kernel_height: usize,
    /// Refine the horizontal component.
    pub horizontal: bool,
    /// Refine the vertical component.
    pub vertical: bool,
    /// Only pixels inside this box are refined; others pass through.
    pub roi: Option<BBox2i>,
    /// Emit per-call statistics.
    pub verbose: bool,
}

impl RefineParams {
    pub(crate) fn half_window(&self) -> (i32, i32) {
        ((self.kernel_width / 2) as i32, (self.kernel_height / 2) as i32)
    }

    pub(crate) fn region(&self, width: usize, height: usize) -> BBox2i {
        let full = BBox2i::from_size(width, height);
        match self.roi {
            Some(roi) => full.intersect(&roi),
            None => full,
        }
    }
}

/// Outcome counters for one refinement call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefineStats {
    /// Valid pixels visited.
    pub visited: usize,
    /// Pixels whose estimate was updated.
    pub refined: usize,
    /// Pixels invalidated by a failed fit.
    pub invalidated: usize,
}

/// Kernel trait for in-place disparity refinement.
pub trait SubpixelKernel {
    /// Refines `disparity` against the `left`/`right` windows.
    fn refine(
        &self,
        disparity: &mut DisparityMap,
        left: ImageView<'_, f32>,
        right: ImageView<'_, f32>,
        params: &RefineParams,
    ) -> SubpixelResult<RefineStats>;
}

pub(crate) fn check_inputs(
    disparity: &DisparityMap,
    left: ImageView<'_, f32>,
    right: ImageView<'_, f32>,
    params: &RefineParams,
) -> SubpixelResult<()> {
    if params.kernel_width == 0 || params.kernel_height == 0 {
        return Err(SubpixelError::InvalidKernel {
            width: params.kernel_width,
            height: params.kernel_height,
        });
    }
    if left.dims() != right.dims() {
        return Err(SubpixelError::DimensionMismatch {
            what: "right window",
            expected: left.dims(),
            got: right.dims(),
        });
    }
    if disparity.dims() != left.dims() {
        return Err(SubpixelError::DimensionMismatch {
            what: "disparity window",
            expected: left.dims(),
            got: disparity.dims(),
        });
    }
    Ok(())
}
