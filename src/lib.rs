//! Subpixel is a tiled, lazily evaluated stereo disparity refiner.
//!
//! Given an integer seed disparity map and a rectified stereo pair, a
//! [`SubpixelView`] refines disparity to sub-pixel accuracy one output tile at
//! a time. Each tile is refined coarse to fine over a small image pyramid with
//! either a parabola fit of the correlation cost or an EM-weighted affine
//! warp estimate. Tiles are independent; the `rayon` feature adds parallel
//! rasterization and `simd` vectorises the window costs.

pub mod backend;
pub mod disparity;
pub mod filter;
pub mod image;
pub mod kernel;
mod refine;
mod trace;
pub mod util;
pub mod view;

pub use backend::{AcceleratedFilter, BackendContext, BackendSettings, ShaderLanguage};
pub use disparity::{
    disparity_range, downsample_disparity, merge_disparity, upsample_disparity, Disparity,
    DisparityMap, MergePolicy, SearchRange,
};
pub use filter::{LaplacianOfGaussian, NullFilter, PreprocessFilter, SignOfLog, SubtractedMean};
pub use image::pyramid::{downsample, ImagePyramid};
pub use image::{BBox2i, EdgeExtension, Image, ImageView};
pub use kernel::{
    AffineEmConfig, AffineEmKernel, Algorithm, ParabolaConfig, ParabolaKernel, RefineParams,
    RefineStats, SubpixelKernel,
};
pub use util::{SubpixelError, SubpixelResult};
pub use view::{DisparitySink, SubpixelConfig, SubpixelView, Tile};
