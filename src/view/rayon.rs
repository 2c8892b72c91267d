//! Rayon-parallel tile rasterization (feature-gated).
//!
//! Tiles are prepared on the rayon pool and written sequentially, so the
//! result matches [`SubpixelView::rasterize_tiled`] exactly.

use rayon::prelude::*;

use crate::disparity::DisparityMap;
use crate::filter::PreprocessFilter;
use crate::util::SubpixelResult;
use crate::view::{DisparitySink, SubpixelView, Tile};

impl<F: PreprocessFilter + Sync> SubpixelView<'_, F> {
    /// Refines the whole view, preparing tiles in parallel.
    pub fn par_rasterize_tiled(
        &self,
        tile_width: usize,
        tile_height: usize,
    ) -> SubpixelResult<DisparityMap> {
        let boxes: Vec<_> = self.bbox().tiles(tile_width, tile_height).collect();
        let tiles: Vec<Tile> = boxes
            .into_par_iter()
            .map(|bbox| self.prepare(bbox))
            .collect::<SubpixelResult<_>>()?;

        let mut out = DisparityMap::new(self.width(), self.height());
        for tile in &tiles {
            out.write_tile(tile)?;
        }
        Ok(out)
    }
}
