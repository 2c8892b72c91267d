//! Computed tiles and the destinations they are written into.

use crate::disparity::{Disparity, DisparityMap};
use crate::image::BBox2i;
use crate::util::{SubpixelError, SubpixelResult};

/// A refined disparity tile and the output box it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    bbox: BBox2i,
    disparity: DisparityMap,
}

impl Tile {
    pub(crate) fn new(bbox: BBox2i, disparity: DisparityMap) -> Self {
        debug_assert_eq!(bbox.dims(), disparity.dims());
        Self { bbox, disparity }
    }

    /// Output-space box covered by the tile.
    pub fn bbox(&self) -> BBox2i {
        self.bbox
    }

    pub fn disparity(&self) -> &DisparityMap {
        &self.disparity
    }

    pub fn into_disparity(self) -> DisparityMap {
        self.disparity
    }

    /// Reads the tile at output coordinates.
    pub fn get(&self, x: i32, y: i32) -> Option<&Disparity> {
        if !self.bbox.contains(x, y) {
            return None;
        }
        self.disparity
            .get((x - self.bbox.min_x) as usize, (y - self.bbox.min_y) as usize)
    }
}

/// Destination for computed tiles.
pub trait DisparitySink {
    /// Copies `tile` into the destination at the tile's output offset.
    fn write_tile(&mut self, tile: &Tile) -> SubpixelResult<()>;
}

/// Writes the part of the tile that falls inside the map; the rest is
/// dropped.
impl DisparitySink for DisparityMap {
    fn write_tile(&mut self, tile: &Tile) -> SubpixelResult<()> {
        let bbox = tile.bbox();
        if bbox.is_empty() {
            return Err(SubpixelError::InvalidBBox {
                min_x: bbox.min_x,
                min_y: bbox.min_y,
                max_x: bbox.max_x,
                max_y: bbox.max_y,
            });
        }
        let (width, height) = self.dims();
        let clipped = bbox.intersect(&BBox2i::from_size(width, height));
        for y in clipped.min_y..clipped.max_y {
            for x in clipped.min_x..clipped.max_x {
                let (Some(&value), Some(cell)) = (tile.get(x, y), self.get_mut(x as usize, y as usize))
                else {
                    continue;
                };
                *cell = value;
            }
        }
        Ok(())
    }
}
