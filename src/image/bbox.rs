//! Integer bounding boxes used for tile addressing and disparity ranges.
//!
//! `BBox2i` follows the half-open convention: `min` is inclusive and `max` is
//! exclusive, so `width = max_x - min_x`. Coordinates are signed because tile
//! crops expanded by kernel margins or shifted by disparity ranges routinely
//! extend past the image origin.

/// Half-open integer rectangle `[min_x, max_x) x [min_y, max_y)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BBox2i {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BBox2i {
    /// Creates a box from its top-left corner and size.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    /// Creates a box from its corners (`max` exclusive).
    pub const fn from_corners(min: (i32, i32), max: (i32, i32)) -> Self {
        Self {
            min_x: min.0,
            min_y: min.1,
            max_x: max.0,
            max_y: max.1,
        }
    }

    /// Returns the box covering a whole `width x height` image.
    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, clamp_i32(width), clamp_i32(height))
    }

    /// Returns the inclusive top-left corner.
    pub fn min(&self) -> (i32, i32) {
        (self.min_x, self.min_y)
    }

    /// Returns the exclusive bottom-right corner.
    pub fn max(&self) -> (i32, i32) {
        (self.max_x, self.max_y)
    }

    /// Width in pixels, zero for inverted boxes.
    pub fn width(&self) -> i32 {
        (self.max_x - self.min_x).max(0)
    }

    /// Height in pixels, zero for inverted boxes.
    pub fn height(&self) -> i32 {
        (self.max_y - self.min_y).max(0)
    }

    /// Returns `(width, height)`.
    pub fn size(&self) -> (i32, i32) {
        (self.width(), self.height())
    }

    /// Returns `(width, height)` as unsigned sizes.
    pub fn dims(&self) -> (usize, usize) {
        (self.width() as usize, self.height() as usize)
    }

    /// Returns true if the box covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns true if `(x, y)` lies inside the box.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Returns true if `other` lies entirely inside the box.
    pub fn contains_box(&self, other: &BBox2i) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// Shifts the box by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    /// Grows the box by `mx` columns on the left and right and `my` rows on
    /// the top and bottom.
    pub fn expand(&self, mx: i32, my: i32) -> Self {
        Self {
            min_x: self.min_x - mx,
            min_y: self.min_y - my,
            max_x: self.max_x + mx,
            max_y: self.max_y + my,
        }
    }

    /// Keeps the top-left corner and replaces the size.
    pub fn with_size(&self, width: i32, height: i32) -> Self {
        Self::new(self.min_x, self.min_y, width, height)
    }

    /// Returns the overlap of two boxes (possibly empty).
    pub fn intersect(&self, other: &BBox2i) -> Self {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        Self {
            min_x,
            min_y,
            max_x: self.max_x.min(other.max_x).max(min_x),
            max_y: self.max_y.min(other.max_y).max(min_y),
        }
    }

    /// Returns a scaled-down copy covering every pixel of `self` at a level
    /// `2^level` times coarser.
    pub fn downscale(&self, level: u32) -> Self {
        let f = 1i32 << level;
        Self {
            min_x: self.min_x.div_euclid(f),
            min_y: self.min_y.div_euclid(f),
            max_x: (self.max_x + f - 1).div_euclid(f),
            max_y: (self.max_y + f - 1).div_euclid(f),
        }
    }

    /// Splits the box into row-major tiles of at most `tile_w x tile_h`.
    ///
    /// Zero tile sizes are treated as one pixel.
    pub fn tiles(&self, tile_w: usize, tile_h: usize) -> impl Iterator<Item = BBox2i> {
        let tw = clamp_i32(tile_w.max(1));
        let th = clamp_i32(tile_h.max(1));
        let outer = *self;
        let ys = (outer.min_y..outer.max_y).step_by(th as usize);
        ys.flat_map(move |y| {
            (outer.min_x..outer.max_x)
                .step_by(tw as usize)
                .map(move |x| {
                    BBox2i::from_corners((x, y), ((x + tw).min(outer.max_x), (y + th).min(outer.max_y)))
                })
        })
    }
}

pub(crate) fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::BBox2i;

    #[test]
    fn size_and_containment_follow_half_open_convention() {
        let bbox = BBox2i::new(2, 3, 4, 5);
        assert_eq!(bbox.max(), (6, 8));
        assert_eq!(bbox.size(), (4, 5));
        assert!(bbox.contains(2, 3));
        assert!(!bbox.contains(6, 3));
        assert!(!bbox.contains(2, 8));
        assert!(BBox2i::new(0, 0, 0, 3).is_empty());
    }

    #[test]
    fn expand_adds_margin_on_every_side() {
        let bbox = BBox2i::new(10, 10, 4, 4).expand(3, 1);
        assert_eq!(bbox, BBox2i::from_corners((7, 9), (17, 15)));
        assert_eq!(bbox.size(), (10, 6));
    }

    #[test]
    fn intersect_of_disjoint_boxes_is_empty() {
        let a = BBox2i::new(0, 0, 4, 4);
        let b = BBox2i::new(10, 10, 4, 4);
        assert!(a.intersect(&b).is_empty());
        let c = BBox2i::new(2, 1, 4, 4);
        assert_eq!(a.intersect(&c), BBox2i::from_corners((2, 1), (4, 4)));
    }

    #[test]
    fn downscale_covers_original_pixels() {
        let bbox = BBox2i::from_corners((3, 3), (9, 10));
        assert_eq!(bbox.downscale(1), BBox2i::from_corners((1, 1), (5, 5)));
        assert_eq!(
            BBox2i::from_corners((-3, 0), (1, 1)).downscale(1),
            BBox2i::from_corners((-2, 0), (1, 1))
        );
    }

    #[test]
    fn tiles_cover_box_without_overlap() {
        let bbox = BBox2i::new(1, 2, 10, 7);
        let tiles: Vec<_> = bbox.tiles(4, 3).collect();
        assert_eq!(tiles.len(), 3 * 3);
        let area: i32 = tiles.iter().map(|t| t.width() * t.height()).sum();
        assert_eq!(area, 70);
        assert_eq!(tiles[0], BBox2i::new(1, 2, 4, 3));
        assert_eq!(tiles[8], BBox2i::from_corners((9, 8), (11, 9)));
    }
}
