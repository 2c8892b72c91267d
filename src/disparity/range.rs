//! Disparity range estimation for a tile of the seed disparity map.

use crate::disparity::Disparity;
use crate::image::{BBox2i, ImageView};

/// Range of disparity vectors found in a tile.
///
/// `Empty` is the explicit no-data marker for tiles without a single valid
/// vector; callers substitute a default instead of aborting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SearchRange {
    /// Integer box spanning every valid vector: `min = floor(min)`,
    /// `max = ceil(max)`. Unlike pixel boxes both corners are inclusive.
    Found(BBox2i),
    /// The tile contained no valid, finite vectors.
    Empty,
}

impl SearchRange {
    /// Returns the range, or the zero box at the origin for `Empty`.
    pub fn unwrap_or_empty(self) -> BBox2i {
        match self {
            SearchRange::Found(bbox) => bbox,
            SearchRange::Empty => BBox2i::default(),
        }
    }

    /// Returns true for the no-data marker.
    pub fn is_empty(&self) -> bool {
        matches!(self, SearchRange::Empty)
    }

    /// Limits both corners to `[-limit_x, limit_x] x [-limit_y, limit_y]`.
    ///
    /// Outlier seeds far outside the images would otherwise size the search
    /// crops beyond anything that can be read or allocated.
    pub fn clamp(self, limit_x: i32, limit_y: i32) -> Self {
        match self {
            SearchRange::Found(b) => {
                let (lx, ly) = (limit_x.max(0), limit_y.max(0));
                SearchRange::Found(BBox2i::from_corners(
                    (b.min_x.clamp(-lx, lx), b.min_y.clamp(-ly, ly)),
                    (b.max_x.clamp(-lx, lx), b.max_y.clamp(-ly, ly)),
                ))
            }
            SearchRange::Empty => SearchRange::Empty,
        }
    }
}

/// Scans `disparity` and returns the box spanning all valid vectors.
pub fn disparity_range(disparity: ImageView<'_, Disparity>) -> SearchRange {
    let mut lo = (f32::INFINITY, f32::INFINITY);
    let mut hi = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    let mut found = false;

    for y in 0..disparity.height() {
        for x in 0..disparity.width() {
            let Some(d) = disparity.get(x, y) else {
                continue;
            };
            if !d.valid || !d.dx.is_finite() || !d.dy.is_finite() {
                continue;
            }
            found = true;
            lo = (lo.0.min(d.dx), lo.1.min(d.dy));
            hi = (hi.0.max(d.dx), hi.1.max(d.dy));
        }
    }

    if !found {
        return SearchRange::Empty;
    }
    SearchRange::Found(BBox2i::from_corners(
        (lo.0.floor() as i32, lo.1.floor() as i32),
        (hi.0.ceil() as i32, hi.1.ceil() as i32),
    ))
}
