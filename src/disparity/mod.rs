//! Masked disparity vectors and disparity maps.
//!
//! A disparity cell is either invalid (no correspondence) or carries a
//! `(dx, dy)` offset from the left image into the right image. The default
//! value is the invalid zero vector, which is exactly what zero edge extension
//! produces for reads outside a disparity map.

use crate::image::Image;

pub mod composite;
pub mod pyramid;
pub mod range;

pub use composite::{merge_disparity, MergePolicy};
pub use pyramid::{downsample_disparity, upsample_disparity, DEFAULT_QUORUM};
pub use range::{disparity_range, SearchRange};

/// Masked 2D disparity vector.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Disparity {
    pub dx: f32,
    pub dy: f32,
    pub valid: bool,
}

impl Disparity {
    /// Creates a valid disparity.
    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy, valid: true }
    }

    /// Returns the invalid zero disparity.
    pub const fn invalid() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            valid: false,
        }
    }

    /// Returns true if the cell carries a correspondence.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns `Some((dx, dy))` for valid cells.
    pub fn vector(&self) -> Option<(f32, f32)> {
        self.valid.then_some((self.dx, self.dy))
    }

    /// Marks the cell invalid, keeping its last value for inspection.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Offsets a valid cell by `(ox, oy)`; invalid cells are unchanged.
    pub fn offset(self, ox: f32, oy: f32) -> Self {
        if self.valid {
            Self::new(self.dx + ox, self.dy + oy)
        } else {
            self
        }
    }

    /// Scales a valid cell by `factor`; invalid cells are unchanged.
    pub fn scale(self, factor: f32) -> Self {
        if self.valid {
            Self::new(self.dx * factor, self.dy * factor)
        } else {
            self
        }
    }
}

/// Owned disparity map.
pub type DisparityMap = Image<Disparity>;

/// Adds `(ox, oy)` to every valid cell in place.
pub fn translate_disparity(map: &mut DisparityMap, ox: f32, oy: f32) {
    for cell in map.data_mut() {
        *cell = cell.offset(ox, oy);
    }
}

/// Counts valid cells.
pub fn count_valid(map: &DisparityMap) -> usize {
    map.data().iter().filter(|d| d.valid).count()
}

#[cfg(test)]
mod tests {
    use super::{count_valid, translate_disparity, Disparity, DisparityMap};

    #[test]
    fn default_is_invalid_zero() {
        assert_eq!(Disparity::default(), Disparity::invalid());
        assert!(Disparity::default().vector().is_none());
    }

    #[test]
    fn translation_skips_invalid_cells() {
        let mut map = DisparityMap::from_vec(
            vec![Disparity::new(1.0, 2.0), Disparity::invalid()],
            2,
            1,
        )
        .unwrap();
        translate_disparity(&mut map, -3.0, 1.0);
        assert_eq!(map.data()[0], Disparity::new(-2.0, 3.0));
        assert_eq!(map.data()[1], Disparity::invalid());
        assert_eq!(count_valid(&map), 1);
    }
}
