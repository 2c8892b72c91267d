//! Merging of two disparity estimates by validity mask.

use crate::disparity::DisparityMap;
use crate::util::{SubpixelError, SubpixelResult};

/// Which estimate wins where both inputs are valid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the pyramid-propagated value.
    #[default]
    PreferPyramid,
    /// Keep the full-resolution seed value.
    PreferSeed,
}

/// Merges the pyramid-propagated estimate with the full-resolution seed.
///
/// The result is valid wherever either input is valid; `policy` decides the
/// value where both are.
///
/// Inside the tile pipeline both inputs share the crop dimensions, so the
/// merge cannot fail there. As a public operation it still checks its inputs
/// and returns [`SubpixelError::DimensionMismatch`] for maps of different
/// sizes rather than panicking.
pub fn merge_disparity(
    pyramid: &DisparityMap,
    seed: &DisparityMap,
    policy: MergePolicy,
) -> SubpixelResult<DisparityMap> {
    if pyramid.dims() != seed.dims() {
        return Err(SubpixelError::DimensionMismatch {
            what: "merged disparity",
            expected: seed.dims(),
            got: pyramid.dims(),
        });
    }

    let (width, height) = seed.dims();
    let merged = pyramid
        .data()
        .iter()
        .zip(seed.data())
        .map(|(&p, &s)| match (p.valid, s.valid, policy) {
            (true, true, MergePolicy::PreferPyramid) | (true, false, _) => p,
            (true, true, MergePolicy::PreferSeed) | (false, true, _) => s,
            (false, false, _) => s,
        })
        .collect();
    DisparityMap::from_vec(merged, width, height)
}
