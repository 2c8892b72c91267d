//! Quadratic 2D fitting for joint (dx, dy) refinement.

use crate::refine::quad1d::{quad_min_offset_1d, VertexFit};

/// Per-axis outcome of a joint fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct VertexFit2 {
    pub(crate) x: VertexFit,
    pub(crate) y: VertexFit,
}

/// Fits `c(u, v) = a u^2 + b v^2 + c uv + d u + e v + f` to a 3x3 cost grid
/// centred at `s[1][1]` (`s[row][col]`, rows are `v = -1, 0, 1`) and returns
/// the offset of its minimum.
///
/// The cross term removes the bias that separate 1D fits show when the
/// texture couples both axes. When either axis is flat or the fitted surface is
/// not a bowl, the function falls back to independent 1D fits along the
/// centre row and column.
pub(crate) fn quad_min_offset_2d(s: [[f32; 3]; 3], min_curvature: f32) -> VertexFit2 {
    let fx = quad_min_offset_1d(s[1][0], s[1][1], s[1][2], min_curvature);
    let fy = quad_min_offset_1d(s[0][1], s[1][1], s[2][1], min_curvature);
    let separable = VertexFit2 { x: fx, y: fy };

    if !matches!((fx, fy), (VertexFit::Minimum(_), VertexFit::Minimum(_))) {
        return separable;
    }
    if s.iter().flatten().any(|v| !v.is_finite()) {
        return separable;
    }

    let cxx = s[1][0] - 2.0 * s[1][1] + s[1][2];
    let cyy = s[0][1] - 2.0 * s[1][1] + s[2][1];
    let cxy = 0.25 * (s[2][2] - s[0][2] - s[2][0] + s[0][0]);
    let gx = 0.5 * (s[1][2] - s[1][0]);
    let gy = 0.5 * (s[2][1] - s[0][1]);

    let det = cxx * cyy - cxy * cxy;
    if det <= min_curvature * min_curvature {
        return separable;
    }

    let u = -(cyy * gx - cxy * gy) / det;
    let v = -(cxx * gy - cxy * gx) / det;
    if !u.is_finite() || !v.is_finite() {
        return separable;
    }
    VertexFit2 {
        x: VertexFit::Minimum(u.clamp(-1.0, 1.0)),
        y: VertexFit::Minimum(v.clamp(-1.0, 1.0)),
    }
}
