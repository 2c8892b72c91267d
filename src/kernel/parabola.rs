//! Parabola-fit subpixel refinement.
//!
//! For every valid pixel the SSD cost between the left window and the right
//! window is sampled at the rounded estimate and one pixel either side. With a
//! single enabled axis the vertex of the parabola through three costs gives
//! the sub-pixel offset; with both axes a quadratic surface is fitted to the
//! 3x3 cost grid. Flat profiles leave the axis untouched; a profile whose
//! centre is a cost maximum invalidates the pixel.

use crate::disparity::DisparityMap;
use crate::image::ImageView;
use crate::kernel::scalar::window_ssd;
use crate::kernel::{check_inputs, RefineParams, RefineStats, SubpixelKernel};
use crate::refine::quad1d::{quad_min_offset_1d, VertexFit};
use crate::refine::quad2d::quad_min_offset_2d;
use crate::trace::{trace_event, trace_span};
use crate::util::SubpixelResult;

/// Configuration for [`ParabolaKernel`].
#[derive(Clone, Copy, Debug)]
pub struct ParabolaConfig {
    /// Curvature magnitude at or below which a cost profile is treated as flat.
    pub min_curvature: f32,
}

impl Default for ParabolaConfig {
    fn default() -> Self {
        Self {
            min_curvature: 1e-4,
        }
    }
}

/// Parabola vertex refinement kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParabolaKernel {
    config: ParabolaConfig,
}

impl ParabolaKernel {
    pub fn new(config: ParabolaConfig) -> Self {
        Self { config }
    }
}

impl SubpixelKernel for ParabolaKernel {
    fn refine(
        &self,
        disparity: &mut DisparityMap,
        left: ImageView<'_, f32>,
        right: ImageView<'_, f32>,
        params: &RefineParams,
    ) -> SubpixelResult<RefineStats> {
        check_inputs(disparity, left, right, params)?;
        let _span = trace_span!(
            "refine",
            algorithm = "parabola",
            width = left.width(),
            height = left.height()
        )
        .entered();

        let (hw, hh) = params.half_window();
        let region = params.region(left.width(), left.height());
        let min_curvature = self.config.min_curvature;
        // Estimates beyond this cannot overlap the right image.
        let reach_x = (left.width() + right.width()) as f32 + hw as f32;
        let reach_y = (left.height() + right.height()) as f32 + hh as f32;
        let mut stats = RefineStats::default();

        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                let Some(cell) = disparity.get_mut(x as usize, y as usize) else {
                    continue;
                };
                if !cell.valid {
                    continue;
                }
                stats.visited += 1;
                if !(cell.dx.abs() <= reach_x && cell.dy.abs() <= reach_y) {
                    cell.invalidate();
                    stats.invalidated += 1;
                    continue;
                }

                let bx = cell.dx.round() as i32;
                let by = cell.dy.round() as i32;
                let cost = |sx: i32, sy: i32| window_ssd(left, right, x, y, sx, sy, hw, hh);
                let c0 = cost(bx, by);

                let (fit_x, fit_y) = match (params.horizontal, params.vertical) {
                    (true, true) => {
                        let mut s = [[0.0f32; 3]; 3];
                        for (row, sv) in (-1..=1).enumerate() {
                            for (col, su) in (-1..=1).enumerate() {
                                s[row][col] = if su == 0 && sv == 0 {
                                    c0
                                } else {
                                    cost(bx + su, by + sv)
                                };
                            }
                        }
                        let fit = quad_min_offset_2d(s, min_curvature);
                        (fit.x, fit.y)
                    }
                    (true, false) => (
                        quad_min_offset_1d(cost(bx - 1, by), c0, cost(bx + 1, by), min_curvature),
                        VertexFit::Flat,
                    ),
                    (false, true) => (
                        VertexFit::Flat,
                        quad_min_offset_1d(cost(bx, by - 1), c0, cost(bx, by + 1), min_curvature),
                    ),
                    (false, false) => (VertexFit::Flat, VertexFit::Flat),
                };

                let mut next = *cell;
                let mut changed = false;
                let mut rejected = false;
                match fit_x {
                    VertexFit::Minimum(offset) => {
                        next.dx = bx as f32 + offset;
                        changed = true;
                    }
                    VertexFit::Flat => {}
                    VertexFit::Rejected => rejected = true,
                }
                match fit_y {
                    VertexFit::Minimum(offset) => {
                        next.dy = by as f32 + offset;
                        changed = true;
                    }
                    VertexFit::Flat => {}
                    VertexFit::Rejected => rejected = true,
                }

                if rejected {
                    cell.invalidate();
                    stats.invalidated += 1;
                } else if changed {
                    *cell = next;
                    stats.refined += 1;
                }
            }
        }

        if params.verbose {
            trace_event!(
                "refine_stats",
                algorithm = "parabola",
                visited = stats.visited,
                refined = stats.refined,
                invalidated = stats.invalidated
            );
        }
        Ok(stats)
    }
}
