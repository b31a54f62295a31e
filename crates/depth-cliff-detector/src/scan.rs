//! Block scan of the bottom band of a depth frame.
//!
//! The band `[height - used_depth_height, height)` is cut into square blocks
//! anchored at its top-left corner; blocks touching the right or bottom image
//! border may be partial. Pixels are sampled on a global grid with strides
//! `step_row` / `step_col` starting at the band's first row and column 0.

use crate::row_geometry::RowGeometryTable;
use depth_cliff_core::{DepthFrame, DepthImage, DepthSample};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Block sampling configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Rows counted up from the image bottom that are scanned.
    pub used_depth_height: usize,
    /// Side of a square block in pixels.
    pub block_size: usize,
    /// Cliff-consistent samples needed to flag a block.
    pub block_points_threshold: usize,
    /// Row stride between samples.
    pub step_row: usize,
    /// Column stride between samples.
    pub step_col: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            used_depth_height: 320,
            block_size: 8,
            block_points_threshold: 10,
            step_row: 2,
            step_col: 2,
        }
    }
}

impl ScanParams {
    /// Samples a full, grid-aligned block provides.
    pub fn samples_per_block(&self) -> usize {
        self.block_size.div_ceil(self.step_row.max(1))
            * self.block_size.div_ceil(self.step_col.max(1))
    }
}

/// A block with enough cliff-consistent samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlaggedBlock {
    /// Block row index, 0 at the top of the scanned band.
    pub block_row: usize,
    pub block_col: usize,
    /// Pixel bounds `[top, top + height) x [left, left + width)`.
    pub top: usize,
    pub left: usize,
    pub height: usize,
    pub width: usize,
    /// Representative (centre) pixel.
    pub row: usize,
    pub col: usize,
    /// Samples classified as cliff-consistent.
    pub cliff_points: usize,
    /// Samples inside the valid range.
    pub valid_points: usize,
    /// Mean z-depth of the cliff-consistent samples, metres.
    pub mean_depth: f64,
}

/// First index `>= start` on the grid `origin + k * step`.
#[inline]
fn first_on_grid(start: usize, origin: usize, step: usize) -> usize {
    if start <= origin {
        return origin;
    }
    origin + (start - origin).div_ceil(step) * step
}

/// Scan `frame` and return flagged blocks, bottom block row first, left to
/// right within a row.
///
/// A sample counts only when its depth is valid and inside
/// `[range_min, range_max]` (metres, inclusive). It is cliff-consistent when
/// its tilt-compensated distance exceeds the row's expected ground distance
/// plus `ground_margin`. Rows without a floor intersection never vote for a
/// cliff.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(frame, table, scan),
        fields(width = frame.width(), height = frame.height())
    )
)]
pub fn scan_blocks<F: DepthFrame + ?Sized>(
    frame: &F,
    table: &RowGeometryTable,
    scan: &ScanParams,
    range_min: f64,
    range_max: f64,
    ground_margin: f64,
) -> Vec<FlaggedBlock> {
    let height = frame.height().min(table.image_height());
    let width = frame.width();
    let block = scan.block_size;
    let (step_row, step_col) = (scan.step_row, scan.step_col);
    if block == 0 || step_row == 0 || step_col == 0 || width == 0 {
        return Vec::new();
    }

    let first_row = (height - scan.used_depth_height.min(height)).max(table.first_row());
    if first_row >= height {
        return Vec::new();
    }
    let margin_mm = ground_margin * 1000.0;
    let block_rows = (height - first_row).div_ceil(block);
    let block_cols = width.div_ceil(block);

    let mut flagged = Vec::new();
    for block_row in (0..block_rows).rev() {
        let top = first_row + block_row * block;
        let bottom = (top + block).min(height);
        for block_col in 0..block_cols {
            let left = block_col * block;
            let right = (left + block).min(width);

            let mut cliff_points = 0usize;
            let mut valid_points = 0usize;
            let mut depth_sum = 0.0f64;

            for row in (first_on_grid(top, first_row, step_row)..bottom).step_by(step_row) {
                let Some(geometry) = table.row(row) else {
                    continue;
                };
                for col in (first_on_grid(left, 0, step_col)..right).step_by(step_col) {
                    let Some(depth) = frame.depth_within(row, col, range_min, range_max) else {
                        continue;
                    };
                    valid_points += 1;
                    if !geometry.sees_ground() {
                        continue;
                    }
                    let compensated_mm = depth * 1000.0 / geometry.tilt_compensation;
                    if compensated_mm > geometry.ground_distance_mm as f64 + margin_mm {
                        cliff_points += 1;
                        depth_sum += depth;
                    }
                }
            }

            if cliff_points > 0 && cliff_points >= scan.block_points_threshold {
                flagged.push(FlaggedBlock {
                    block_row,
                    block_col,
                    top,
                    left,
                    height: bottom - top,
                    width: right - left,
                    row: top + (bottom - top) / 2,
                    col: left + (right - left) / 2,
                    cliff_points,
                    valid_points,
                    mean_depth: depth_sum / cliff_points as f64,
                });
            }
        }
    }

    log::trace!(
        "scanned {}x{} blocks from row {}, flagged {}",
        block_rows,
        block_cols,
        first_row,
        flagged.len()
    );
    flagged
}

/// Overwrite every pixel of the flagged blocks with [`DepthSample::MARKER`].
pub fn mark_blocks<T: DepthSample>(image: &mut DepthImage<T>, blocks: &[FlaggedBlock]) {
    for b in blocks {
        for row in b.top..b.top + b.height {
            for col in b.left..b.left + b.width {
                image.set(row, col, T::MARKER);
            }
        }
    }
}
