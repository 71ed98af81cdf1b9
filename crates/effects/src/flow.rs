//! Dense optical flow between consecutive grey frames.
//!
//! [`BlockMatchingFlow`] is the built-in estimator. Farneback flow from
//! OpenCV is available with the `opencv` feature.

use afterimage_common::config::FlowMethod;
use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::GrayImage;

use crate::frame::FlowField;

/// Computes per-pixel motion from `previous` to `current`.
pub trait FlowEstimator {
    fn estimate(&mut self, previous: &GrayImage, current: &GrayImage) -> AfterimageResult<FlowField>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Build the estimator selected at startup.
pub fn create_flow_estimator(method: FlowMethod) -> AfterimageResult<Box<dyn FlowEstimator>> {
    match method {
        FlowMethod::BlockMatching => Ok(Box::new(BlockMatchingFlow::default())),
        #[cfg(feature = "opencv")]
        FlowMethod::Farneback => Ok(Box::new(crate::cv::FarnebackFlow::default())),
        #[cfg(not(feature = "opencv"))]
        FlowMethod::Farneback => Err(AfterimageError::invalid_configuration(
            "flow method farneback needs a build with the `opencv` feature",
        )),
    }
}

/// Fails unless both frames have the same size.
pub(crate) fn check_sizes(previous: &GrayImage, current: &GrayImage) -> AfterimageResult<()> {
    if previous.dimensions() != current.dimensions() {
        return Err(AfterimageError::processing(format!(
            "optical flow needs equal frame sizes, got {}x{} and {}x{}",
            previous.width(),
            previous.height(),
            current.width(),
            current.height()
        )));
    }
    Ok(())
}

/// Block matching with bilinear interpolation between block centres.
///
/// Each `block_size` square of the previous frame is matched against the
/// current frame within `search_radius` pixels by mean absolute
/// difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatchingFlow {
    pub block_size: usize,
    pub search_radius: usize,
}

impl Default for BlockMatchingFlow {
    fn default() -> Self {
        Self {
            block_size: 8,
            search_radius: 4,
        }
    }
}

impl FlowEstimator for BlockMatchingFlow {
    fn estimate(&mut self, previous: &GrayImage, current: &GrayImage) -> AfterimageResult<FlowField> {
        check_sizes(previous, current)?;

        let (width, height) = (previous.width() as usize, previous.height() as usize);
        if width == 0 || height == 0 {
            return Ok(FlowField::zeros(width, height));
        }
        let block = self.block_size.max(1);
        let cols = width.div_ceil(block);
        let rows = height.div_ceil(block);

        let mut grid = Vec::with_capacity(cols * rows);
        for by in 0..rows {
            for bx in 0..cols {
                grid.push(self.match_block(previous, current, bx * block, by * block, block));
            }
        }
        tracing::trace!(cols, rows, "matched flow blocks");

        let centre = (block as f32 - 1.0) / 2.0;
        Ok(FlowField::from_fn(width, height, |x, y| {
            let (c0, c1, tx) = grid_position(x, block, centre, cols);
            let (r0, r1, ty) = grid_position(y, block, centre, rows);
            let top = lerp(grid[r0 * cols + c0], grid[r0 * cols + c1], tx);
            let bottom = lerp(grid[r1 * cols + c0], grid[r1 * cols + c1], tx);
            lerp(top, bottom, ty)
        }))
    }

    fn name(&self) -> &'static str {
        "block-matching"
    }
}

impl BlockMatchingFlow {
    fn match_block(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        x0: usize,
        y0: usize,
        block: usize,
    ) -> [f32; 2] {
        let x1 = (x0 + block).min(previous.width() as usize);
        let y1 = (y0 + block).min(previous.height() as usize);
        let radius = self.search_radius as isize;

        let mut best = [0.0f32, 0.0];
        let mut best_cost = block_cost(previous, current, (x0, y0, x1, y1), 0, 0).unwrap_or(f32::MAX);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if let Some(cost) = block_cost(previous, current, (x0, y0, x1, y1), dx, dy) {
                    if cost < best_cost {
                        best_cost = cost;
                        best = [dx as f32, dy as f32];
                    }
                }
            }
        }
        best
    }
}

/// Mean absolute difference between a block of `previous` and the same
/// block shifted by `(dx, dy)` in `current`. `None` if the shifted block
/// lies fully outside the frame.
fn block_cost(
    previous: &GrayImage,
    current: &GrayImage,
    (x0, y0, x1, y1): (usize, usize, usize, usize),
    dx: isize,
    dy: isize,
) -> Option<f32> {
    let width = current.width() as usize;
    let (w, h) = (width as isize, current.height() as isize);
    let (prev, cur) = (previous.as_raw(), current.as_raw());
    let mut total = 0u32;
    let mut count = 0u32;
    for y in y0..y1 {
        let sy = y as isize + dy;
        if sy < 0 || sy >= h {
            continue;
        }
        for x in x0..x1 {
            let sx = x as isize + dx;
            if sx < 0 || sx >= w {
                continue;
            }
            let a = prev[y * width + x];
            let b = cur[sy as usize * width + sx as usize];
            total += a.abs_diff(b) as u32;
            count += 1;
        }
    }
    (count > 0).then(|| total as f32 / count as f32)
}

fn grid_position(p: usize, block: usize, centre: f32, cells: usize) -> (usize, usize, f32) {
    let g = ((p as f32 - centre) / block as f32).clamp(0.0, (cells - 1) as f32);
    let i0 = g.floor() as usize;
    let i1 = (i0 + 1).min(cells - 1);
    (i0, i1, g - i0 as f32)
}

fn lerp(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square(width: u32, height: u32, x0: u32, y0: u32, size: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y);
            Luma([if inside { 240 } else { 10 }])
        })
    }

    #[test]
    fn identical_frames_have_no_motion() {
        let frame = square(32, 24, 8, 8, 8);
        let flow = BlockMatchingFlow::default().estimate(&frame, &frame).unwrap();
        assert_eq!(flow.width(), 32);
        assert_eq!(flow.height(), 24);
        for y in 0..24 {
            for x in 0..32 {
                assert_eq!(flow.at(x, y), [0.0, 0.0]);
            }
        }
    }

    #[test]
    fn detects_horizontal_shift() {
        let previous = square(32, 32, 8, 8, 8);
        let current = square(32, 32, 10, 8, 8);
        let flow = BlockMatchingFlow::default().estimate(&previous, &current).unwrap();
        let [dx, dy] = flow.at(11, 11);
        assert!(dx > 1.5, "dx = {dx}");
        assert!(dy.abs() < 0.5, "dy = {dy}");
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let a = GrayImage::new(8, 8);
        let b = GrayImage::new(8, 9);
        assert!(BlockMatchingFlow::default().estimate(&a, &b).is_err());
    }

    #[test]
    fn factory_builds_block_matching_by_default() {
        let estimator = create_flow_estimator(FlowMethod::default()).unwrap();
        assert_eq!(estimator.name(), "block-matching");
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn farneback_needs_the_feature() {
        let err = create_flow_estimator(FlowMethod::Farneback).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("`opencv` feature"), "{err}");
    }
}
