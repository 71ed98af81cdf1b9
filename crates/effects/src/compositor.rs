//! Compositors: merge the live camera frame with a delayed frame or field.

use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_with, Interpolation};

use crate::frame::{Mask, Raster, SampleMap};

/// Combines the live frame with whatever the delay buffer handed back.
pub trait Compositor {
    /// What the delay buffer stores for this effect.
    type Delayed;

    fn composite(&self, live: &Raster, delayed: &Self::Delayed) -> AfterimageResult<Raster>;
}

/// Paints live pixels over a delayed frame wherever the mask is set.
#[derive(Debug, Clone, Copy)]
pub struct MaskCompositor<'a> {
    mask: &'a Mask,
    debug_background: bool,
}

impl<'a> MaskCompositor<'a> {
    pub fn new(mask: &'a Mask) -> Self {
        Self {
            mask,
            debug_background: false,
        }
    }

    /// Blank the delayed frame first so only the live foreground shows.
    pub fn debug_background(mut self, enabled: bool) -> Self {
        self.debug_background = enabled;
        self
    }
}

impl Compositor for MaskCompositor<'_> {
    type Delayed = Raster;

    fn composite(&self, live: &Raster, delayed: &Raster) -> AfterimageResult<Raster> {
        if !live.same_dimensions(delayed) {
            return Err(AfterimageError::processing(format!(
                "cannot paint a {}x{} frame over a {}x{} frame",
                live.width(),
                live.height(),
                delayed.width(),
                delayed.height()
            )));
        }
        if self.mask.width() != live.width() || self.mask.height() != live.height() {
            return Err(AfterimageError::processing(format!(
                "mask is {}x{} but frame is {}x{}",
                self.mask.width(),
                self.mask.height(),
                live.width(),
                live.height()
            )));
        }

        let mut out = if self.debug_background {
            Raster::filled(delayed.width(), delayed.height(), 0)
        } else {
            delayed.clone()
        };
        for y in 0..live.height() {
            for x in 0..live.width() {
                if self.mask.is_set(x, y) {
                    *out.pixel_mut(x, y) = *live.pixel(x, y);
                }
            }
        }
        Ok(out)
    }
}

/// Resamples the live frame through a delayed flow map.
///
/// Output pixel `(x, y)` takes the bicubic sample of the live frame at
/// `map(x, y)`. Samples near or beyond the edge blend with a black border.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemapCompositor;

/// Black margin added around the live frame before warping. Bicubic
/// sampling reads a 4x4 neighbourhood and gives up at the image edge, so
/// the margin lets edge pixels blend with black instead of vanishing.
const BORDER: u32 = 4;

/// Where unmappable samples are sent: far enough out to hit the border value.
const OUTSIDE: (f32, f32) = (-1.0e4, -1.0e4);

impl Compositor for RemapCompositor {
    type Delayed = SampleMap;

    fn composite(&self, live: &Raster, map: &SampleMap) -> AfterimageResult<Raster> {
        if map.width() != live.width() || map.height() != live.height() {
            return Err(AfterimageError::processing(format!(
                "flow map is {}x{} but frame is {}x{}",
                map.width(),
                map.height(),
                live.width(),
                live.height()
            )));
        }
        let (width, height) = live.as_image().dimensions();
        let mut padded = RgbImage::new(width + 2 * BORDER, height + 2 * BORDER);
        imageops::replace(&mut padded, live.as_image(), BORDER as i64, BORDER as i64);

        let offset = BORDER as f32;
        let warped = warp_with(
            &padded,
            |px, py| {
                let (x, y) = (px - offset, py - offset);
                if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
                    return OUTSIDE;
                }
                let [sx, sy] = map.at(x as usize, y as usize);
                if sx.is_finite() && sy.is_finite() {
                    (sx + offset, sy + offset)
                } else {
                    OUTSIDE
                }
            },
            Interpolation::Bicubic,
            Rgb([0, 0, 0]),
        );
        Ok(Raster::from_image(
            imageops::crop_imm(&warped, BORDER, BORDER, width, height).to_image(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FlowField;

    fn gradient(width: usize, height: usize) -> Raster {
        let data = (0..width * height)
            .flat_map(|i| {
                let v = (i * 7 % 256) as u8;
                [v, v / 2, 255 - v]
            })
            .collect();
        Raster::new(width, height, data).unwrap()
    }

    fn assert_close(actual: &[u8; 3], expected: &[u8; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(*e) <= 1, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn mask_copies_only_foreground_pixels() {
        let live = Raster::filled(4, 3, 200);
        let delayed = Raster::filled(4, 3, 20);
        let mask = Mask::from_fn(4, 3, |x, y| x == 1 && y == 2);

        let out = MaskCompositor::new(&mask).composite(&live, &delayed).unwrap();
        assert_eq!(out.pixel(1, 2), &[200, 200, 200]);
        assert_eq!(out.pixel(0, 0), &[20, 20, 20]);
        assert_eq!(delayed.pixel(1, 2), &[20, 20, 20]);
    }

    #[test]
    fn debug_background_blanks_delayed_frame() {
        let live = Raster::filled(2, 2, 90);
        let delayed = Raster::filled(2, 2, 50);
        let mask = Mask::from_fn(2, 2, |x, _| x == 0);

        let out = MaskCompositor::new(&mask)
            .debug_background(true)
            .composite(&live, &delayed)
            .unwrap();
        assert_eq!(out.pixel(0, 1), &[90, 90, 90]);
        assert_eq!(out.pixel(1, 1), &[0, 0, 0]);
    }

    #[test]
    fn mask_rejects_mismatched_frames() {
        let mask = Mask::empty(2, 2);
        let err = MaskCompositor::new(&mask)
            .composite(&Raster::filled(2, 2, 0), &Raster::filled(3, 2, 0))
            .unwrap_err();
        assert!(err.to_string().contains("cannot paint"));
    }

    #[test]
    fn identity_map_reproduces_frame() {
        let live = gradient(6, 5);
        let out = RemapCompositor
            .composite(&live, &SampleMap::identity(6, 5))
            .unwrap();
        for y in 0..5 {
            for x in 0..6 {
                assert_close(out.pixel(x, y), live.pixel(x, y));
            }
        }
    }

    #[test]
    fn integer_shift_moves_pixels_and_blacks_out_border() {
        let live = gradient(5, 4);
        let map = FlowField::from_fn(5, 4, |_, _| [1.0, 0.0]).into_sample_map();
        let out = RemapCompositor.composite(&live, &map).unwrap();
        assert_close(out.pixel(0, 2), live.pixel(1, 2));
        assert_close(out.pixel(3, 0), live.pixel(4, 0));
        assert_eq!(out.pixel(4, 0), &[0, 0, 0]);
    }

    #[test]
    fn far_and_non_finite_samples_are_black() {
        let live = Raster::filled(3, 3, 200);
        let map = FlowField::from_fn(3, 3, |x, _| if x == 0 { [f32::NAN, 0.0] } else { [50.0, 0.0] })
            .into_sample_map();
        let out = RemapCompositor.composite(&live, &map).unwrap();
        assert_eq!(out.data(), &[0; 27]);
    }

    #[test]
    fn half_pixel_sample_interpolates_a_ramp() {
        let ramp: Vec<u8> = [0u8, 20, 40, 60, 80, 100].iter().flat_map(|&v| [v; 3]).collect();
        let live = Raster::new(6, 1, ramp).unwrap();
        let map = FlowField::from_fn(6, 1, |x, _| [2.5 - x as f32, 0.0]).into_sample_map();
        let out = RemapCompositor.composite(&live, &map).unwrap();
        let value = out.pixel(0, 0)[0];
        assert!((45..=55).contains(&value), "got {value}");
    }

    #[test]
    fn mismatched_map_is_an_error() {
        let err = RemapCompositor
            .composite(&Raster::filled(3, 3, 0), &SampleMap::identity(2, 3))
            .unwrap_err();
        assert!(err.to_string().contains("flow map is 2x3"));
    }
}
