//! Morphology on foreground masks with an elliptical structuring element.
//!
//! Operations run through `imageproc`'s grey-level morphology. Neighbours
//! outside the image are ignored, so the border neither grows nor erodes
//! the foreground.

use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_close, grayscale_dilate, grayscale_erode, Mask as Stencil};

use crate::frame::Mask;

/// Largest side `imageproc` accepts for a structuring element.
pub const MAX_KERNEL_SIZE: usize = 511;

/// Structuring element anchored at its centre.
#[derive(Debug, Clone)]
pub struct Kernel {
    size: usize,
    offsets: Vec<(isize, isize)>,
    stencil: Stencil,
}

impl Kernel {
    /// Filled ellipse inscribed in a `size x size` square.
    pub fn ellipse(size: usize) -> AfterimageResult<Self> {
        if size == 0 || size > MAX_KERNEL_SIZE {
            return Err(AfterimageError::invalid_configuration(format!(
                "'morph_size' must be between 1 and {MAX_KERNEL_SIZE}, got {size}"
            )));
        }
        let anchor = size / 2;
        let r = anchor as f64;
        let inv_r2 = if r > 0.0 { 1.0 / (r * r) } else { 0.0 };

        let mut offsets = Vec::new();
        let mut image = GrayImage::new(size as u32, size as u32);
        for row in 0..size {
            let dy = row as f64 - r;
            let dx = (r * ((r * r - dy * dy) * inv_r2).max(0.0).sqrt()).round();
            let start = (r - dx).max(0.0) as usize;
            let end = ((r + dx + 1.0) as usize).min(size);
            for col in start..end {
                offsets.push((col as isize - anchor as isize, row as isize - anchor as isize));
                image.put_pixel(col as u32, row as u32, Luma([255]));
            }
        }
        let stencil = Stencil::from_image(&image, anchor as u8, anchor as u8);
        Ok(Self {
            size,
            offsets,
            stencil,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Member positions relative to the anchor, row by row.
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

/// A pixel is set if any kernel neighbour is set.
pub fn dilate(mask: &Mask, kernel: &Kernel) -> Mask {
    Mask::from_image(grayscale_dilate(mask.as_image(), &kernel.stencil))
}

/// A pixel stays set only if every in-image kernel neighbour is set.
pub fn erode(mask: &Mask, kernel: &Kernel) -> Mask {
    Mask::from_image(grayscale_erode(mask.as_image(), &kernel.stencil))
}

/// Morphological closing: dilation followed by erosion. Fills small holes
/// and gaps in the foreground without growing it overall.
pub fn close(mask: &Mask, kernel: &Kernel) -> Mask {
    Mask::from_image(grayscale_close(mask.as_image(), &kernel.stencil))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipse_five_drops_corners() {
        let kernel = Kernel::ellipse(5).unwrap();
        assert_eq!(kernel.size(), 5);
        assert!(kernel.offsets().contains(&(0, 0)));
        assert!(kernel.offsets().contains(&(2, 0)));
        assert!(kernel.offsets().contains(&(0, -2)));
        assert!(!kernel.offsets().contains(&(2, 2)));
        assert!(!kernel.offsets().contains(&(-2, -2)));
    }

    #[test]
    fn unit_kernel_is_identity() {
        let kernel = Kernel::ellipse(1).unwrap();
        assert_eq!(kernel.offsets(), &[(0, 0)]);
        let mask = Mask::from_fn(5, 5, |x, y| (x + y) % 3 == 0);
        assert_eq!(close(&mask, &kernel), mask);
    }

    #[test]
    fn sizes_outside_the_supported_range_are_rejected() {
        assert!(Kernel::ellipse(0).is_err());
        let err = Kernel::ellipse(MAX_KERNEL_SIZE + 1).unwrap_err();
        assert!(err.is_configuration());
        assert!(Kernel::ellipse(MAX_KERNEL_SIZE).is_ok());
    }

    #[test]
    fn closing_fills_single_pixel_hole() {
        let mask = Mask::from_fn(9, 9, |x, y| (2..7).contains(&x) && (2..7).contains(&y) && !(x == 4 && y == 4));
        let closed = close(&mask, &Kernel::ellipse(3).unwrap());
        assert!(closed.is_set(4, 4));
        assert!(!closed.is_set(0, 0));
        assert_eq!(closed.count(), 25);
    }

    #[test]
    fn dilation_grows_a_pixel_into_a_cross() {
        let mask = Mask::from_fn(7, 7, |x, y| x == 3 && y == 3);
        let grown = dilate(&mask, &Kernel::ellipse(3).unwrap());
        assert_eq!(grown.count(), 5);
        assert!(grown.is_set(3, 2));
        assert!(!grown.is_set(2, 2));
    }

    #[test]
    fn erosion_removes_isolated_pixel() {
        let mask = Mask::from_fn(7, 7, |x, y| x == 3 && y == 3);
        let eroded = erode(&mask, &Kernel::ellipse(3).unwrap());
        assert_eq!(eroded.count(), 0);
    }

    #[test]
    fn border_pixels_survive_closing() {
        let mask = Mask::from_fn(6, 6, |x, _| x == 0);
        let closed = close(&mask, &Kernel::ellipse(3).unwrap());
        assert_eq!(closed, mask);
    }
}
