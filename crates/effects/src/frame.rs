//! Frame payloads passed between pipeline stages.
//!
//! All frames own their pixels, so cloning one gives an independent copy
//! that later camera reads cannot disturb.

use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// 8-bit three-channel camera frame, row-major.
///
/// Channels are stored in B, G, R order, the layout the camera pipeline
/// negotiates. The `image` buffer type does not interpret channel order,
/// so the `Rgb` pixel type only means "three bytes" here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster(RgbImage);

impl Raster {
    /// Wrap raw BGR bytes. Fails if `data` does not hold exactly
    /// `width * height * 3` bytes.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> AfterimageResult<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(AfterimageError::processing(format!(
                "raster {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let (w, h) = (dimension(width)?, dimension(height)?);
        RgbImage::from_raw(w, h, data)
            .map(Self)
            .ok_or_else(|| AfterimageError::processing(format!("raster {width}x{height} rejected")))
    }

    /// A raster with every byte set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self(RgbImage::from_pixel(width as u32, height as u32, Rgb([value; 3])))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self(image)
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.0
    }

    pub fn into_image(self) -> RgbImage {
        self.0
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.width() * 3
    }

    pub fn data(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.0.into_raw()
    }

    /// `[b, g, r]` of the pixel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> &[u8; 3] {
        &self.0.get_pixel(x as u32, y as u32).0
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8; 3] {
        &mut self.0.get_pixel_mut(x as u32, y as u32).0
    }

    pub fn same_dimensions(&self, other: &Raster) -> bool {
        self.0.dimensions() == other.0.dimensions()
    }

    /// Grey image using BT.601 weights on the B, G, R channels.
    pub fn to_luma(&self) -> GrayImage {
        imageproc::map::map_colors(&self.0, |Rgb([b, g, r])| {
            let luma = 0.114 * b as f32 + 0.587 * g as f32 + 0.299 * r as f32;
            Luma([luma.round().clamp(0.0, 255.0) as u8])
        })
    }
}

fn dimension(value: usize) -> AfterimageResult<u32> {
    u32::try_from(value).map_err(|_| AfterimageError::processing(format!("frame dimension {value} too large")))
}

/// Per-pixel foreground mask: 0 is background, anything else is foreground.
///
/// Models that mark shadows with an intermediate grey still count those
/// pixels as foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    pub const SET: u8 = 255;

    pub fn empty(width: usize, height: usize) -> Self {
        Self(GrayImage::new(width as u32, height as u32))
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        Self(GrayImage::from_fn(width as u32, height as u32, |x, y| {
            Luma([if f(x as usize, y as usize) { Self::SET } else { 0 }])
        }))
    }

    pub fn from_image(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.0.get_pixel(x as u32, y as u32)[0] != 0
    }

    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.0.put_pixel(x as u32, y as u32, Luma([if on { Self::SET } else { 0 }]));
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v != 0).count()
    }
}

/// Per-pixel displacement `(dx, dy)` from one frame to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    width: usize,
    height: usize,
    vectors: Vec<[f32; 2]>,
}

impl FlowField {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            vectors: vec![[0.0, 0.0]; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [f32; 2]) -> Self {
        let mut vectors = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                vectors.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            vectors,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn at(&self, x: usize, y: usize) -> [f32; 2] {
        self.vectors[y * self.width + x]
    }

    /// Turn displacements into absolute sampling coordinates by adding each
    /// pixel's own position.
    pub fn into_sample_map(self) -> SampleMap {
        let width = self.width;
        let mut coords = self.vectors;
        for (i, v) in coords.iter_mut().enumerate() {
            v[0] += (i % width.max(1)) as f32;
            v[1] += (i / width.max(1)) as f32;
        }
        SampleMap {
            width: self.width,
            height: self.height,
            coords,
        }
    }
}

/// For each output pixel, the source coordinate to sample from.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMap {
    width: usize,
    height: usize,
    coords: Vec<[f32; 2]>,
}

impl SampleMap {
    /// The map that samples every pixel from itself.
    pub fn identity(width: usize, height: usize) -> Self {
        FlowField::zeros(width, height).into_sample_map()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn at(&self, x: usize, y: usize) -> [f32; 2] {
        self.coords[y * self.width + x]
    }
}
