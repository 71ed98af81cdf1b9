//! OpenCV-backed background subtractors and Farneback optical flow.
//!
//! Frames cross into OpenCV as freshly allocated `Mat`s; results are copied
//! back out, so no `Mat` outlives a call.

use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::GrayImage;
use opencv::core::{Mat, Ptr, Scalar, Vec2f, CV_8UC1, CV_8UC3};
use opencv::prelude::*;
use opencv::video;

use crate::background::BackgroundModel;
use crate::flow::{check_sizes, FlowEstimator};
use crate::frame::{FlowField, Mask, Raster};

fn cv_error(err: opencv::Error) -> AfterimageError {
    AfterimageError::processing(format!("OpenCV: {err}"))
}

fn mat_from_bytes(width: usize, height: usize, typ: i32, bytes: &[u8]) -> AfterimageResult<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, typ, Scalar::all(0.0))
        .map_err(cv_error)?;
    mat.data_bytes_mut().map_err(cv_error)?.copy_from_slice(bytes);
    Ok(mat)
}

fn raster_to_mat(frame: &Raster) -> AfterimageResult<Mat> {
    mat_from_bytes(frame.width(), frame.height(), CV_8UC3, frame.data())
}

fn gray_to_mat(frame: &GrayImage) -> AfterimageResult<Mat> {
    mat_from_bytes(frame.width() as usize, frame.height() as usize, CV_8UC1, frame.as_raw())
}

fn mat_to_mask(mat: &Mat) -> AfterimageResult<Mask> {
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let bytes = mat.data_bytes().map_err(cv_error)?.to_vec();
    GrayImage::from_raw(width, height, bytes)
        .map(Mask::from_image)
        .ok_or_else(|| AfterimageError::processing("OpenCV returned a mask of unexpected size"))
}

/// Gaussian-mixture subtractor: history 500, variance threshold 16,
/// shadow detection on.
pub struct Mog2Model {
    inner: Ptr<video::BackgroundSubtractorMOG2>,
}

impl Mog2Model {
    pub fn new() -> AfterimageResult<Self> {
        let inner = video::create_background_subtractor_mog2(500, 16.0, true).map_err(cv_error)?;
        Ok(Self { inner })
    }
}

impl BackgroundModel for Mog2Model {
    fn apply(&mut self, frame: &Raster) -> AfterimageResult<Mask> {
        let input = raster_to_mat(frame)?;
        let mut foreground = Mat::default();
        self.inner.apply(&input, &mut foreground, -1.0).map_err(cv_error)?;
        mat_to_mask(&foreground)
    }

    fn name(&self) -> &'static str {
        "mog2"
    }
}

/// K-nearest-neighbours subtractor: history 500, squared distance
/// threshold 400, shadow detection on.
pub struct KnnModel {
    inner: Ptr<video::BackgroundSubtractorKNN>,
}

impl KnnModel {
    pub fn new() -> AfterimageResult<Self> {
        let inner = video::create_background_subtractor_knn(500, 400.0, true).map_err(cv_error)?;
        Ok(Self { inner })
    }
}

impl BackgroundModel for KnnModel {
    fn apply(&mut self, frame: &Raster) -> AfterimageResult<Mask> {
        let input = raster_to_mat(frame)?;
        let mut foreground = Mat::default();
        self.inner.apply(&input, &mut foreground, -1.0).map_err(cv_error)?;
        mat_to_mask(&foreground)
    }

    fn name(&self) -> &'static str {
        "knn"
    }
}

/// Dense Farneback flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarnebackFlow {
    pub pyr_scale: f64,
    pub levels: i32,
    pub win_size: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
}

impl Default for FarnebackFlow {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            win_size: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

impl FlowEstimator for FarnebackFlow {
    fn estimate(&mut self, previous: &GrayImage, current: &GrayImage) -> AfterimageResult<FlowField> {
        check_sizes(previous, current)?;
        let (width, height) = (previous.width() as usize, previous.height() as usize);
        if width == 0 || height == 0 {
            return Ok(FlowField::zeros(width, height));
        }

        let prev = gray_to_mat(previous)?;
        let next = gray_to_mat(current)?;
        let mut flow = Mat::default();
        video::calc_optical_flow_farneback(
            &prev,
            &next,
            &mut flow,
            self.pyr_scale,
            self.levels,
            self.win_size,
            self.iterations,
            self.poly_n,
            self.poly_sigma,
            0,
        )
        .map_err(cv_error)?;

        let vectors = flow.data_typed::<Vec2f>().map_err(cv_error)?;
        if vectors.len() != width * height {
            return Err(AfterimageError::processing(format!(
                "OpenCV returned {} flow vectors for a {width}x{height} frame",
                vectors.len()
            )));
        }
        Ok(FlowField::from_fn(width, height, |x, y| {
            let v = vectors[y * width + x];
            [v.0[0], v.0[1]]
        }))
    }

    fn name(&self) -> &'static str {
        "farneback"
    }
}
