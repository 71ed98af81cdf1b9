//! Background subtraction: per-pixel models that separate moving
//! foreground from a learned static background.
//!
//! The built-in models run on luma. The first frame seeds the model and
//! yields an empty mask. The OpenCV subtractors live in `crate::cv` and
//! are only available with the `opencv` feature.

use afterimage_common::config::BackgroundModelKind;
use afterimage_common::error::{AfterimageError, AfterimageResult};
use image::GrayImage;

use crate::frame::{Mask, Raster};

/// A stateful foreground detector fed one frame per iteration.
pub trait BackgroundModel {
    /// Update the model with `frame` and return its foreground mask.
    fn apply(&mut self, frame: &Raster) -> AfterimageResult<Mask>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Build the model selected at startup.
pub fn create_background_model(kind: BackgroundModelKind) -> AfterimageResult<Box<dyn BackgroundModel>> {
    match kind {
        BackgroundModelKind::Gaussian => Ok(Box::new(GaussianModel::default())),
        BackgroundModelKind::RunningAverage => Ok(Box::new(RunningAverageModel::default())),
        #[cfg(feature = "opencv")]
        BackgroundModelKind::Mog2 => Ok(Box::new(crate::cv::Mog2Model::new()?)),
        #[cfg(feature = "opencv")]
        BackgroundModelKind::Knn => Ok(Box::new(crate::cv::KnnModel::new()?)),
        #[cfg(not(feature = "opencv"))]
        BackgroundModelKind::Mog2 | BackgroundModelKind::Knn => Err(AfterimageError::invalid_configuration(
            format!("subtractor {kind:?} needs a build with the `opencv` feature"),
        )),
    }
}

/// Single Gaussian per pixel with an adaptive learning rate.
///
/// A pixel is foreground when its squared distance from the mean exceeds
/// `var_threshold` times the variance. The learning rate starts at 1 and
/// settles at `1 / history`.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    pub history: u32,
    pub var_threshold: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    frames_seen: u32,
    state: Option<ModelState>,
}

#[derive(Debug, Clone)]
struct ModelState {
    width: usize,
    height: usize,
    mean: Vec<f32>,
    variance: Vec<f32>,
}

impl Default for GaussianModel {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            frames_seen: 0,
            state: None,
        }
    }
}

impl BackgroundModel for GaussianModel {
    fn apply(&mut self, frame: &Raster) -> AfterimageResult<Mask> {
        let luma = frame.to_luma();
        let (width, height) = (luma.width() as usize, luma.height() as usize);

        let Some(state) = self.state.as_mut() else {
            self.state = Some(ModelState {
                width,
                height,
                mean: luma.as_raw().iter().map(|&v| v as f32).collect(),
                variance: vec![self.var_init; width * height],
            });
            self.frames_seen = 1;
            return Ok(Mask::empty(width, height));
        };
        check_dimensions(state.width, state.height, &luma)?;

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = 1.0 / self.frames_seen.min(self.history.max(1)) as f32;

        let mut mask = Mask::empty(width, height);
        for (i, &value) in luma.as_raw().iter().enumerate() {
            let diff = value as f32 - state.mean[i];
            let dist2 = diff * diff;
            if dist2 > self.var_threshold * state.variance[i] {
                mask.set(i % width, i / width, true);
            }
            state.mean[i] += alpha * diff;
            state.variance[i] = (state.variance[i] + alpha * (dist2 - state.variance[i]))
                .clamp(self.var_min, self.var_max);
        }
        Ok(mask)
    }

    fn name(&self) -> &'static str {
        "gaussian"
    }
}

/// Exponential running average with a fixed absolute-difference threshold.
#[derive(Debug, Clone)]
pub struct RunningAverageModel {
    pub learning_rate: f32,
    pub threshold: f32,
    state: Option<(usize, usize, Vec<f32>)>,
}

impl Default for RunningAverageModel {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            threshold: 25.0,
            state: None,
        }
    }
}

impl BackgroundModel for RunningAverageModel {
    fn apply(&mut self, frame: &Raster) -> AfterimageResult<Mask> {
        let luma = frame.to_luma();
        let (width, height) = (luma.width() as usize, luma.height() as usize);

        let Some((model_w, model_h, background)) = self.state.as_mut() else {
            let background = luma.as_raw().iter().map(|&v| v as f32).collect();
            self.state = Some((width, height, background));
            return Ok(Mask::empty(width, height));
        };
        check_dimensions(*model_w, *model_h, &luma)?;

        let mut mask = Mask::empty(width, height);
        for (i, &value) in luma.as_raw().iter().enumerate() {
            let diff = value as f32 - background[i];
            if diff.abs() > self.threshold {
                mask.set(i % width, i / width, true);
            }
            background[i] += self.learning_rate * diff;
        }
        Ok(mask)
    }

    fn name(&self) -> &'static str {
        "running-average"
    }
}

fn check_dimensions(width: usize, height: usize, frame: &GrayImage) -> AfterimageResult<()> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    if w != width || h != height {
        return Err(AfterimageError::processing(format!(
            "background model trained on {width}x{height} got a {w}x{h} frame"
        )));
    }
    Ok(())
}
