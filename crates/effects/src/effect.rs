//! The two per-iteration effects: admit, fetch the delayed signal, composite.

use afterimage_common::error::AfterimageResult;
use afterimage_delay::{DelayConfig, FrameDelayBuffer};
use image::GrayImage;

use crate::background::BackgroundModel;
use crate::compositor::{Compositor, MaskCompositor, RemapCompositor};
use crate::flow::FlowEstimator;
use crate::frame::{FlowField, Raster, SampleMap};
use crate::morphology::{self, Kernel};

/// One step of a temporal effect, called once per captured frame.
pub trait Effect {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Feed the live frame and produce the frame to display.
    fn render(&mut self, live: &Raster) -> AfterimageResult<Raster>;
}

/// Foreground of the live frame painted over a delayed camera frame.
pub struct MaskEffect {
    buffer: FrameDelayBuffer<Raster>,
    model: Box<dyn BackgroundModel>,
    kernel: Kernel,
    debug_background: bool,
}

impl MaskEffect {
    pub fn new(
        delay: DelayConfig,
        model: Box<dyn BackgroundModel>,
        morph_size: usize,
    ) -> AfterimageResult<Self> {
        Ok(Self {
            buffer: FrameDelayBuffer::from_config(delay)?,
            model,
            kernel: Kernel::ellipse(morph_size)?,
            debug_background: false,
        })
    }

    /// Show the live foreground on black instead of the delayed frame.
    pub fn debug_background(mut self, enabled: bool) -> Self {
        self.debug_background = enabled;
        self
    }

    pub fn buffer(&self) -> &FrameDelayBuffer<Raster> {
        &self.buffer
    }
}

impl Effect for MaskEffect {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn render(&mut self, live: &Raster) -> AfterimageResult<Raster> {
        self.buffer.admit(live);

        let mask = self.model.apply(live)?;
        let mask = morphology::close(&mask, &self.kernel);

        let delayed = self.buffer.fetch()?;
        MaskCompositor::new(&mask)
            .debug_background(self.debug_background)
            .composite(live, delayed)
    }
}

/// Live frame warped through a delayed motion field.
pub struct FlowEffect {
    buffer: FrameDelayBuffer<SampleMap>,
    estimator: Box<dyn FlowEstimator>,
    previous: Option<GrayImage>,
}

impl FlowEffect {
    pub fn new(delay: DelayConfig, estimator: Box<dyn FlowEstimator>) -> AfterimageResult<Self> {
        Ok(Self {
            buffer: FrameDelayBuffer::from_config(delay)?,
            estimator,
            previous: None,
        })
    }

    pub fn buffer(&self) -> &FrameDelayBuffer<SampleMap> {
        &self.buffer
    }
}

impl Effect for FlowEffect {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn render(&mut self, live: &Raster) -> AfterimageResult<Raster> {
        let Self {
            buffer,
            estimator,
            previous,
        } = self;
        let current = live.to_luma();
        // The very first frame is compared with itself.
        let before = previous.take().unwrap_or_else(|| current.clone());

        buffer.try_admit_with(|| {
            estimator
                .estimate(&before, &current)
                .map(FlowField::into_sample_map)
        })?;
        *previous = Some(current);

        let map = buffer.fetch()?;
        RemapCompositor.composite(live, map)
    }
}
