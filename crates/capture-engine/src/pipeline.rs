//! GStreamer pipelines for the camera and the preview window.
//!
//! Frames cross the GStreamer boundary as packed BGR. Camera buffers are
//! copied out of the sample (dropping any row padding) so the loop always
//! owns its frames.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use afterimage_common::error::{AfterimageError, AfterimageResult};
use afterimage_effects::Raster;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use crate::keys::KeyWatcher;

/// Produces the next live camera frame, blocking until one is available.
pub trait FrameSource {
    fn next_frame(&mut self) -> AfterimageResult<Raster>;
}

/// Shows composited frames and reports key presses.
pub trait DisplaySink {
    fn show(&mut self, frame: &Raster) -> AfterimageResult<()>;

    /// Wait up to `interval` for a key. A zero interval waits until a key
    /// arrives.
    fn wait_key(&mut self, interval: Duration) -> AfterimageResult<Option<char>>;
}

/// V4L2 camera read through an `appsink`.
pub struct CameraSource {
    device: String,
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
}

impl CameraSource {
    /// Open `/dev/video{index}` and start streaming.
    pub fn open(index: u32) -> AfterimageResult<Self> {
        let device = format!("/dev/video{index}");
        if !Path::new(&device).exists() {
            return Err(AfterimageError::capture(format!(
                "failed to open video capture: {device} does not exist"
            )));
        }

        let pipeline = launch_pipeline(&camera_launch(&device), AfterimageError::capture)?;
        let sink = pipeline
            .by_name(FRAMES_ELEMENT)
            .ok_or_else(|| AfterimageError::capture("camera pipeline has no appsink"))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| AfterimageError::capture("camera sink is not an appsink"))?;

        start_pipeline(&pipeline, &device, |message| {
            AfterimageError::capture(format!("failed to open video capture {device}: {message}"))
        })?;
        tracing::info!(device = %device, "Camera streaming");

        Ok(Self {
            device,
            pipeline,
            sink,
        })
    }

    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(e) => Some(e.error().to_string()),
            _ => None,
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> AfterimageResult<Raster> {
        let sample = self.sink.pull_sample().map_err(|_| {
            let reason = self
                .bus_error()
                .unwrap_or_else(|| "stream ended".to_string());
            AfterimageError::capture(format!("{}: {reason}", self.device))
        })?;

        let caps = sample
            .caps()
            .ok_or_else(|| AfterimageError::capture("camera sample carries no caps"))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| AfterimageError::capture(format!("unreadable camera caps: {e}")))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| AfterimageError::capture("camera sample carries no buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| AfterimageError::capture(format!("cannot map camera buffer: {e}")))?;

        let data = unpad_rows(
            map.as_slice(),
            info.width() as usize,
            info.height() as usize,
            info.stride()[0] as usize,
        )?;
        Raster::new(info.width() as usize, info.height() as usize, data)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(device = %self.device, error = ?e, "Failed to stop camera pipeline");
        }
    }
}

/// Preview window fed through an `appsrc`, with keys read from the terminal.
pub struct GstDisplay {
    pipeline: gst::Pipeline,
    src: gst_app::AppSrc,
    negotiated: Option<(usize, usize, usize)>,
    keys: KeyWatcher,
}

impl GstDisplay {
    pub fn open(keys: KeyWatcher) -> AfterimageResult<Self> {
        let pipeline = launch_pipeline(DISPLAY_LAUNCH, AfterimageError::display)?;
        let src = pipeline
            .by_name(FRAMES_ELEMENT)
            .ok_or_else(|| AfterimageError::display("display pipeline has no appsrc"))?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| AfterimageError::display("display source is not an appsrc"))?;

        start_pipeline(&pipeline, "display", AfterimageError::display)?;

        Ok(Self {
            pipeline,
            src,
            negotiated: None,
            keys,
        })
    }

    fn check_bus(&self) -> AfterimageResult<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(e) = msg.view() {
                return Err(AfterimageError::display(e.error().to_string()));
            }
        }
        Ok(())
    }
}

impl DisplaySink for GstDisplay {
    fn show(&mut self, frame: &Raster) -> AfterimageResult<()> {
        self.check_bus()?;

        let info = gst_video::VideoInfo::builder(
            gst_video::VideoFormat::Bgr,
            frame.width() as u32,
            frame.height() as u32,
        )
        .build()
        .map_err(|e| AfterimageError::display(format!("unsupported frame size: {e}")))?;
        let stride = info.stride()[0] as usize;

        let layout = (frame.width(), frame.height(), stride);
        if self.negotiated != Some(layout) {
            let caps = info
                .to_caps()
                .map_err(|e| AfterimageError::display(format!("cannot build caps: {e}")))?;
            self.src.set_caps(Some(&caps));
            self.negotiated = Some(layout);
            tracing::debug!(width = frame.width(), height = frame.height(), "Display caps set");
        }

        let data = pad_rows(frame.data(), frame.row_bytes(), frame.height(), stride);
        self.src
            .push_buffer(gst::Buffer::from_mut_slice(data))
            .map_err(|e| AfterimageError::display(format!("display rejected frame: {e:?}")))?;
        Ok(())
    }

    fn wait_key(&mut self, interval: Duration) -> AfterimageResult<Option<char>> {
        Ok(self.keys.wait(interval))
    }
}

impl Drop for GstDisplay {
    fn drop(&mut self) {
        let _ = self.src.end_of_stream();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to stop display pipeline");
        }
    }
}

const FRAMES_ELEMENT: &str = "frames";

const DISPLAY_LAUNCH: &str = "appsrc name=frames is-live=true format=time do-timestamp=true ! queue max-size-buffers=2 leaky=downstream ! videoconvert ! autovideosink sync=false";

fn camera_launch(device: &str) -> String {
    // appsink keeps only the newest frame so a slow effect never lags behind the camera.
    format!(
        "v4l2src device=\"{}\" ! videoconvert ! video/x-raw,format=BGR ! appsink name={FRAMES_ELEMENT} max-buffers=1 drop=true sync=false",
        device.replace('"', "\\\"")
    )
}

/// `stage` builds the error for the calling side (camera or display), so a
/// failure is wrapped exactly once.
fn launch_pipeline(launch: &str, stage: impl Fn(String) -> AfterimageError) -> AfterimageResult<gst::Pipeline> {
    init_gstreamer().map_err(&stage)?;

    let element = gst::parse::launch(launch).map_err(|e| stage(format!("Failed to build pipeline: {e}")))?;

    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| stage("Launch string did not produce a pipeline".to_string()))
}

fn start_pipeline(
    pipeline: &gst::Pipeline,
    name: &str,
    stage: impl Fn(String) -> AfterimageError,
) -> AfterimageResult<()> {
    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| stage(format!("Failed to start {name} pipeline: {e:?}")))?;

    match pipeline.state(gst::ClockTime::from_seconds(5)) {
        (Ok(_), gst::State::Playing, _) => {}
        (Ok(_), state, _) => {
            // Live sources report NoPreroll and may settle later.
            tracing::debug!(pipeline = name, ?state, "Pipeline not yet Playing");
        }
        (Err(e), _, _) => {
            return Err(stage(format!(
                "{name} pipeline failed to reach Playing state: {e:?}"
            )));
        }
    }
    Ok(())
}

fn init_gstreamer() -> Result<(), String> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    GST_INIT
        .get_or_init(|| gst::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| format!("Failed to initialize GStreamer: {e}"))
}

/// Copy `height` rows of `width * 3` bytes out of a buffer whose rows are
/// `stride` bytes apart.
fn unpad_rows(src: &[u8], width: usize, height: usize, stride: usize) -> AfterimageResult<Vec<u8>> {
    let row_bytes = width * 3;
    let mut data = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let line = src.get(start..start + row_bytes).ok_or_else(|| {
            AfterimageError::capture(format!(
                "camera buffer too small: {} bytes for {width}x{height} (stride {stride})",
                src.len()
            ))
        })?;
        data.extend_from_slice(line);
    }
    Ok(data)
}

/// Lay packed rows out with `stride` bytes per row, zero-filling the padding.
fn pad_rows(src: &[u8], row_bytes: usize, height: usize, stride: usize) -> Vec<u8> {
    if stride == row_bytes {
        return src.to_vec();
    }
    let mut data = vec![0u8; stride * height];
    for (row, line) in src.chunks_exact(row_bytes).take(height).enumerate() {
        data[row * stride..row * stride + row_bytes].copy_from_slice(line);
    }
    data
}
