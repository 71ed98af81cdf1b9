//! Afterimage Effects
//!
//! The collaborators around the delay buffer:
//! - **Frames:** BGR rasters, binary masks, and flow-derived sample maps
//! - **Background models:** foreground masks from a live camera feed
//! - **Morphology:** elliptical closing to clean up masks
//! - **Optical flow:** dense motion fields between two grey frames
//! - **Compositors:** paint-through-mask and remap-through-flow
//! - **Effects:** the two per-iteration pipelines built from the above
//!
//! This crate is pure computation and never opens a device or window.
//! Images are `image` buffers processed with `imageproc`; the `opencv`
//! feature adds OpenCV subtractors and Farneback flow.

pub mod background;
pub mod compositor;
#[cfg(feature = "opencv")]
pub mod cv;
pub mod effect;
pub mod flow;
pub mod frame;
pub mod morphology;

pub use background::{create_background_model, BackgroundModel};
pub use compositor::{Compositor, MaskCompositor, RemapCompositor};
pub use effect::{Effect, FlowEffect, MaskEffect};
pub use flow::{create_flow_estimator, BlockMatchingFlow, FlowEstimator};
pub use frame::{FlowField, Mask, Raster, SampleMap};
