pub mod flow;
pub mod mask;

use afterimage_capture::{CameraSource, EffectSession, GstDisplay, KeyWatcher, StopReason};
use afterimage_effects::Effect;

use crate::settings::LoopSettings;

/// Open the camera and window, then run `effect` until the quit key.
///
/// The effect is built by the caller first so option errors surface before
/// any device is touched.
pub fn run_session(settings: &LoopSettings, effect: Box<dyn Effect>) -> anyhow::Result<()> {
    tracing::info!(
        effect = effect.name(),
        device = settings.device,
        queue_size = settings.delay.capacity,
        skip_in = settings.delay.input_stride,
        skip_out = settings.delay.output_stride,
        "Starting"
    );

    let source = CameraSource::open(settings.device)?;
    let display = GstDisplay::open(KeyWatcher::stdin())?;
    println!("Press 'q' then Enter to quit.");

    let mut session = EffectSession::new(
        settings.session_config(),
        Box::new(source),
        effect,
        Box::new(display),
    );
    let summary = session.run()?;

    match summary.reason {
        StopReason::QuitKey => tracing::info!(frames = summary.frames, "Stopped by user"),
        StopReason::FrameLimit => tracing::info!(frames = summary.frames, "Stopped at frame limit"),
    }
    Ok(())
}
