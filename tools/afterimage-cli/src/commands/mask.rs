//! Foreground-mask effect.

use afterimage_common::config::PipelineDefaults;
use afterimage_effects::{create_background_model, MaskEffect};

use crate::settings::{resolve_mask, MaskArgs};

pub fn run(args: &MaskArgs, defaults: &PipelineDefaults) -> anyhow::Result<()> {
    let settings = resolve_mask(args, defaults)?;
    let model = create_background_model(settings.subtractor)?;
    tracing::debug!(
        subtractor = model.name(),
        morph_size = settings.morph_size,
        debug_background = settings.debug_background,
        "Mask effect configured"
    );
    let effect = MaskEffect::new(settings.common.delay, model, settings.morph_size)?
        .debug_background(settings.debug_background);

    super::run_session(&settings.common, Box::new(effect))
}
