//! Optical-flow remap effect.

use afterimage_common::config::PipelineDefaults;
use afterimage_effects::{create_flow_estimator, FlowEffect};

use crate::settings::{resolve_flow, FlowArgs};

pub fn run(args: &FlowArgs, defaults: &PipelineDefaults) -> anyhow::Result<()> {
    let settings = resolve_flow(args, defaults)?;
    let estimator = create_flow_estimator(settings.method)?;
    tracing::debug!(method = estimator.name(), "Flow effect configured");
    let effect = FlowEffect::new(settings.common.delay, estimator)?;
    super::run_session(&settings.common, Box::new(effect))
}
