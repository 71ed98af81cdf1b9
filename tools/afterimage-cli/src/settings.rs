//! Merge command-line flags over config-file defaults and validate the result.
//!
//! Everything here runs before the camera is opened, so a bad value never
//! touches a device.

use std::time::Duration;

use afterimage_capture::SessionConfig;
use afterimage_common::config::{BackgroundModelKind, FlowMethod, PipelineDefaults};
use afterimage_common::error::{AfterimageError, AfterimageResult};
use afterimage_delay::DelayConfig;
use afterimage_effects::morphology::MAX_KERNEL_SIZE;
use clap::{Args, ValueEnum};

/// Flags shared by both effects. Unset flags fall back to the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct LoopArgs {
    /// Number of frames to queue [default: 30]
    #[arg(long = "queue_size", visible_alias = "queue-size")]
    pub queue_size: Option<usize>,

    /// Keep only every Nth captured frame [default: 1]
    #[arg(long = "skip_in", visible_alias = "skip-in")]
    pub skip_in: Option<usize>,

    /// Queue frames to advance per displayed frame, can be negative for flow [default: 3]
    #[arg(long = "skip_out", visible_alias = "skip-out", allow_negative_numbers = true)]
    pub skip_out: Option<isize>,

    /// Milliseconds to wait per displayed frame, 0 steps on each key [default: 33]
    #[arg(long = "frame_interval", visible_alias = "frame-interval")]
    pub frame_interval: Option<u64>,

    /// Camera index, opened as /dev/video<N> [default: 0]
    #[arg(long)]
    pub device: Option<u32>,

    /// Stop after this many frames
    #[arg(long = "max_frames", visible_alias = "max-frames")]
    pub max_frames: Option<u64>,
}

/// Flags of the `mask` effect.
#[derive(Debug, Clone, Default, Args)]
pub struct MaskArgs {
    #[command(flatten)]
    pub common: LoopArgs,

    /// Size of the morphological close applied to the mask [default: 5]
    #[arg(long = "morph_size", visible_alias = "morph-size")]
    pub morph_size: Option<usize>,

    /// Background model; mog2 and knn need the opencv feature [default: gaussian]
    #[arg(long, value_enum)]
    pub subtractor: Option<Subtractor>,

    /// Show the live foreground on black instead of delayed frames
    #[arg(long = "debug_background", visible_alias = "debug-background")]
    pub debug_background: bool,
}

/// Flags of the `flow` effect.
#[derive(Debug, Clone, Default, Args)]
pub struct FlowArgs {
    #[command(flatten)]
    pub common: LoopArgs,

    /// Motion estimator; farneback needs the opencv feature [default: block-matching]
    #[arg(long = "flow_method", visible_alias = "flow-method", value_enum)]
    pub flow_method: Option<FlowMethodArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subtractor {
    Gaussian,
    RunningAverage,
    Mog2,
    Knn,
}

impl From<Subtractor> for BackgroundModelKind {
    fn from(value: Subtractor) -> Self {
        match value {
            Subtractor::Gaussian => BackgroundModelKind::Gaussian,
            Subtractor::RunningAverage => BackgroundModelKind::RunningAverage,
            Subtractor::Mog2 => BackgroundModelKind::Mog2,
            Subtractor::Knn => BackgroundModelKind::Knn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlowMethodArg {
    BlockMatching,
    Farneback,
}

impl From<FlowMethodArg> for FlowMethod {
    fn from(value: FlowMethodArg) -> Self {
        match value {
            FlowMethodArg::BlockMatching => FlowMethod::BlockMatching,
            FlowMethodArg::Farneback => FlowMethod::Farneback,
        }
    }
}

/// Which effect the settings are for; they differ in how `skip_out` is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Mask,
    Flow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub delay: DelayConfig,
    pub frame_interval: Duration,
    pub device: u32,
    pub max_frames: Option<u64>,
}

impl LoopSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            frame_interval: self.frame_interval,
            max_frames: self.max_frames,
            ..SessionConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    pub common: LoopSettings,
    pub method: FlowMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskSettings {
    pub common: LoopSettings,
    pub morph_size: usize,
    pub subtractor: BackgroundModelKind,
    pub debug_background: bool,
}

pub fn resolve_loop(
    args: &LoopArgs,
    defaults: &PipelineDefaults,
    variant: Variant,
) -> AfterimageResult<LoopSettings> {
    let queue_size = args.queue_size.unwrap_or(defaults.queue_size);
    let skip_in = args.skip_in.unwrap_or(defaults.skip_in);
    let skip_out = args.skip_out.unwrap_or(defaults.skip_out);

    if queue_size < 1 {
        return Err(AfterimageError::invalid_configuration("'queue_size' must be >0"));
    }
    if skip_in < 1 {
        return Err(AfterimageError::invalid_configuration("'skip_in' must be >0"));
    }
    match variant {
        Variant::Mask if skip_out < 1 => {
            return Err(AfterimageError::invalid_configuration(
                "'skip_out' must be >0 for the mask effect",
            ));
        }
        Variant::Flow if skip_out == 0 => {
            return Err(AfterimageError::invalid_configuration("'skip_out' must be non-zero"));
        }
        _ => {}
    }
    if args.max_frames == Some(0) {
        return Err(AfterimageError::invalid_configuration("'max_frames' must be >0"));
    }

    let delay = DelayConfig::new(queue_size, skip_in, skip_out);
    delay.validate()?;

    Ok(LoopSettings {
        delay,
        frame_interval: Duration::from_millis(args.frame_interval.unwrap_or(defaults.frame_interval_ms)),
        device: args.device.unwrap_or(defaults.device),
        max_frames: args.max_frames,
    })
}

pub fn resolve_mask(args: &MaskArgs, defaults: &PipelineDefaults) -> AfterimageResult<MaskSettings> {
    let common = resolve_loop(&args.common, defaults, Variant::Mask)?;
    let morph_size = args.morph_size.unwrap_or(defaults.morph_size);
    if morph_size < 1 {
        return Err(AfterimageError::invalid_configuration("'morph_size' must be >0"));
    }
    if morph_size > MAX_KERNEL_SIZE {
        return Err(AfterimageError::invalid_configuration(format!(
            "'morph_size' must be at most {MAX_KERNEL_SIZE}"
        )));
    }
    Ok(MaskSettings {
        common,
        morph_size,
        subtractor: args.subtractor.map(Into::into).unwrap_or(defaults.subtractor),
        debug_background: args.debug_background,
    })
}

pub fn resolve_flow(args: &FlowArgs, defaults: &PipelineDefaults) -> AfterimageResult<FlowSettings> {
    Ok(FlowSettings {
        common: resolve_loop(&args.common, defaults, Variant::Flow)?,
        method: args.flow_method.map(Into::into).unwrap_or(defaults.flow),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PipelineDefaults {
        PipelineDefaults::default()
    }

    #[test]
    fn unset_flags_take_defaults() {
        let settings = resolve_loop(&LoopArgs::default(), &defaults(), Variant::Mask).unwrap();
        assert_eq!(settings.delay, DelayConfig::new(30, 1, 3));
        assert_eq!(settings.frame_interval, Duration::from_millis(33));
        assert_eq!(settings.device, 0);
        assert_eq!(settings.max_frames, None);
    }

    #[test]
    fn flags_override_config() {
        let mut config = defaults();
        config.queue_size = 50;
        config.frame_interval_ms = 10;
        let args = LoopArgs {
            queue_size: Some(12),
            skip_out: Some(-4),
            ..LoopArgs::default()
        };
        let settings = resolve_loop(&args, &config, Variant::Flow).unwrap();
        assert_eq!(settings.delay, DelayConfig::new(12, 1, -4));
        assert_eq!(settings.frame_interval, Duration::from_millis(10));
    }

    #[test]
    fn negative_skip_out_only_for_flow() {
        let args = LoopArgs {
            skip_out: Some(-1),
            ..LoopArgs::default()
        };
        let err = resolve_loop(&args, &defaults(), Variant::Mask).unwrap_err();
        assert!(err.is_configuration());
        assert!(resolve_loop(&args, &defaults(), Variant::Flow).is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let cases = [
            LoopArgs {
                queue_size: Some(0),
                ..LoopArgs::default()
            },
            LoopArgs {
                skip_in: Some(0),
                ..LoopArgs::default()
            },
            LoopArgs {
                skip_out: Some(0),
                ..LoopArgs::default()
            },
            LoopArgs {
                max_frames: Some(0),
                ..LoopArgs::default()
            },
        ];
        for args in cases {
            let err = resolve_loop(&args, &defaults(), Variant::Flow).unwrap_err();
            assert!(err.to_string().contains("must be"), "{err}");
        }
    }

    #[test]
    fn invalid_config_file_values_are_caught() {
        let mut config = defaults();
        config.skip_in = 0;
        assert!(resolve_loop(&LoopArgs::default(), &config, Variant::Flow).is_err());
    }

    #[test]
    fn mask_settings_resolve_subtractor_and_morph() {
        let args = MaskArgs {
            subtractor: Some(Subtractor::RunningAverage),
            morph_size: Some(7),
            ..MaskArgs::default()
        };
        let settings = resolve_mask(&args, &defaults()).unwrap();
        assert_eq!(settings.subtractor, BackgroundModelKind::RunningAverage);
        assert_eq!(settings.morph_size, 7);
        assert!(!settings.debug_background);

        let bad = MaskArgs {
            morph_size: Some(0),
            ..MaskArgs::default()
        };
        assert!(resolve_mask(&bad, &defaults()).is_err());

        let huge = MaskArgs {
            morph_size: Some(MAX_KERNEL_SIZE + 1),
            ..MaskArgs::default()
        };
        let err = resolve_mask(&huge, &defaults()).unwrap_err();
        assert!(err.to_string().contains("at most 511"), "{err}");
    }

    #[test]
    fn opencv_subtractors_map_to_model_kinds() {
        assert_eq!(BackgroundModelKind::from(Subtractor::Mog2), BackgroundModelKind::Mog2);
        assert_eq!(BackgroundModelKind::from(Subtractor::Knn), BackgroundModelKind::Knn);
        assert_eq!(Subtractor::from_str("mog2", false), Ok(Subtractor::Mog2));
    }

    #[test]
    fn flow_method_flag_overrides_config() {
        let mut config = defaults();
        config.flow = FlowMethod::Farneback;
        let settings = resolve_flow(&FlowArgs::default(), &config).unwrap();
        assert_eq!(settings.method, FlowMethod::Farneback);

        let args = FlowArgs {
            flow_method: Some(FlowMethodArg::BlockMatching),
            ..FlowArgs::default()
        };
        assert_eq!(resolve_flow(&args, &config).unwrap().method, FlowMethod::BlockMatching);
        assert_eq!(FlowMethodArg::from_str("block-matching", false), Ok(FlowMethodArg::BlockMatching));
    }

    #[test]
    fn session_config_carries_interval_and_limit() {
        let args = LoopArgs {
            frame_interval: Some(0),
            max_frames: Some(100),
            ..LoopArgs::default()
        };
        let config = resolve_loop(&args, &defaults(), Variant::Flow)
            .unwrap()
            .session_config();
        assert_eq!(config.frame_interval, Duration::ZERO);
        assert_eq!(config.max_frames, Some(100));
        assert_eq!(config.quit_key, 'q');
    }
}
