use afterimage_common::config::BackgroundModelKind;
use afterimage_delay::DelayConfig;
use afterimage_common::config::FlowMethod;
use afterimage_effects::flow::BlockMatchingFlow;
use afterimage_effects::{create_background_model, create_flow_estimator, Effect, FlowEffect, MaskEffect, Raster};

const W: usize = 24;
const H: usize = 16;

fn scene(value: u8) -> Raster {
    Raster::filled(W, H, value)
}

fn with_person(mut frame: Raster, x0: usize) -> Raster {
    for y in 4..12 {
        for x in x0..x0 + 6 {
            *frame.pixel_mut(x, y) = [250, 240, 230];
        }
    }
    frame
}

#[test]
fn mask_effect_paints_live_foreground_over_delayed_frame() {
    let model = create_background_model(BackgroundModelKind::Gaussian).unwrap();
    let mut effect = MaskEffect::new(DelayConfig::new(3, 1, 2), model, 3).unwrap();

    // Background frames differ in brightness so the delayed one is recognisable.
    for value in [40u8, 41, 42, 43, 44, 45] {
        effect.render(&scene(value)).unwrap();
    }

    let live = with_person(scene(46), 8);
    let out = effect.render(&live).unwrap();

    assert_eq!(out.pixel(10, 8), &[250, 240, 230]);
    let background = out.pixel(0, 0)[0];
    assert!(background < 46, "background pixel {background} should come from an older frame");
    assert_eq!(effect.buffer().len(), 3);
}

#[test]
fn mask_effect_honours_input_decimation() {
    let model = create_background_model(BackgroundModelKind::RunningAverage).unwrap();
    let mut effect = MaskEffect::new(DelayConfig::new(4, 3, 1), model, 5).unwrap();
    for value in 0..9u8 {
        effect.render(&scene(value * 10)).unwrap();
    }
    assert_eq!(effect.buffer().len(), 3);
    assert_eq!(effect.buffer().admissions(), 9);
    let stored: Vec<u8> = effect.buffer().iter().map(|f| f.pixel(0, 0)[0]).collect();
    assert_eq!(stored, vec![0, 30, 60]);
}

#[test]
fn mask_effect_rejects_zero_morph_size() {
    let model = create_background_model(BackgroundModelKind::Gaussian).unwrap();
    assert!(MaskEffect::new(DelayConfig::new(3, 1, 1), model, 0).is_err());
}

#[test]
fn flow_effect_on_static_scene_is_identity() {
    let mut effect = FlowEffect::new(DelayConfig::new(5, 1, -2), Box::new(BlockMatchingFlow::default())).unwrap();
    let frame = with_person(scene(60), 4);
    for _ in 0..7 {
        let out = effect.render(&frame).unwrap();
        for (a, b) in out.data().iter().zip(frame.data()) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
    }
    assert_eq!(effect.buffer().len(), 5);
}

#[test]
fn flow_effect_skips_estimation_on_decimated_frames() {
    let estimator = create_flow_estimator(FlowMethod::BlockMatching).unwrap();
    let mut effect = FlowEffect::new(DelayConfig::new(10, 2, 1), estimator).unwrap();
    for x0 in 0..8 {
        effect.render(&with_person(scene(30), x0)).unwrap();
    }
    assert_eq!(effect.buffer().admissions(), 8);
    assert_eq!(effect.buffer().len(), 4);
}

#[test]
fn delay_buffer_configuration_errors_surface_from_effects() {
    assert!(FlowEffect::new(DelayConfig::new(0, 1, 1), Box::new(BlockMatchingFlow::default())).is_err());
    let model = create_background_model(BackgroundModelKind::Gaussian).unwrap();
    assert!(MaskEffect::new(DelayConfig::new(3, 1, 0), model, 5).is_err());
}
