use std::cell::Cell;

use afterimage_delay::{DelayConfig, FrameDelayBuffer};
use proptest::prelude::*;

fn stride() -> impl Strategy<Value = isize> {
    prop_oneof![
        -40isize..=-1,
        1isize..=40,
        any::<isize>().prop_filter("output stride must be non-zero", |s| *s != 0),
        Just(isize::MAX),
        Just(isize::MIN),
    ]
}

proptest! {
    #[test]
    fn stored_count_is_ceil_of_attempts(capacity in 1usize..16, input_stride in 1usize..6, attempts in 0usize..120) {
        let mut buffer = FrameDelayBuffer::new(capacity, input_stride, 1).unwrap();
        let mut stored = 0usize;
        for i in 0..attempts {
            if buffer.admit(&i) {
                stored += 1;
            }
            prop_assert_eq!(buffer.len(), capacity.min(stored));
        }
        prop_assert_eq!(stored, attempts.div_ceil(input_stride));
    }

    #[test]
    fn keeps_most_recent_frames_oldest_first(capacity in 1usize..12, attempts in 0usize..80) {
        let mut buffer = FrameDelayBuffer::new(capacity, 1, 1).unwrap();
        for i in 0..attempts {
            buffer.admit(&i);
        }
        let expected: Vec<usize> = (attempts.saturating_sub(capacity)..attempts).collect();
        prop_assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn fetch_never_fails_after_first_admission(
        capacity in 1usize..10,
        input_stride in 1usize..4,
        output_stride in stride(),
        ops in proptest::collection::vec(any::<bool>(), 1..200),
    ) {
        let mut buffer = FrameDelayBuffer::new(capacity, input_stride, output_stride).unwrap();
        buffer.admit(&0u32);
        for (i, admit) in ops.into_iter().enumerate() {
            if admit {
                buffer.admit(&(i as u32));
            }
            let index = buffer.peek_index().unwrap();
            prop_assert!(index < buffer.len());
            prop_assert!(buffer.fetch().is_ok());
        }
    }

    #[test]
    fn fetch_indices_follow_euclidean_stride(len in 1usize..12, output_stride in stride(), reads in 1usize..60) {
        let mut buffer = FrameDelayBuffer::new(len, 1, output_stride).unwrap();
        for i in 0..len {
            buffer.admit(&i);
        }
        let mut expected = 0i128;
        for _ in 0..reads {
            let frame = *buffer.fetch().unwrap();
            prop_assert_eq!(frame as i128, expected);
            expected = (expected + output_stride as i128).rem_euclid(len as i128);
        }
    }

    #[test]
    fn supplier_runs_only_for_stored_attempts(input_stride in 1usize..8, attempts in 0usize..100) {
        let calls = Cell::new(0usize);
        let mut buffer = FrameDelayBuffer::new(4, input_stride, -1).unwrap();
        for attempt in 0..attempts {
            let stored = buffer.admit_with(|| {
                calls.set(calls.get() + 1);
                attempt
            });
            prop_assert_eq!(stored, attempt % input_stride == 0);
        }
        prop_assert_eq!(calls.get(), attempts.div_ceil(input_stride));
    }
}

#[test]
fn scenario_forward_stride_over_evicting_buffer() {
    let mut buffer = FrameDelayBuffer::new(3, 1, 1).unwrap();
    let mut snapshots = Vec::new();
    let mut shown = Vec::new();
    for frame in ["F1", "F2", "F3", "F4", "F5"] {
        buffer.admit(&frame);
        if buffer.is_full() {
            snapshots.push(buffer.iter().copied().collect::<Vec<_>>());
            shown.push(*buffer.fetch().unwrap());
        }
    }
    // each eviction pulls the cursor back onto the oldest frame
    assert_eq!(shown, vec!["F1", "F2", "F3"]);
    assert_eq!(
        snapshots,
        vec![
            vec!["F1", "F2", "F3"],
            vec!["F2", "F3", "F4"],
            vec!["F3", "F4", "F5"],
        ]
    );

    let cycle: Vec<usize> = (0..5)
        .map(|_| {
            let index = buffer.peek_index().unwrap();
            buffer.fetch().unwrap();
            index
        })
        .collect();
    assert_eq!(cycle, vec![1, 2, 0, 1, 2]);
}

#[test]
fn scenario_input_decimation() {
    let mut buffer = FrameDelayBuffer::new(4, 2, 1).unwrap();
    for item in 1..=8u32 {
        buffer.admit(&item);
    }
    assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5, 7]);
}

#[test]
fn scenario_backward_walk_wraps_from_zero_to_last() {
    let mut buffer = FrameDelayBuffer::new(5, 1, -1).unwrap();
    for item in 0..5u32 {
        buffer.admit(&item);
    }
    let mut indices = Vec::new();
    for _ in 0..6 {
        indices.push(buffer.peek_index().unwrap());
        buffer.fetch().unwrap();
    }
    assert_eq!(indices, vec![0, 4, 3, 2, 1, 0]);
}

#[test]
fn scenario_zero_parameters_rejected() {
    assert!(FrameDelayBuffer::<u8>::new(0, 1, 1).is_err());
    assert!(FrameDelayBuffer::<u8>::new(1, 0, 1).is_err());
    assert!(FrameDelayBuffer::<u8>::new(1, 1, 0).is_err());
}

#[test]
fn config_builds_equivalent_buffer() {
    let config = DelayConfig::new(30, 1, -3);
    let buffer = FrameDelayBuffer::<u8>::from_config(config).unwrap();
    assert_eq!(buffer.config(), config);
    assert_eq!(buffer.capacity(), 30);
    assert_eq!(buffer.output_stride(), -3);
}
