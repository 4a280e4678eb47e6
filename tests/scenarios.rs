use approx::assert_abs_diff_eq;
use behavior_rhythm::conditioning::{
    angle_convention, resample_to_ms, FaceSide, ProtractionDirection, WhiskerPad,
};
use behavior_rhythm::filtering::filter_channels;
use behavior_rhythm::{
    compute_features, compute_phase_for_movement, detect_movement_periods, filter_car_channels,
    filter_signal, get_amplitude_trace, ChannelSelection, FilterSpec, MovementParams,
    RhythmError, SampleClock,
};
use ndarray::{Array2, Axis};
use std::f64::consts::PI;

fn sine(n: usize, freq: f64, amplitude: f64, sample_rate: f64) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate).sin())
        .collect()
}

#[test]
fn flat_trace_has_no_movement() {
    let trace = vec![0.0; 2000];
    let params = MovementParams {
        duration: 0.5,
        ..MovementParams::default()
    };
    let masks = detect_movement_periods(&trace, &params, SampleClock::Rate(1000.0)).unwrap();
    assert_eq!(masks.movement.len(), 2000);
    assert!(masks.movement.iter().all(|m| !m));
}

#[test]
fn sine_burst_is_one_movement_epoch() {
    let mut trace = vec![0.0; 500];
    trace.extend(sine(1000, 10.0, 5.0, 1000.0));
    trace.extend(vec![0.0; 500]);

    // Twice the trace's standard deviation equals the burst amplitude here, so the
    // amplitude threshold is given explicitly.
    let params = MovementParams {
        amplitude_threshold: Some(1.0),
        duration: 0.5,
        min_stable_duration: 0.5,
        ..MovementParams::default()
    };
    let masks = detect_movement_periods(&trace, &params, SampleClock::Rate(1000.0)).unwrap();
    let epochs = masks.epochs();

    assert_eq!(epochs.len(), 1);
    let (start, end) = epochs[0];
    assert!((450..=510).contains(&start), "start {}", start);
    assert!((1490..=1510).contains(&end), "end {}", end);
    assert!(masks.movement[..start].iter().all(|m| !m));
    assert!(masks.movement[end..].iter().all(|m| !m));
}

#[test]
fn amplitude_trace_of_steady_sine_is_peak_to_peak() {
    let trace = sine(1000, 10.0, 5.0, 1000.0);
    let phase = compute_phase_for_movement(&trace, 1000.0, 2.0, None, false).unwrap();
    let amplitude = get_amplitude_trace(&trace, &phase.phase).unwrap();

    assert_eq!(amplitude.signal.len(), 1000);
    for value in &amplitude.signal[100..900] {
        assert_abs_diff_eq!(*value, 10.0, epsilon = 0.05);
    }
}

#[test]
fn rows_are_filtered_independently() {
    let data = Array2::from_shape_fn((3, 1000), |(row, i)| {
        ((row + 1) as f64 * 0.37 * i as f64).sin() + row as f64
    });

    // 10 kHz is beyond the Nyquist frequency of a 1 kHz recording.
    let err = filter_channels(&data, 1000.0, &FilterSpec::bandpass()).unwrap_err();
    assert!(matches!(err, RhythmError::InvalidCutoff { kind: "bandpass", .. }));

    let filtered = filter_channels(&data, 30000.0, &FilterSpec::bandpass()).unwrap();
    assert_eq!(filtered.dim(), data.dim());
    for (row, out) in data.outer_iter().zip(filtered.outer_iter()) {
        let single = filter_signal(&row.to_vec(), 30000.0, &FilterSpec::bandpass()).unwrap();
        for (a, b) in out.iter().zip(&single) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
    assert_ne!(filtered.row(0), filtered.row(1));
    assert_ne!(filtered.row(1), filtered.row(2));
}

#[test]
fn car_needs_a_channel_selection() {
    let data = Array2::from_shape_fn((3, 2000), |(row, i)| {
        (2.0 * PI * (700.0 + 300.0 * row as f64) * i as f64 / 30000.0).sin()
    });
    let spec = FilterSpec::car_default();

    let err = filter_car_channels(&data, 30000.0, None, &spec).unwrap_err();
    assert!(matches!(err, RhythmError::MissingChannelSelection));

    let selection = ChannelSelection::Indices(vec![0, 2]);
    let referenced = filter_car_channels(&data, 30000.0, Some(&selection), &spec).unwrap();
    let filtered = filter_channels(&data, 30000.0, &spec).unwrap();
    let reference = filtered.select(Axis(0), &[0, 2]).mean_axis(Axis(0)).unwrap();
    for ((row, i), value) in referenced.indexed_iter() {
        assert_abs_diff_eq!(*value, filtered[[row, i]] - reference[i], epsilon = 1e-12);
    }
}

#[test]
fn features_respect_masking_and_bounds() {
    let traces = Array2::from_shape_fn((2, 3000), |(c, i)| {
        let t = i as f64 / 500.0;
        let envelope = if (1000..2000).contains(&i) { 8.0 } else { 0.05 };
        envelope * (2.0 * PI * (10.0 + c as f64) * t).sin()
    });
    let features = compute_features(&traces, 500.0, "whisking", Some(0.5)).unwrap();

    for (phase, moving) in features.phase.iter().zip(features.movement_mask.iter()) {
        if *moving {
            assert!(*phase >= -PI && *phase <= PI);
        } else {
            assert!(phase.is_nan());
        }
    }
    assert!(features.frequency.column(0).iter().all(|f| *f == 0.0));

    let again = compute_features(&traces, 500.0, "whisking", Some(0.5)).unwrap();
    assert_eq!(features.movement_mask, again.movement_mask);
    for (a, b) in features.amplitude.iter().zip(again.amplitude.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn video_tracking_is_conditioned_before_analysis() {
    // 40 s of a right-side whisker pad at 25 fps, a 5 Hz rhythm.
    let frames: Vec<f64> = (0..1000).map(f64::from).collect();
    let angles: Vec<f64> = frames
        .iter()
        .map(|f| 90.0 + 20.0 * (2.0 * PI * 5.0 * f / 25.0 + 0.3).sin())
        .collect();
    let pad = WhiskerPad {
        face_side_in_image: FaceSide::Right,
        protraction_direction: ProtractionDirection::Upward,
    };
    let oriented = angle_convention(&angles, &pad);
    assert!(oriented.iter().all(|a| *a < 0.0));

    let traces = Array2::from_shape_vec((1, oriented.len()), oriented).unwrap();
    let resampled = resample_to_ms(&traces, &frames, 25.0).unwrap();
    assert_eq!(resampled.dim(), (1, 39960));

    let features = compute_features(&resampled, 1000.0, "default", None).unwrap();
    assert_eq!(features.phase.dim(), resampled.dim());
}
