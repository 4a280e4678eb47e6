use crate::config::FeatureConfig;
use crate::error::Result;
use crate::filtering::filter_signal;
use crate::movement::{detect_movement_periods, SampleClock};
use crate::phase_analysis::{compute_phase_for_movement, instantaneous_frequency};
use log::{debug, info};
use ndarray::{Array1, Array2};

/// Per-channel rhythm features, each shaped (channels, samples) like the input.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub phase: Array2<f64>,
    pub frequency: Array2<f64>,
    pub amplitude: Array2<f64>,
    pub movement_mask: Array2<bool>,
}

/// Phase, frequency, amplitude and movement periods for every channel, using the preset
/// registered for `signal_class` (or "default").
pub fn compute_features(
    trace_matrix: &Array2<f64>,
    sample_rate: f64,
    signal_class: &str,
    movement_threshold_override: Option<f64>,
) -> Result<FeatureSet> {
    let config = FeatureConfig::for_class(signal_class, movement_threshold_override);
    debug!("Signal class '{}' -> {:?}", signal_class, config.preset);
    compute_features_with(trace_matrix, sample_rate, &config)
}

pub fn compute_features_with(
    trace_matrix: &Array2<f64>,
    sample_rate: f64,
    config: &FeatureConfig,
) -> Result<FeatureSet> {
    let shape = trace_matrix.raw_dim();
    let mut features = FeatureSet {
        phase: Array2::from_elem(shape, f64::NAN),
        frequency: Array2::from_elem(shape, f64::NAN),
        amplitude: Array2::from_elem(shape, f64::NAN),
        movement_mask: Array2::from_elem(shape, false),
    };
    let band_pass = config.band_pass();

    for (channel, trace) in trace_matrix.outer_iter().enumerate() {
        let trace = trace.to_vec();
        let filtered = filter_signal(&trace, sample_rate, &band_pass)?;

        let masks = detect_movement_periods(
            &filtered,
            &config.movement,
            SampleClock::Rate(sample_rate),
        )?;

        let phase = compute_phase_for_movement(
            &filtered,
            sample_rate,
            config.highpass_cutoff,
            Some(&masks.movement),
            false,
        )?;
        let amplitude = phase.amplitude();
        let frequency = instantaneous_frequency(&phase.phase, sample_rate);

        info!(
            "Channel {}: {} movement epochs over {} samples",
            channel,
            masks.epochs().len(),
            trace.len()
        );

        features.phase.row_mut(channel).assign(&Array1::from(phase.phase));
        features.frequency.row_mut(channel).assign(&Array1::from(frequency));
        features.amplitude.row_mut(channel).assign(&Array1::from(amplitude));
        features
            .movement_mask
            .row_mut(channel)
            .assign(&Array1::from(masks.movement));
    }

    Ok(features)
}
