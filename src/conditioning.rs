use crate::error::{Result, RhythmError};
use crate::filtering::{filter_channels, FilterSpec};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOW_PASS_CUTOFF: f64 = 20.0;
pub const DEFAULT_BAND_PASS_CUTOFFS: (f64, f64) = (4.0, 30.0);
pub const DEFAULT_HIGH_PASS_CUTOFF: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtractionDirection {
    Upward,
    Downward,
}

/// Orientation of the whisker pad in the tracking video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhiskerPad {
    pub face_side_in_image: FaceSide,
    pub protraction_direction: ProtractionDirection,
}

/// Brings tracked angles (degrees) to a common convention: mirrored when the face is on
/// the right of the image, reflected about 90° when protraction points downward.
pub fn angle_convention(angles: &[f64], whisker_pad: &WhiskerPad) -> Vec<f64> {
    angles
        .iter()
        .map(|&angle| {
            let angle = match whisker_pad.face_side_in_image {
                FaceSide::Right => -angle,
                FaceSide::Left => angle,
            };
            match whisker_pad.protraction_direction {
                ProtractionDirection::Downward => 180.0 - angle,
                ProtractionDirection::Upward => angle,
            }
        })
        .collect()
}

/// Resamples every channel from video frames onto a 1 ms grid.
///
/// `frame_times` are in frames (or samples) of `sampling_rate`; the output grid runs from
/// the first frame time in ms up to, but excluding, the last one.
pub fn resample_to_ms(
    traces: &Array2<f64>,
    frame_times: &[f64],
    sampling_rate: f64,
) -> Result<Array2<f64>> {
    if !(sampling_rate > 0.0) {
        return Err(RhythmError::InvalidSampleRate(sampling_rate));
    }
    if frame_times.len() != traces.ncols() {
        return Err(RhythmError::LengthMismatch {
            expected: traces.ncols(),
            actual: frame_times.len(),
        });
    }
    if frame_times.len() < 2 {
        return Err(RhythmError::InvalidTimestamps(
            "at least two frame times are needed".to_string(),
        ));
    }
    if frame_times.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(RhythmError::InvalidTimestamps(
            "frame times must be strictly increasing".to_string(),
        ));
    }

    let ms_per_frame = 1000.0 / sampling_rate;
    let times_ms: Vec<f64> = frame_times.iter().map(|t| t * ms_per_frame).collect();
    let start = times_ms[0];
    let stop = times_ms[times_ms.len() - 1];
    let grid_len = (stop - start).ceil() as usize;
    debug!(
        "Resampling {} frames onto {} ms samples",
        frame_times.len(),
        grid_len
    );

    let mut resampled = Array2::<f64>::zeros((traces.nrows(), grid_len));
    for (row, mut out) in traces.outer_iter().zip(resampled.outer_iter_mut()) {
        for (k, sample) in out.iter_mut().enumerate() {
            let x = start + k as f64;
            let upper = times_ms
                .partition_point(|&t| t < x)
                .clamp(1, times_ms.len() - 1);
            let lower = upper - 1;
            let slope = (row[upper] - row[lower]) / (times_ms[upper] - times_ms[lower]);
            *sample = row[lower] + slope * (x - times_ms[lower]);
        }
    }
    Ok(resampled)
}

/// Change in the running maximum of the trace's acceleration magnitude, front-padded with
/// two zeros. Non-zero samples mark where whisking reaches a new peak intensity.
pub fn find_peak_whisking(trace: &[f64]) -> Vec<f64> {
    let speed: Vec<f64> = trace.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let running_max: Vec<f64> = speed
        .windows(2)
        .map(|w| w[1] - w[0])
        .scan(f64::NEG_INFINITY, |max, v| {
            *max = max.max(v);
            Some(*max)
        })
        .collect();

    let mut peaks = vec![0.0, 0.0];
    peaks.extend(running_max.windows(2).map(|w| w[1] - w[0]));
    peaks
}

pub fn low_pass_channels(
    traces: &Array2<f64>,
    sampling_rate: f64,
    cutoff: Option<f64>,
) -> Result<Array2<f64>> {
    let cutoff = cutoff.unwrap_or(DEFAULT_LOW_PASS_CUTOFF);
    filter_channels(traces, sampling_rate, &FilterSpec::Lowpass { cutoff })
}

pub fn band_pass_channels(
    traces: &Array2<f64>,
    sampling_rate: f64,
    cutoffs: Option<(f64, f64)>,
) -> Result<Array2<f64>> {
    let (low, high) = cutoffs.unwrap_or(DEFAULT_BAND_PASS_CUTOFFS);
    filter_channels(traces, sampling_rate, &FilterSpec::Bandpass { low, high })
}

pub fn high_pass_channels(
    traces: &Array2<f64>,
    sampling_rate: f64,
    cutoff: Option<f64>,
) -> Result<Array2<f64>> {
    let cutoff = cutoff.unwrap_or(DEFAULT_HIGH_PASS_CUTOFF);
    filter_channels(traces, sampling_rate, &FilterSpec::Highpass { cutoff })
}
