use crate::error::{Result, RhythmError};
use crate::preprocessing::{midpoint, peak_to_peak};
use log::trace;
use std::f64::consts::FRAC_PI_2;

/// Envelope signal interpolated between phase-derived extrema.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremaSeries {
    pub signal: Vec<f64>,
    pub peak_idx: Vec<usize>,
    pub trough_idx: Vec<usize>,
}

/// Ascending zero crossings of the phase.
fn peak_indices(phase: &[f64]) -> Vec<usize> {
    phase
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, _)| i)
        .collect()
}

/// Wrap-around crossings from above π/2 to below -π/2.
fn trough_indices(phase: &[f64]) -> Vec<usize> {
    phase
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] >= FRAC_PI_2 && w[1] <= -FRAC_PI_2)
        .map(|(i, _)| i)
        .collect()
}

/// Applies `operation` to the trace between consecutive extrema, positioned at the midpoint.
fn segment_values<F>(trace: &[f64], extrema: &[usize], operation: &F) -> Vec<(usize, f64)>
where
    F: Fn(&[f64]) -> f64,
{
    extrema
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            let position = (a as f64 + (b - a) as f64 / 2.0).round_ties_even() as usize;
            (position, operation(&trace[a..b]))
        })
        .collect()
}

/// Locates phase-based peaks and troughs, evaluates `operation` on every cycle between
/// them, and linearly interpolates the results over the whole trace.
pub fn find_extrema<F>(trace: &[f64], phase: &[f64], operation: F) -> Result<ExtremaSeries>
where
    F: Fn(&[f64]) -> f64,
{
    if phase.len() != trace.len() {
        return Err(RhythmError::LengthMismatch {
            expected: trace.len(),
            actual: phase.len(),
        });
    }

    let peak_idx = peak_indices(phase);
    let trough_idx = trough_indices(phase);

    let mut anchors = segment_values(trace, &peak_idx, &operation);
    anchors.extend(segment_values(trace, &trough_idx, &operation));

    let (first, last) = match (anchors.first(), anchors.last()) {
        (Some(&(_, first)), Some(&(_, last))) => (first, last),
        _ => {
            return Err(RhythmError::InsufficientExtrema {
                peaks: peak_idx.len(),
                troughs: trough_idx.len(),
            })
        }
    };
    trace!(
        "{} peaks, {} troughs, {} cycle values",
        peak_idx.len(),
        trough_idx.len(),
        anchors.len()
    );

    anchors.insert(0, (0, first));
    anchors.push((trace.len() - 1, last));
    anchors.sort_by_key(|&(position, _)| position);

    Ok(ExtremaSeries {
        signal: interpolate_anchors(&anchors, trace.len()),
        peak_idx,
        trough_idx,
    })
}

/// Piecewise-linear signal through sorted `(position, value)` anchors.
fn interpolate_anchors(anchors: &[(usize, f64)], len: usize) -> Vec<f64> {
    let mut signal = vec![0.0; len];
    for pair in anchors.windows(2) {
        let ((p0, v0), (p1, v1)) = (pair[0], pair[1]);
        if p1 == p0 {
            continue;
        }
        let span = (p1 - p0) as f64;
        for (offset, sample) in signal[p0..p1].iter_mut().enumerate() {
            *sample = v0 + (v1 - v0) * offset as f64 / span;
        }
    }
    if let (Some(sample), Some(&(_, value))) = (signal.last_mut(), anchors.last()) {
        *sample = value;
    }
    signal
}

/// Cycle-by-cycle peak-to-peak amplitude.
pub fn get_amplitude_trace(trace: &[f64], phase: &[f64]) -> Result<ExtremaSeries> {
    find_extrema(trace, phase, peak_to_peak)
}

/// Cycle-by-cycle midline, `(max + min) / 2`.
pub fn get_set_point_trace(trace: &[f64], phase: &[f64]) -> Result<ExtremaSeries> {
    find_extrema(trace, phase, midpoint)
}

pub fn get_overall_amplitude(trace: &[f64]) -> f64 {
    peak_to_peak(trace)
}

/// Whichever trace oscillates more, the second one on ties.
pub fn get_best_trace<'a>(first: &'a [f64], second: &'a [f64]) -> &'a [f64] {
    if get_overall_amplitude(first) > get_overall_amplitude(second) {
        first
    } else {
        second
    }
}
