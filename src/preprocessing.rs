use ndarray::{Array1, ArrayView2, Axis};
use std::f64::consts::PI;

/// Mean and population standard deviation of a trace.
pub fn calculate_stats(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }

    let mean = data.iter().sum::<f64>() / n;
    let variance = data
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;

    (mean, variance.sqrt())
}

pub fn mean(data: &[f64]) -> f64 {
    calculate_stats(data).0
}

pub fn std_dev(data: &[f64]) -> f64 {
    calculate_stats(data).1
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median across rows for every column (sample index) of a channel-major matrix.
pub fn column_median(data: ArrayView2<'_, f64>) -> Array1<f64> {
    data.axis_iter(Axis(1))
        .map(|column| median(&column.to_vec()))
        .collect()
}

/// Max minus min over a segment.
pub fn peak_to_peak(values: &[f64]) -> f64 {
    let (min, max) = min_max(values);
    max - min
}

/// Midpoint between the segment's max and min.
pub fn midpoint(values: &[f64]) -> f64 {
    let (min, max) = min_max(values);
    (max + min) / 2.0
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    (min, max)
}

/// Unwraps radian phase by removing jumps larger than π.
///
/// NaN samples stay NaN and do not contribute a correction, so the samples after a masked
/// stretch are still unwrapped relative to what came before.
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut unwrapped = Vec::with_capacity(phase.len());
    let mut correction = 0.0;
    let mut prev: Option<f64> = None;

    for &p in phase {
        if let Some(q) = prev {
            if p.is_finite() && q.is_finite() {
                let diff = p - q;
                let mut wrapped = (diff + PI).rem_euclid(2.0 * PI) - PI;
                if wrapped == -PI && diff > 0.0 {
                    wrapped = PI;
                }
                if diff.abs() >= PI {
                    correction += wrapped - diff;
                }
            }
        }
        unwrapped.push(p + correction);
        prev = Some(p);
    }

    unwrapped
}
