use crate::config::MovementParams;
use crate::error::{Result, RhythmError};
use crate::preprocessing::std_dev;
use log::{debug, trace};

/// How sample positions map to time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleClock<'a> {
    /// Constant sampling rate in Hz.
    Rate(f64),
    /// Per-sample timestamps in seconds, one per trace sample.
    Timestamps(&'a [f64]),
}

impl<'a> SampleClock<'a> {
    /// Builds a clock from optional parts; exactly one must be present.
    pub fn from_parts(
        sample_rate: Option<f64>,
        timestamps: Option<&'a [f64]>,
    ) -> Result<SampleClock<'a>> {
        match (sample_rate, timestamps) {
            (Some(rate), None) => Ok(SampleClock::Rate(rate)),
            (None, Some(timestamps)) => Ok(SampleClock::Timestamps(timestamps)),
            (None, None) => Err(RhythmError::MissingSampleClock),
            (Some(_), Some(_)) => Err(RhythmError::AmbiguousSampleClock),
        }
    }

    /// Number of whole samples spanning `seconds`.
    fn samples_for(&self, seconds: f64, trace_len: usize) -> Result<usize> {
        let interval = match *self {
            SampleClock::Rate(rate) => {
                if !(rate > 0.0) {
                    return Err(RhythmError::InvalidSampleRate(rate));
                }
                return Ok((seconds * rate) as usize);
            }
            SampleClock::Timestamps(timestamps) => mean_interval(timestamps, trace_len)?,
        };
        Ok((seconds / interval) as usize)
    }
}

/// Mean sample interval as the span over the `n - 1` gaps between timestamps. Prepending
/// the first timestamp before differencing would instead divide by `n`, which rounds some
/// durations to one sample more.
fn mean_interval(timestamps: &[f64], trace_len: usize) -> Result<f64> {
    if timestamps.len() != trace_len {
        return Err(RhythmError::InvalidTimestamps(format!(
            "expected {} timestamps, got {}",
            trace_len,
            timestamps.len()
        )));
    }
    let (first, last) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) if timestamps.len() > 1 => (*first, *last),
        _ => {
            return Err(RhythmError::InvalidTimestamps(
                "at least two timestamps are needed".to_string(),
            ))
        }
    };

    // Mean of consecutive differences telescopes to the total span over the gaps.
    let interval = (last - first) / (timestamps.len() - 1) as f64;
    if !(interval > 0.0) {
        return Err(RhythmError::InvalidTimestamps(format!(
            "mean sample interval must be positive, got {}",
            interval
        )));
    }
    Ok(interval)
}

/// Movement epochs together with the raw threshold masks they were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementMasks {
    pub movement: Vec<bool>,
    pub velocity: Vec<bool>,
    pub amplitude: Vec<bool>,
}

impl MovementMasks {
    /// `[start, end)` ranges where `movement` is set.
    pub fn epochs(&self) -> Vec<(usize, usize)> {
        let mut epochs = Vec::new();
        let mut start = None;
        for (i, &moving) in self.movement.iter().enumerate() {
            match (moving, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    epochs.push((s, i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            epochs.push((s, self.movement.len()));
        }
        epochs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    Idle,
    InMovement { start: usize },
}

/// Segments a trace into movement epochs using velocity and amplitude hysteresis.
///
/// An epoch opens on the first sample above both thresholds, with its start moved back to
/// just after the last sample below both. It closes only once `min_stable_duration` of
/// samples (or whatever is left of the trace) are below both thresholds, and is kept only
/// if it lasts at least `duration`.
pub fn detect_movement_periods(
    trace: &[f64],
    params: &MovementParams,
    clock: SampleClock<'_>,
) -> Result<MovementMasks> {
    let n = trace.len();
    let min_duration_samples = clock.samples_for(params.duration, n)?;
    let min_stable_samples = clock.samples_for(params.min_stable_duration, n)?;

    let velocity: Vec<f64> = std::iter::once(0.0)
        .chain(trace.windows(2).map(|w| (w[1] - w[0]).abs()))
        .take(n)
        .collect();

    let velocity_threshold = params
        .velocity_threshold
        .unwrap_or_else(|| std_dev(&velocity));
    let amplitude_threshold = params
        .amplitude_threshold
        .unwrap_or_else(|| 2.0 * std_dev(trace));
    debug!(
        "Movement thresholds: velocity {:.4}, amplitude {:.4}, min duration {} samples, min stable {} samples",
        velocity_threshold, amplitude_threshold, min_duration_samples, min_stable_samples
    );

    let velocity_mask: Vec<bool> = velocity.iter().map(|&v| v > velocity_threshold).collect();
    let amplitude_mask: Vec<bool> = trace.iter().map(|&x| x.abs() > amplitude_threshold).collect();
    let quiet = |i: usize| !velocity_mask[i] && !amplitude_mask[i];
    let active = |i: usize| velocity_mask[i] && amplitude_mask[i];

    let mut movement = vec![false; n];
    let mut keep_epoch = |start: usize, end: usize| {
        if end - start >= min_duration_samples {
            movement[start..end].iter_mut().for_each(|m| *m = true);
            trace!("Movement epoch [{}, {})", start, end);
        } else {
            trace!("Dropped short epoch [{}, {})", start, end);
        }
    };

    let mut state = DetectorState::Idle;
    for i in 0..n {
        state = match state {
            DetectorState::Idle if active(i) => {
                let start = (0..=i).rev().find(|&j| quiet(j)).map_or(0, |j| j + 1);
                DetectorState::InMovement { start }
            }
            DetectorState::InMovement { start } if !active(i) => {
                let window_end = (i + min_stable_samples).min(n);
                if (i..window_end).all(quiet) {
                    keep_epoch(start, i);
                    DetectorState::Idle
                } else {
                    state
                }
            }
            _ => state,
        };
    }
    if let DetectorState::InMovement { start } = state {
        keep_epoch(start, n);
    }

    Ok(MovementMasks {
        movement,
        velocity: velocity_mask,
        amplitude: amplitude_mask,
    })
}
