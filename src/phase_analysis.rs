use crate::error::{Result, RhythmError};
use crate::filtering::{filter_signal, FilterSpec};
use crate::preprocessing::{mean, unwrap_phase};
use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Analytic signal `x + i·H[x]` via the FFT, the way `scipy.signal.hilbert` builds it:
/// positive frequencies doubled, DC (and Nyquist for even lengths) kept, negatives zeroed.
pub fn analytic_signal(signal: &[f64]) -> Vec<Complex<f64>> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    let nyquist_bin = if n % 2 == 0 { Some(n / 2) } else { None };
    for (k, bin) in buffer.iter_mut().enumerate() {
        let weight = if k == 0 || Some(k) == nyquist_bin {
            1.0
        } else if k < (n + 1) / 2 {
            2.0
        } else {
            0.0
        };
        *bin *= weight;
    }

    ifft.process(&mut buffer);
    let scale = 1.0 / n as f64;
    buffer.iter().map(|&c| c * scale).collect()
}

/// Phase estimate for one trace.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    /// Radians in [-π, π]; NaN outside movement when a mask was supplied.
    pub phase: Vec<f64>,
    /// Copy of the phase before masking, when requested.
    pub unmasked_phase: Option<Vec<f64>>,
    pub analytic_signal: Vec<Complex<f64>>,
}

impl PhaseResult {
    /// Instantaneous amplitude, the magnitude of the analytic signal.
    pub fn amplitude(&self) -> Vec<f64> {
        self.analytic_signal.iter().map(|c| c.norm()).collect()
    }
}

/// High-pass filters and centers the trace, then takes the angle of its analytic signal.
///
/// Samples where `movement_mask` is false get a NaN phase.
pub fn compute_phase_for_movement(
    trace: &[f64],
    sample_rate: f64,
    highpass_cutoff: f64,
    movement_mask: Option<&[bool]>,
    return_unmasked: bool,
) -> Result<PhaseResult> {
    if let Some(mask) = movement_mask {
        if mask.len() != trace.len() {
            return Err(RhythmError::LengthMismatch {
                expected: trace.len(),
                actual: mask.len(),
            });
        }
    }

    let mut highpass_trace = filter_signal(
        trace,
        sample_rate,
        &FilterSpec::Highpass {
            cutoff: highpass_cutoff,
        },
    )?;
    let offset = mean(&highpass_trace);
    highpass_trace.iter_mut().for_each(|v| *v -= offset);

    let analytic = analytic_signal(&highpass_trace);
    let mut phase: Vec<f64> = analytic.iter().map(|c| c.im.atan2(c.re)).collect();

    let unmasked_phase = return_unmasked.then(|| phase.clone());

    if let Some(mask) = movement_mask {
        let mut masked = 0;
        for (p, &moving) in phase.iter_mut().zip(mask) {
            if !moving {
                *p = f64::NAN;
                masked += 1;
            }
        }
        debug!("Masked {} of {} phase samples", masked, phase.len());
    }

    Ok(PhaseResult {
        phase,
        unmasked_phase,
        analytic_signal: analytic,
    })
}

/// Finite difference of the unwrapped phase in Hz; the first sample is 0.
///
/// Unlike `numpy.unwrap`, a NaN only affects the two differences that touch it, so
/// frequencies after a masked stretch stay finite.
pub fn instantaneous_frequency(phase: &[f64], sample_rate: f64) -> Vec<f64> {
    let unwrapped = unwrap_phase(phase);
    let scale = sample_rate / (2.0 * PI);
    let mut frequency = Vec::with_capacity(phase.len());
    if !phase.is_empty() {
        frequency.push(0.0);
    }
    frequency.extend(unwrapped.windows(2).map(|w| scale * (w[1] - w[0])));
    frequency
}
