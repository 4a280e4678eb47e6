use crate::error::{Result, RhythmError};
use crate::preprocessing::{column_median, median};
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use rustfft::num_complex::Complex;
use sci_rs::signal::filter::{design::Sos, sosfiltfilt_dyn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Butterworth order used by every filter kind.
pub const FILTER_ORDER: usize = 3;

pub const DEFAULT_LOWPASS_CUTOFF: f64 = 6000.0;
pub const DEFAULT_LFP_CUTOFF: f64 = 300.0;
pub const DEFAULT_HIGHPASS_CUTOFF: f64 = 500.0;
pub const DEFAULT_BANDPASS_CUTOFFS: (f64, f64) = (500.0, 10000.0);
pub const DEFAULT_CAR_CUTOFFS: (f64, f64) = (600.0, 6000.0);

/// Filter kind and cutoff(s) in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterSpec {
    Lowpass { cutoff: f64 },
    Highpass { cutoff: f64 },
    Bandpass { low: f64, high: f64 },
    /// Lowpass whose cutoff is normalized by the sampling rate instead of the Nyquist
    /// frequency, so the effective corner sits at half the requested cutoff.
    Lfp { cutoff: f64 },
}

impl FilterSpec {
    pub fn lowpass() -> Self {
        FilterSpec::Lowpass {
            cutoff: DEFAULT_LOWPASS_CUTOFF,
        }
    }

    pub fn lfp() -> Self {
        FilterSpec::Lfp {
            cutoff: DEFAULT_LFP_CUTOFF,
        }
    }

    pub fn highpass() -> Self {
        FilterSpec::Highpass {
            cutoff: DEFAULT_HIGHPASS_CUTOFF,
        }
    }

    pub fn bandpass() -> Self {
        let (low, high) = DEFAULT_BANDPASS_CUTOFFS;
        FilterSpec::Bandpass { low, high }
    }

    pub fn car_default() -> Self {
        let (low, high) = DEFAULT_CAR_CUTOFFS;
        FilterSpec::Bandpass { low, high }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FilterSpec::Lowpass { .. } => "lowpass",
            FilterSpec::Highpass { .. } => "highpass",
            FilterSpec::Bandpass { .. } => "bandpass",
            FilterSpec::Lfp { .. } => "LFP",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FilterSpec::Lowpass { .. } => "Lowpass",
            FilterSpec::Highpass { .. } => "Highpass",
            FilterSpec::Bandpass { .. } => "Bandpass",
            FilterSpec::Lfp { .. } => "LFP",
        }
    }

    /// Normalized band edges in (0, 1), where 1 is the Nyquist frequency.
    fn normalized_band(&self, sampling_rate: f64) -> Result<(BandType, Vec<f64>)> {
        let nyquist = sampling_rate / 2.0;
        let (band, edges) = match *self {
            FilterSpec::Lowpass { cutoff } => (BandType::Lowpass, vec![cutoff / nyquist]),
            FilterSpec::Lfp { cutoff } => (BandType::Lowpass, vec![cutoff / sampling_rate]),
            FilterSpec::Highpass { cutoff } => (BandType::Highpass, vec![cutoff / nyquist]),
            FilterSpec::Bandpass { low, high } => {
                (BandType::Bandpass, vec![low / nyquist, high / nyquist])
            }
        };

        for &normalized in &edges {
            if !(normalized > 0.0 && normalized < 1.0) {
                return Err(RhythmError::InvalidCutoff {
                    kind: self.kind(),
                    normalized,
                });
            }
        }
        if edges.len() == 2 && edges[0] >= edges[1] {
            return Err(RhythmError::InvalidCutoff {
                kind: self.kind(),
                normalized: edges[0],
            });
        }

        Ok((band, edges))
    }
}

impl FromStr for FilterSpec {
    type Err = RhythmError;

    /// Parses `kind[:cutoff[,cutoff]]`, e.g. `lowpass`, `highpass:0.3`, `bandpass:4,30`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, params) = match s.split_once(':') {
            Some((kind, params)) => (kind.trim(), Some(params)),
            None => (s.trim(), None),
        };

        let cutoffs = match params {
            Some(params) => params
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| RhythmError::UnsupportedFilter(format!("{}: {}", s, e)))?,
            None => Vec::new(),
        };

        let bad_arity = || RhythmError::UnsupportedFilter(format!("{} (wrong number of cutoffs)", s));

        match kind {
            "lowpass" | "highpass" | "LFP" => {
                let cutoff = match cutoffs.as_slice() {
                    [] => None,
                    [cutoff] => Some(*cutoff),
                    _ => return Err(bad_arity()),
                };
                Ok(match kind {
                    "lowpass" => FilterSpec::Lowpass {
                        cutoff: cutoff.unwrap_or(DEFAULT_LOWPASS_CUTOFF),
                    },
                    "highpass" => FilterSpec::Highpass {
                        cutoff: cutoff.unwrap_or(DEFAULT_HIGHPASS_CUTOFF),
                    },
                    _ => FilterSpec::Lfp {
                        cutoff: cutoff.unwrap_or(DEFAULT_LFP_CUTOFF),
                    },
                })
            }
            "bandpass" => match cutoffs.as_slice() {
                [] => Ok(FilterSpec::bandpass()),
                [low, high] => Ok(FilterSpec::Bandpass {
                    low: *low,
                    high: *high,
                }),
                _ => Err(bad_arity()),
            },
            other => Err(RhythmError::UnsupportedFilter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BandType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// One second-order section, `b` numerator and `a` denominator with `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Complex gain at normalized angular frequency `w` (radians/sample).
    pub fn response(&self, w: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }
}

/// Magnitude response of a section cascade at `freq_hz`.
pub fn magnitude_response(sections: &[Biquad], freq_hz: f64, sampling_rate: f64) -> f64 {
    let w = 2.0 * PI * freq_hz / sampling_rate;
    sections
        .iter()
        .map(|s| s.response(w))
        .fold(Complex::new(1.0, 0.0), |acc, h| acc * h)
        .norm()
}

/// Poles, zeros and gain of a filter.
struct Zpk {
    zeros: Vec<Complex<f64>>,
    poles: Vec<Complex<f64>>,
    gain: f64,
}

impl Zpk {
    fn degree(&self) -> usize {
        self.poles.len() - self.zeros.len()
    }
}

/// Designs a digital Butterworth filter as second-order sections.
///
/// Analog prototype, frequency transform on pre-warped edges, then bilinear transform,
/// matching `scipy.signal.butter(order, Wn, btype, output='sos')`.
pub fn design_butterworth(
    order: usize,
    spec: &FilterSpec,
    sampling_rate: f64,
) -> Result<Vec<Biquad>> {
    if !(sampling_rate > 0.0) {
        return Err(RhythmError::InvalidSampleRate(sampling_rate));
    }
    let (band, edges) = spec.normalized_band(sampling_rate)?;

    // Digital design on fs = 2, so the warped edge is 2 * fs * tan(pi * wn / fs).
    let fs = 2.0;
    let warped: Vec<f64> = edges
        .iter()
        .map(|wn| 2.0 * fs * (PI * wn / fs).tan())
        .collect();

    let prototype = butterworth_prototype(order);
    let analog = match band {
        BandType::Lowpass => lowpass_transform(prototype, warped[0]),
        BandType::Highpass => highpass_transform(prototype, warped[0]),
        BandType::Bandpass => {
            let bandwidth = warped[1] - warped[0];
            let center = (warped[0] * warped[1]).sqrt();
            bandpass_transform(prototype, center, bandwidth)
        }
    };

    let sections = zpk_to_sections(bilinear(analog, fs));
    debug!(
        "Designed {} Butterworth ({} sections) at edges {:?}",
        spec.kind(),
        sections.len(),
        edges
    );
    Ok(sections)
}

fn butterworth_prototype(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|k| {
            let m = -n + 1.0 + 2.0 * k as f64;
            -Complex::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn lowpass_transform(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.degree() as i32;
    Zpk {
        zeros: zpk.zeros.iter().map(|z| *z * wo).collect(),
        poles: zpk.poles.iter().map(|p| *p * wo).collect(),
        gain: zpk.gain * wo.powi(degree),
    }
}

fn highpass_transform(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.degree();
    let num: Complex<f64> = zpk.zeros.iter().map(|z| -*z).product();
    let den: Complex<f64> = zpk.poles.iter().map(|p| -*p).product();

    let mut zeros: Vec<Complex<f64>> = zpk.zeros.iter().map(|z| wo / *z).collect();
    zeros.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| wo / *p).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

fn bandpass_transform(zpk: Zpk, wo: f64, bandwidth: f64) -> Zpk {
    let degree = zpk.degree() as i32;
    let split = |roots: &[Complex<f64>]| -> Vec<Complex<f64>> {
        let scaled: Vec<Complex<f64>> = roots.iter().map(|r| *r * (bandwidth / 2.0)).collect();
        let shift = |r: &Complex<f64>| (*r * *r - wo * wo).sqrt();
        scaled
            .iter()
            .map(|r| *r + shift(r))
            .chain(scaled.iter().map(|r| *r - shift(r)))
            .collect()
    };

    let mut zeros = split(&zpk.zeros);
    zeros.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(degree as usize));

    Zpk {
        zeros,
        poles: split(&zpk.poles),
        gain: zpk.gain * bandwidth.powi(degree),
    }
}

fn bilinear(zpk: Zpk, fs: f64) -> Zpk {
    let fs2 = 2.0 * fs;
    let degree = zpk.degree();
    let num: Complex<f64> = zpk.zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex<f64> = zpk.poles.iter().map(|p| fs2 - *p).product();

    let mut zeros: Vec<Complex<f64>> = zpk.zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
    zeros.extend(std::iter::repeat(Complex::new(-1.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

/// Groups conjugate pole pairs (and leftover real poles) into sections.
///
/// Butterworth zeros all sit on the real axis at -1, 0 or 1, so zeros are paired by
/// taking alternately from both ends of the sorted list.
fn zpk_to_sections(zpk: Zpk) -> Vec<Biquad> {
    const IMAG_TOL: f64 = 1e-12;

    let mut groups: Vec<Vec<Complex<f64>>> = Vec::new();
    let mut real_poles: Vec<f64> = Vec::new();
    for p in &zpk.poles {
        if p.im > IMAG_TOL {
            groups.push(vec![*p, p.conj()]);
        } else if p.im.abs() <= IMAG_TOL {
            real_poles.push(p.re);
        }
    }
    real_poles.sort_by(|a, b| a.total_cmp(b));
    for pair in real_poles.chunks(2) {
        groups.push(pair.iter().map(|&re| Complex::new(re, 0.0)).collect());
    }
    // Poles nearest the unit circle go last.
    groups.sort_by(|a, b| a[0].norm().total_cmp(&b[0].norm()));

    let mut zeros: Vec<f64> = zpk.zeros.iter().map(|z| z.re).collect();
    zeros.sort_by(|a, b| a.total_cmp(b));
    let mut zeros = std::collections::VecDeque::from(zeros);
    let mut take_front = true;
    let mut next_zero = move || {
        let zero = if take_front {
            zeros.pop_front()
        } else {
            zeros.pop_back()
        };
        take_front = !take_front;
        zero.unwrap_or(0.0)
    };

    let mut sections: Vec<Biquad> = groups
        .iter()
        .map(|poles| {
            if poles.len() == 2 {
                let (z1, z2) = (next_zero(), next_zero());
                Biquad {
                    b: [1.0, -(z1 + z2), z1 * z2],
                    a: [1.0, -(poles[0] + poles[1]).re, (poles[0] * poles[1]).re],
                }
            } else {
                let z = next_zero();
                Biquad {
                    b: [1.0, -z, 0.0],
                    a: [1.0, -poles[0].re, 0.0],
                }
            }
        })
        .collect();

    if let Some(first) = sections.first_mut() {
        first.b.iter_mut().for_each(|c| *c *= zpk.gain);
    }
    sections
}

/// Edge padding used by the forward-backward pass; traces must be longer than this.
pub fn padding_length(sections: &[Biquad]) -> usize {
    let b_zeros = sections.iter().filter(|s| s.b[2] == 0.0).count();
    let a_zeros = sections.iter().filter(|s| s.a[2] == 0.0).count();
    3 * (2 * sections.len() + 1 - b_zeros.min(a_zeros))
}

fn to_sos(sections: &[Biquad]) -> Vec<Sos<f64>> {
    sections.iter().map(|s| Sos::new(s.b, s.a)).collect()
}

fn check_length(len: usize, sections: &[Biquad]) -> Result<()> {
    let padlen = padding_length(sections);
    if len <= padlen {
        return Err(RhythmError::TraceTooShort { len, padlen });
    }
    Ok(())
}

/// Zero-phase filters a single trace.
pub fn filter_signal(data: &[f64], sampling_rate: f64, spec: &FilterSpec) -> Result<Vec<f64>> {
    let sections = design_butterworth(FILTER_ORDER, spec, sampling_rate)?;
    check_length(data.len(), &sections)?;

    let filtered = sosfiltfilt_dyn(data.iter(), &to_sos(&sections));

    info!("{} filter applied", spec.label());
    Ok(filtered)
}

/// Zero-phase filters every row of a (channels, samples) matrix independently.
pub fn filter_channels(
    data: &Array2<f64>,
    sampling_rate: f64,
    spec: &FilterSpec,
) -> Result<Array2<f64>> {
    let sections = design_butterworth(FILTER_ORDER, spec, sampling_rate)?;
    check_length(data.ncols(), &sections)?;
    let sos = to_sos(&sections);

    let mut filtered = Array2::<f64>::zeros(data.raw_dim());
    for (row, mut out) in data.outer_iter().zip(filtered.outer_iter_mut()) {
        let values = sosfiltfilt_dyn(row.iter(), &sos);
        out.assign(&Array1::from(values));
    }

    info!(
        "{} filter applied to {} channels",
        spec.label(),
        data.nrows()
    );
    Ok(filtered)
}

/// Channels whose per-sample median forms the common reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelSelection {
    All,
    Indices(Vec<usize>),
}

/// Filters a single trace and subtracts its own median.
pub fn filter_car(data: &[f64], sampling_rate: f64, spec: &FilterSpec) -> Result<Vec<f64>> {
    let filtered = filter_signal(data, sampling_rate, spec)?;
    let reference = median(&filtered);
    info!("CAR filtering done");
    Ok(filtered.iter().map(|v| v - reference).collect())
}

/// Filters every channel, then subtracts the per-sample median of the selected channels.
pub fn filter_car_channels(
    data: &Array2<f64>,
    sampling_rate: f64,
    channel_selection: Option<&ChannelSelection>,
    spec: &FilterSpec,
) -> Result<Array2<f64>> {
    let selection = channel_selection.ok_or(RhythmError::MissingChannelSelection)?;
    if let ChannelSelection::Indices(indices) = selection {
        if indices.is_empty() {
            return Err(RhythmError::MissingChannelSelection);
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= data.nrows()) {
            return Err(RhythmError::ChannelOutOfRange {
                index,
                channels: data.nrows(),
            });
        }
    }

    let filtered = filter_channels(data, sampling_rate, spec)?;
    let reference = match selection {
        ChannelSelection::All => column_median(filtered.view()),
        ChannelSelection::Indices(indices) => {
            column_median(filtered.select(Axis(0), indices).view())
        }
    };

    info!("CAR filtering done");
    Ok(&filtered - &reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn sine(freq: f64, amplitude: f64, sampling_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sampling_rate).sin())
            .collect()
    }

    #[test]
    fn lowpass_passes_dc_and_blocks_nyquist() {
        let sections = design_butterworth(3, &FilterSpec::Lowpass { cutoff: 50.0 }, 1000.0).unwrap();
        assert_eq!(sections.len(), 2);
        assert_abs_diff_eq!(magnitude_response(&sections, 0.0, 1000.0), 1.0, epsilon = 1e-9);
        assert!(magnitude_response(&sections, 499.0, 1000.0) < 1e-4);
        assert_abs_diff_eq!(
            magnitude_response(&sections, 50.0, 1000.0),
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn highpass_blocks_dc() {
        let sections = design_butterworth(3, &FilterSpec::Highpass { cutoff: 2.0 }, 1000.0).unwrap();
        assert!(magnitude_response(&sections, 0.0, 1000.0) < 1e-9);
        assert_abs_diff_eq!(magnitude_response(&sections, 500.0, 1000.0), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            magnitude_response(&sections, 2.0, 1000.0),
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn bandpass_has_unit_gain_in_band_and_three_sections() {
        let sections = design_butterworth(3, &FilterSpec::Bandpass { low: 8.0, high: 30.0 }, 500.0)
            .unwrap();
        assert_eq!(sections.len(), 3);
        assert!(magnitude_response(&sections, 0.0, 500.0) < 1e-9);
        assert!(magnitude_response(&sections, 250.0, 500.0) < 1e-9);
        let center = (8.0_f64 * 30.0).sqrt();
        assert_abs_diff_eq!(magnitude_response(&sections, center, 500.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn wide_bandpass_with_real_poles_still_designs() {
        let sections =
            design_butterworth(3, &FilterSpec::Bandpass { low: 0.05, high: 30.0 }, 500.0).unwrap();
        assert_eq!(sections.len(), 3);
        assert_abs_diff_eq!(magnitude_response(&sections, 2.0, 500.0), 1.0, epsilon = 1e-2);
    }

    #[test]
    fn lfp_cutoff_is_normalized_by_sampling_rate() {
        // LFP at c behaves exactly like a lowpass at c / 2.
        let lfp = design_butterworth(3, &FilterSpec::Lfp { cutoff: 300.0 }, 30000.0).unwrap();
        let lowpass = design_butterworth(3, &FilterSpec::Lowpass { cutoff: 150.0 }, 30000.0).unwrap();
        for (a, b) in lfp.iter().zip(lowpass.iter()) {
            for k in 0..3 {
                assert_abs_diff_eq!(a.b[k], b.b[k], epsilon = 1e-15);
                assert_abs_diff_eq!(a.a[k], b.a[k], epsilon = 1e-15);
            }
        }
        assert_abs_diff_eq!(
            magnitude_response(&lfp, 150.0, 30000.0),
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn invalid_cutoff_is_rejected() {
        let err = filter_signal(&[0.0; 100], 1000.0, &FilterSpec::lowpass()).unwrap_err();
        assert!(matches!(err, RhythmError::InvalidCutoff { kind: "lowpass", .. }));

        let err = design_butterworth(3, &FilterSpec::Bandpass { low: 30.0, high: 8.0 }, 500.0)
            .unwrap_err();
        assert!(matches!(err, RhythmError::InvalidCutoff { .. }));

        let err = design_butterworth(3, &FilterSpec::highpass(), 0.0).unwrap_err();
        assert!(matches!(err, RhythmError::InvalidSampleRate(_)));
    }

    #[test]
    fn parses_filter_options() {
        assert_eq!("lowpass".parse::<FilterSpec>().unwrap(), FilterSpec::lowpass());
        assert_eq!("LFP".parse::<FilterSpec>().unwrap(), FilterSpec::lfp());
        assert_eq!(
            "highpass:0.3".parse::<FilterSpec>().unwrap(),
            FilterSpec::Highpass { cutoff: 0.3 }
        );
        assert_eq!(
            "bandpass:4,30".parse::<FilterSpec>().unwrap(),
            FilterSpec::Bandpass { low: 4.0, high: 30.0 }
        );
        assert_eq!("bandpass".parse::<FilterSpec>().unwrap(), FilterSpec::bandpass());
        assert!("bandpass:4".parse::<FilterSpec>().is_err());
    }

    #[test]
    fn unsupported_filter_names_the_kind() {
        let err = "notch:60".parse::<FilterSpec>().unwrap_err();
        assert!(matches!(err, RhythmError::UnsupportedFilter(ref kind) if kind == "notch"));
        assert_eq!(err.to_string(), "unsupported filter option: notch");
    }

    #[test]
    fn filtering_preserves_length() {
        let data = sine(10.0, 1.0, 1000.0, 777);
        let filtered = filter_signal(&data, 1000.0, &FilterSpec::Highpass { cutoff: 2.0 }).unwrap();
        assert_eq!(filtered.len(), data.len());
    }

    #[test]
    fn zero_phase_filtering_is_time_symmetric() {
        let data: Vec<f64> = (0..2000)
            .map(|i| {
                let t = i as f64 / 1000.0;
                (2.0 * PI * 5.0 * t).sin() + 0.5 * (2.0 * PI * 80.0 * t).cos() + 0.001 * i as f64
            })
            .collect();
        let spec = FilterSpec::Lowpass { cutoff: 20.0 };
        let forward = filter_signal(&data, 1000.0, &spec).unwrap();
        let reversed: Vec<f64> = data.iter().rev().copied().collect();
        let mut backward = filter_signal(&reversed, 1000.0, &spec).unwrap();
        backward.reverse();
        for i in 300..1700 {
            assert_abs_diff_eq!(forward[i], backward[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn passband_sine_keeps_timing() {
        let data = sine(10.0, 1.0, 1000.0, 2000);
        let filtered = filter_signal(&data, 1000.0, &FilterSpec::Lowpass { cutoff: 100.0 }).unwrap();
        for i in 300..1700 {
            assert_abs_diff_eq!(filtered[i], data[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn short_trace_is_an_error_not_a_panic() {
        let err = filter_signal(&[1.0; 10], 1000.0, &FilterSpec::Highpass { cutoff: 2.0 }).unwrap_err();
        assert!(matches!(err, RhythmError::TraceTooShort { len: 10, padlen: 12 }));
    }

    #[test]
    fn channels_are_filtered_independently() {
        let n = 1000;
        let mut data = Array2::<f64>::zeros((3, n));
        for (c, mut row) in data.outer_iter_mut().enumerate() {
            row.assign(&Array1::from(sine(5.0 * (c + 1) as f64, 1.0, 1000.0, n)));
        }
        let spec = FilterSpec::Bandpass { low: 4.0, high: 30.0 };
        let filtered = filter_channels(&data, 1000.0, &spec).unwrap();
        assert_eq!(filtered.dim(), (3, n));
        for c in 0..3 {
            let single = filter_signal(&data.row(c).to_vec(), 1000.0, &spec).unwrap();
            for i in 0..n {
                assert_abs_diff_eq!(filtered[[c, i]], single[i], epsilon = 1e-12);
            }
        }
        assert!((0..n).any(|i| (filtered[[0, i]] - filtered[[1, i]]).abs() > 1e-3));
    }

    #[test]
    fn car_requires_channel_selection_for_matrices() {
        let data = Array2::<f64>::zeros((2, 200));
        let err = filter_car_channels(&data, 30000.0, None, &FilterSpec::car_default()).unwrap_err();
        assert!(matches!(err, RhythmError::MissingChannelSelection));

        let selection = ChannelSelection::Indices(vec![5]);
        let err = filter_car_channels(&data, 30000.0, Some(&selection), &FilterSpec::car_default())
            .unwrap_err();
        assert!(matches!(err, RhythmError::ChannelOutOfRange { index: 5, channels: 2 }));
    }

    #[test]
    fn car_subtracts_per_sample_median_of_selection() {
        let n = 600;
        let mut data = Array2::<f64>::zeros((3, n));
        for (c, mut row) in data.outer_iter_mut().enumerate() {
            row.assign(&Array1::from(sine(1000.0 * (c + 1) as f64, 1.0, 30000.0, n)));
        }
        let spec = FilterSpec::car_default();
        let filtered = filter_channels(&data, 30000.0, &spec).unwrap();

        let selection = ChannelSelection::Indices(vec![0, 2]);
        let referenced = filter_car_channels(&data, 30000.0, Some(&selection), &spec).unwrap();
        for c in 0..3 {
            for i in 0..n {
                let reference = (filtered[[0, i]] + filtered[[2, i]]) / 2.0;
                assert_abs_diff_eq!(referenced[[c, i]], filtered[[c, i]] - reference, epsilon = 1e-12);
            }
        }

        let all = filter_car_channels(&data, 30000.0, Some(&ChannelSelection::All), &spec).unwrap();
        for i in 0..n {
            let col = [filtered[[0, i]], filtered[[1, i]], filtered[[2, i]]];
            assert_abs_diff_eq!(all[[1, i]], filtered[[1, i]] - median(&col), epsilon = 1e-12);
        }
    }

    #[test]
    fn car_on_single_trace_removes_median() {
        let data = sine(1000.0, 1.0, 30000.0, 600);
        let referenced = filter_car(&data, 30000.0, &FilterSpec::car_default()).unwrap();
        assert_abs_diff_eq!(median(&referenced), 0.0, epsilon = 1e-12);
    }
}
