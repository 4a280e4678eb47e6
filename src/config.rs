use crate::filtering::FilterSpec;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Band-pass cutoffs and movement threshold tuned for one kind of rhythmic behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalClassPreset {
    pub band_pass_cutoffs: (f64, f64),
    pub movement_threshold: f64,
}

pub const DEFAULT_SIGNAL_CLASS: &str = "default";

const DEFAULT_PRESET: SignalClassPreset = SignalClassPreset {
    band_pass_cutoffs: (0.05, 30.0),
    movement_threshold: 0.01,
};

pub static SIGNAL_CLASS_PRESETS: &[(&str, SignalClassPreset)] = &[
    (
        "whisking",
        SignalClassPreset {
            band_pass_cutoffs: (8.0, 30.0),
            movement_threshold: 0.01,
        },
    ),
    (
        "setpoint",
        SignalClassPreset {
            band_pass_cutoffs: (0.1, 4.0),
            movement_threshold: 0.005,
        },
    ),
    (
        "breathing",
        SignalClassPreset {
            band_pass_cutoffs: (0.05, 8.0),
            movement_threshold: 0.002,
        },
    ),
    (
        "jaw_movement",
        SignalClassPreset {
            band_pass_cutoffs: (0.05, 10.0),
            movement_threshold: 0.02,
        },
    ),
    (
        "tongue_movement",
        SignalClassPreset {
            band_pass_cutoffs: (0.5, 12.0),
            movement_threshold: 0.015,
        },
    ),
    (DEFAULT_SIGNAL_CLASS, DEFAULT_PRESET),
];

pub fn lookup_preset(signal_class: &str) -> Option<SignalClassPreset> {
    SIGNAL_CLASS_PRESETS
        .iter()
        .find(|(name, _)| *name == signal_class)
        .map(|(_, preset)| *preset)
}

/// Preset for `signal_class`, falling back to the "default" entry for unknown names.
pub fn preset_for(signal_class: &str) -> SignalClassPreset {
    lookup_preset(signal_class).unwrap_or_else(|| {
        log::debug!(
            "Unknown signal class '{}', using '{}' preset",
            signal_class,
            DEFAULT_SIGNAL_CLASS
        );
        DEFAULT_PRESET
    })
}

pub fn presets_as_json() -> serde_json::Result<String> {
    let table: BTreeMap<&str, SignalClassPreset> =
        SIGNAL_CLASS_PRESETS.iter().copied().collect();
    serde_json::to_string_pretty(&table)
}

/// Thresholds and durations (seconds) for movement segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    /// Defaults to the standard deviation of the velocity trace.
    pub velocity_threshold: Option<f64>,
    /// Defaults to twice the standard deviation of the trace.
    pub amplitude_threshold: Option<f64>,
    /// Minimum length of a kept movement epoch.
    pub duration: f64,
    /// Quiet time required before an epoch is considered over.
    pub min_stable_duration: f64,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            velocity_threshold: None,
            amplitude_threshold: None,
            duration: 1.0,
            min_stable_duration: 0.5,
        }
    }
}

pub const DEFAULT_HIGHPASS_CUTOFF: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub preset: SignalClassPreset,
    pub movement: MovementParams,
    pub highpass_cutoff: f64,
}

impl FeatureConfig {
    /// Config for a named signal class; the override replaces the preset's movement threshold.
    pub fn for_class(signal_class: &str, movement_threshold_override: Option<f64>) -> Self {
        let mut preset = preset_for(signal_class);
        if let Some(threshold) = movement_threshold_override {
            preset.movement_threshold = threshold;
        }
        Self {
            preset,
            movement: MovementParams {
                velocity_threshold: Some(preset.movement_threshold),
                ..MovementParams::default()
            },
            highpass_cutoff: DEFAULT_HIGHPASS_CUTOFF,
        }
    }

    pub fn band_pass(&self) -> FilterSpec {
        let (low, high) = self.preset.band_pass_cutoffs;
        FilterSpec::Bandpass { low, high }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::for_class(DEFAULT_SIGNAL_CLASS, None)
    }
}

/// Extract phase, frequency, amplitude and movement periods from tracking traces
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// CSV file with one column per tracked channel
    #[arg(required_unless_present = "list_presets")]
    pub input_path: Option<PathBuf>,

    /// Sampling rate of the traces in Hz
    #[arg(long, required_unless_present = "list_presets")]
    pub sample_rate: Option<f64>,

    /// Signal class selecting band-pass cutoffs and movement threshold
    #[arg(long, default_value = DEFAULT_SIGNAL_CLASS)]
    pub signal_class: String,

    /// Override the preset's movement (velocity) threshold
    #[arg(long)]
    pub movement_threshold: Option<f64>,

    /// Minimum movement epoch duration in seconds
    #[arg(long, default_value = "1.0")]
    pub min_duration: f64,

    /// Quiet time in seconds required to end a movement epoch
    #[arg(long, default_value = "0.5")]
    pub min_stable_duration: f64,

    /// High-pass cutoff in Hz applied before phase extraction
    #[arg(long, default_value = "2.0")]
    pub highpass_cutoff: f64,

    /// Optional filter applied to every channel before feature extraction
    /// (e.g. "lowpass:100", "highpass:0.3", "bandpass:4,30", "LFP")
    #[arg(long)]
    pub prefilter: Option<FilterSpec>,

    /// Output CSV path, defaults to stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the signal class presets as JSON and exit
    #[arg(long)]
    pub list_presets: bool,
}

impl Args {
    pub fn feature_config(&self) -> FeatureConfig {
        let mut config = FeatureConfig::for_class(&self.signal_class, self.movement_threshold);
        config.movement.duration = self.min_duration;
        config.movement.min_stable_duration = self.min_stable_duration;
        config.highpass_cutoff = self.highpass_cutoff;
        config
    }
}
