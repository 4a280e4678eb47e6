pub mod conditioning;
pub mod config;
pub mod data_loading;
pub mod error;
pub mod extrema;
pub mod features;
pub mod filtering;
pub mod movement;
pub mod output;
pub mod phase_analysis;
pub mod preprocessing;

pub use config::{FeatureConfig, MovementParams, SignalClassPreset};
pub use error::{Result, RhythmError};
pub use extrema::{get_amplitude_trace, get_set_point_trace, ExtremaSeries};
pub use features::{compute_features, compute_features_with, FeatureSet};
pub use filtering::{filter_car, filter_car_channels, filter_signal, ChannelSelection, FilterSpec};
pub use movement::{detect_movement_periods, MovementMasks, SampleClock};
pub use phase_analysis::{compute_phase_for_movement, PhaseResult};
