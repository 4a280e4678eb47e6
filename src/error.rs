use thiserror::Error;

#[derive(Debug, Error)]
pub enum RhythmError {
    #[error("unsupported filter option: {0}")]
    UnsupportedFilter(String),
    #[error("sample rate must be greater than zero, got {0}")]
    InvalidSampleRate(f64),
    #[error("{kind} cutoff normalizes to {normalized}, expected a value in (0, 1)")]
    InvalidCutoff { kind: &'static str, normalized: f64 },
    #[error("trace of {len} samples is too short for zero-phase filtering (needs more than {padlen})")]
    TraceTooShort { len: usize, padlen: usize },
    #[error("you must provide either a sample_rate or timestamps")]
    MissingSampleClock,
    #[error("provide either a sample_rate or timestamps, not both")]
    AmbiguousSampleClock,
    #[error("invalid timestamps: {0}")]
    InvalidTimestamps(String),
    #[error("channel selection argument is required for CAR filtering")]
    MissingChannelSelection,
    #[error("channel {index} out of range for {channels} channels")]
    ChannelOutOfRange { index: usize, channels: usize },
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("not enough extrema to interpolate ({peaks} peaks, {troughs} troughs)")]
    InsufficientExtrema { peaks: usize, troughs: usize },
}

pub type Result<T> = std::result::Result<T, RhythmError>;
