use thiserror::Error;

/// Invalid processor configuration, reported when the processor is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("bar_count must be at least 1")]
    ZeroBars,

    #[error("fmax ({fmax} Hz) must be greater than fmin ({fmin} Hz)")]
    InvalidFrequencyRange { fmin: f32, fmax: f32 },

    #[error("fmin ({fmin} Hz) leaves no usable range below Nyquist at {samplerate} Hz")]
    RangeAboveNyquist { fmin: f32, samplerate: u32 },

    #[error("{name} must be greater than zero")]
    NonPositive { name: &'static str },

    #[error("{name} must be a finite number")]
    NotFinite { name: &'static str },
}

/// A constant-Q transform that could not produce a usable frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("analysis window has {actual} samples, expected {expected}")]
    WindowLength { expected: usize, actual: usize },

    #[error("transform produced non-finite magnitudes")]
    NonFinite,
}
