//! Real-time audio spectrum analysis into a fixed number of smoothed bar
//! heights.
//!
//! A capture thread feeds blocks of interleaved samples into an
//! [`AudioProcessor`]; any other thread polls [`AudioProcessor::snapshot`]
//! for the current bar array.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod monitor;

pub use audio::AudioProcessor;
pub use config::{AudioConfig, Config};
pub use error::{AnalysisError, ConfigError};
