use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::audio::AnalyzerKind;
use crate::config::{Backend, OutputStyle, Preset, VisualizationMode};

/// Where audio samples come from
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SourceKind {
    /// Interleaved f32le samples on standard input
    Stdin,
    /// Monitor of a PulseAudio/PipeWire sink
    Pulse,
}

#[derive(Parser, Debug)]
#[command(name = "spectrobars")]
#[command(author, version, about = "Real-time audio spectrum to smoothed bar heights")]
pub struct Args {
    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a commented default config to the XDG path and exit
    #[arg(long)]
    pub init_config: bool,

    /// Tuning preset: desktop, classic, punchy
    #[arg(short, long, ignore_case = true)]
    pub preset: Option<Preset>,

    /// Number of bars
    #[arg(short, long)]
    pub bars: Option<usize>,

    /// Layout: linear, bass_center, bass_edges
    #[arg(short, long)]
    pub mode: Option<VisualizationMode>,

    /// Spectral analyzer
    #[arg(long)]
    pub analyzer: Option<AnalyzerKind>,

    /// Processing backend
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Audio source
    #[arg(short, long, default_value = "stdin")]
    pub source: SourceKind,

    /// Interleaved channels in the stdin stream
    #[arg(long, default_value = "2")]
    pub channels: usize,

    /// Sample rate of the input in Hz
    #[arg(long)]
    pub samplerate: Option<u32>,

    /// Samples per block
    #[arg(long)]
    pub blocksize: Option<usize>,

    /// PulseAudio sink to monitor
    #[arg(short, long)]
    pub device: Option<String>,

    /// List PulseAudio sources and exit
    #[arg(long)]
    pub list_sources: bool,

    /// Output style: meter or raw
    #[arg(long)]
    pub style: Option<OutputStyle>,

    /// Poll interval in milliseconds
    #[arg(short, long)]
    pub interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_stereo_stdin() {
        let args = Args::parse_from(["spectrobars"]);
        assert_eq!(args.source, SourceKind::Stdin);
        assert_eq!(args.channels, 2);
        assert!(args.preset.is_none());
        assert!(args.bars.is_none());
    }

    #[test]
    fn parses_enums() {
        let args = Args::parse_from([
            "spectrobars",
            "--preset",
            "Punchy",
            "--backend",
            "glava",
            "--style",
            "raw",
            "--source",
            "pulse",
        ]);
        assert_eq!(args.preset, Some(Preset::Punchy));
        assert_eq!(args.backend, Some(Backend::Glava));
        assert_eq!(args.style, Some(OutputStyle::Raw));
        assert_eq!(args.source, SourceKind::Pulse);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Args::try_parse_from(["spectrobars", "--mode", "spiral"]).is_err());
    }
}
