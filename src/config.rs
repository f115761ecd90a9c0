use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::audio::AnalyzerKind;
use crate::cli::Args;

/// Where low frequencies end up in the bar array
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    /// Ascending frequency, left to right
    Linear,
    /// Bass in the middle, highs mirrored to both edges
    #[default]
    #[value(name = "bass_center", alias = "bass-center")]
    BassCenter,
    /// Bass mirrored to both edges, highs in the middle
    #[value(name = "bass_edges", alias = "bass-edges")]
    BassEdges,
}

/// Processing backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Plain analyzer output
    #[default]
    Internal,
    /// Analyzer output shaped by a bass/treble-lifting EQ curve
    Glava,
}

/// How the monitor prints each polled bar array
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// One redrawn line of block characters
    #[default]
    Meter,
    /// One line of space-separated values per poll
    Raw,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub monitor: MonitorConfig,
}

/// Parameters of the audio-to-bars pipeline. Immutable once a processor is
/// built from them; reconfiguring means building a new processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// PulseAudio sink to monitor (None = default sink)
    pub device: Option<String>,
    pub bar_count: usize,
    pub samplerate: u32,
    pub blocksize: usize,
    pub buffer_blocks: usize,
    pub exp_smooth_factor: f32,
    pub max_change_speed: f32,
    pub noise_floor: f32,
    pub peak_sharpness: f32,
    pub avg_window_size: usize,
    pub visualization_mode: VisualizationMode,
    pub fmin: f32,
    pub fmax: f32,
    pub cqt_bins_per_bar: usize,
    pub bins_per_octave: usize,
    pub accent_threshold: f32,
    pub accent_boost: f32,
    pub backend: Backend,
    pub analyzer: AnalyzerKind,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            bar_count: 100,
            samplerate: 44100,
            blocksize: 1024,
            buffer_blocks: 32,
            exp_smooth_factor: 0.3,
            max_change_speed: 0.6,
            noise_floor: 0.02,
            peak_sharpness: 2.0,
            avg_window_size: 5,
            visualization_mode: VisualizationMode::BassCenter,
            fmin: 100.0,
            fmax: 6000.0,
            cqt_bins_per_bar: 3,
            bins_per_octave: 12,
            accent_threshold: 5.0,
            accent_boost: 5.0,
            backend: Backend::Internal,
            analyzer: AnalyzerKind::Cqt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How often the bar array is polled, in milliseconds
    pub poll_interval_ms: u64,
    pub style: OutputStyle,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30,
            style: OutputStyle::Meter,
        }
    }
}

/// Named tuning bundles reproducing earlier generations of the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Current defaults: constant-Q with accents, bass in the middle
    Desktop,
    /// First generation: constant-Q, no accent boost, linear layout
    Classic,
    /// FFT with sensitive accent detection
    Punchy,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Desktop, Preset::Classic, Preset::Punchy];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Desktop => "desktop",
            Preset::Classic => "classic",
            Preset::Punchy => "punchy",
        }
    }

    /// Overwrite the tuning fields of `audio`. Device, sample rate and block
    /// size describe the input stream and are left alone.
    pub fn apply(&self, audio: &mut AudioConfig) {
        let base = AudioConfig::default();
        let tuned = match self {
            Preset::Desktop => base,
            Preset::Classic => AudioConfig {
                bar_count: 64,
                exp_smooth_factor: 0.4,
                max_change_speed: 0.5,
                peak_sharpness: 1.4,
                visualization_mode: VisualizationMode::Linear,
                accent_boost: 1.0,
                analyzer: AnalyzerKind::Cqt,
                ..base
            },
            Preset::Punchy => AudioConfig {
                bar_count: 64,
                exp_smooth_factor: 0.4,
                max_change_speed: 0.5,
                peak_sharpness: 1.4,
                visualization_mode: VisualizationMode::Linear,
                accent_threshold: 1.8,
                accent_boost: 2.0,
                analyzer: AnalyzerKind::Fft,
                ..base
            },
        };

        *audio = AudioConfig {
            device: audio.device.take(),
            samplerate: audio.samplerate,
            blocksize: audio.blocksize,
            buffer_blocks: audio.buffer_blocks,
            ..tuned
        };
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == lower)
            .ok_or_else(|| format!("Unknown preset '{}': expected desktop, classic or punchy", s))
    }
}

/// Audio keys accepted at the top level of older, flat config files
const LEGACY_AUDIO_KEYS: [&str; 17] = [
    "bar_count",
    "samplerate",
    "blocksize",
    "buffer_blocks",
    "exp_smooth_factor",
    "max_change_speed",
    "noise_floor",
    "peak_sharpness",
    "avg_window_size",
    "visualization_mode",
    "fmin",
    "fmax",
    "cqt_bins_per_bar",
    "bins_per_octave",
    "accent_threshold",
    "accent_boost",
    "backend",
];

/// Move flat top-level audio keys into an `[audio]` table.
///
/// Files that already have an `[audio]` table are left untouched.
fn migrate_legacy(table: &mut toml::Table) {
    if table.contains_key("audio") {
        return;
    }

    let mut audio = toml::Table::new();
    for key in LEGACY_AUDIO_KEYS {
        if let Some(value) = table.remove(key) {
            audio.insert(key.to_string(), value);
        }
    }

    if !audio.is_empty() {
        debug!("Migrating {} flat audio keys into [audio]", audio.len());
        table.insert("audio".to_string(), toml::Value::Table(audio));
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config at {}", path.display()))
    }

    /// Parse TOML text, accepting the legacy flat layout.
    pub fn parse(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;
        migrate_legacy(&mut table);
        let config = toml::Value::Table(table).try_into()?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/spectrobars/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("spectrobars").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    /// Returns None if file doesn't exist, logs warning on parse errors
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("{:#}; using defaults", e);
                None
            }
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::write_template(&path)?;
        Ok(path)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, Self::generate_config_template())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# Spectrobars Configuration
# This file is auto-generated. Edit as needed.

[audio]
# PulseAudio sink to monitor (omit for the default sink)
# device = "alsa_output.pci-0000_00_1f.3.analog-stereo"
# Number of output bars
bar_count = 100
# Input sample rate in Hz
samplerate = 44100
# Samples per delivered block
blocksize = 1024
# Ring buffer capacity, in blocks
buffer_blocks = 32
# Exponential smoothing factor (0.0-1.0, higher = more responsive)
exp_smooth_factor = 0.3
# Maximum change per bar per cycle (0.0-2.0)
max_change_speed = 0.6
# Values below this become zero after smoothing
noise_floor = 0.02
# Contrast exponent applied before square-root compression
peak_sharpness = 2.0
# Moving-average depth, in cycles
avg_window_size = 5
# Layout: "linear", "bass_center" or "bass_edges"
visualization_mode = "bass_center"
# Analysis frequency range in Hz
fmin = 100.0
fmax = 6000.0
# Internal resolution: analysis bins per output bar
cqt_bins_per_bar = 3
# Minimum constant-Q resolution
bins_per_octave = 12
# Energy ratio over the recent mean that counts as an accent
accent_threshold = 5.0
# Maximum gain applied on an accent (1.0 disables accents)
accent_boost = 5.0
# Backend: "internal" or "glava" (adds a bass/treble EQ curve)
backend = "internal"
# Analyzer: "cqt" (log-spaced) or "fft" (linear, lighter)
analyzer = "cqt"

[monitor]
# How often bars are polled, in milliseconds
poll_interval_ms = 30
# Output: "meter" or "raw"
style = "meter"
"#
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(preset) = args.preset {
            preset.apply(&mut self.audio);
        }

        // Audio settings
        if let Some(ref device) = args.device {
            self.audio.device = Some(device.clone());
        }
        if let Some(rate) = args.samplerate {
            self.audio.samplerate = rate;
        }
        if let Some(size) = args.blocksize {
            self.audio.blocksize = size;
        }
        if let Some(bars) = args.bars {
            self.audio.bar_count = bars;
        }
        if let Some(mode) = args.mode {
            self.audio.visualization_mode = mode;
        }
        if let Some(analyzer) = args.analyzer {
            self.audio.analyzer = analyzer;
        }
        if let Some(backend) = args.backend {
            self.audio.backend = backend;
        }

        // Monitor settings
        if let Some(style) = args.style {
            self.monitor.style = style;
        }
        if let Some(interval) = args.interval {
            self.monitor.poll_interval_ms = interval.max(1);
        }
    }
}
