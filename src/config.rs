//! Session configuration: mapping, synthesis and control settings loaded
//! from `~/.math-melody/config.yaml` or an explicit path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::mapping::{default_bindings, ControlBinding};
use crate::expr::derivative::{DerivativeEstimator, DEFAULT_CEILING};
use crate::mapping::config::MappingConfig;

/// Invalid configuration. Always fatal: rejected before any sampling begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("x range must satisfy min < max, got ({min}, {max})")]
    XRange { min: f64, max: f64 },
    #[error("sample count must be positive")]
    SampleCount,
    #[error("note {0} is outside the MIDI range 0-127")]
    NoteOutOfRange(u8),
    #[error("min note {min} is above max note {max}")]
    NoteRange { min: u8, max: u8 },
    #[error("durations must satisfy 0 < min <= max, got ({min}, {max})")]
    DurationRange { min: f64, max: f64 },
    #[error("harmonic count {0} outside 1-64")]
    Harmonics(u32),
    #[error("transpose {0} outside -24..=24 semitones")]
    Transpose(i32),
    #[error("bend range {0} outside 1-24 semitones")]
    BendRange(u8),
    #[error("tempo {0} outside 40-240 BPM")]
    Tempo(f64),
    #[error("fixed rhythm step must be positive, got {0}")]
    RhythmStep(f64),
    #[error("velocity {0} outside 1-127")]
    Velocity(u8),
    #[error("scale root pitch class {0} outside 0-11")]
    ScaleRoot(u8),
    #[error("scale offset {0} outside 0-11")]
    ScaleOffset(u8),
    #[error("scale has no offsets")]
    EmptyScale,
    #[error("unknown scale '{0}'")]
    UnknownScale(String),
    #[error("no scale tone lies between notes {min} and {max}")]
    ScaleOutsideRange { min: u8, max: u8 },
    #[error("sample rate must be positive")]
    SampleRate,
    #[error("buffer size must be positive")]
    BufferSize,
    #[error("oscillator expressions take exactly one variable, got {0}")]
    VoiceVariables(usize),
    #[error("frequency must be positive and finite, got {0}")]
    Frequency(f64),
    #[error("derivative step must be positive and finite, got {0}")]
    DerivativeStep(f64),
    #[error("derivative ceiling must be positive, got {0}")]
    DerivativeCeiling(f64),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("control index {0} is bound more than once")]
    DuplicateControl(u32),
    #[error("MIDI channel filter {0} outside 0-15")]
    ChannelFilter(u8),
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Everything a session needs besides the expression text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mapping: MappingConfig,
    pub sample_rate: u32,
    /// Samples per render buffer; parameter snapshots are taken per buffer.
    pub buffer_size: usize,
    /// Base oscillator frequency in Hz.
    pub frequency: f64,
    /// Overrides the default finite-difference step when set.
    pub derivative_step: Option<f64>,
    pub derivative_ceiling: f64,
    /// Control index → parameter bindings.
    pub controls: Vec<ControlBinding>,
    /// Only accept control messages on this MIDI channel (0-15).
    pub channel_filter: Option<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mapping: MappingConfig::default(),
            sample_rate: 44_100,
            buffer_size: 512,
            frequency: 220.0,
            derivative_step: None,
            derivative_ceiling: DEFAULT_CEILING,
            controls: default_bindings(),
            channel_filter: None,
        }
    }
}

impl SessionConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Standard config location (`~/.math-melody/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".math-melody").join("config.yaml"))
    }

    /// Load from the standard location. A missing file is not an error.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mapping.validate()?;
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::BufferSize);
        }
        if !(self.frequency > 0.0 && self.frequency.is_finite()) {
            return Err(ConfigError::Frequency(self.frequency));
        }
        if let Some(h) = self.derivative_step {
            // h² is the second-difference divisor; it must not underflow.
            if !(h > 0.0 && h.is_finite() && h * h > 0.0) {
                return Err(ConfigError::DerivativeStep(h));
            }
        }
        if !(self.derivative_ceiling > 0.0) {
            return Err(ConfigError::DerivativeCeiling(self.derivative_ceiling));
        }
        if let Some(channel) = self.channel_filter {
            if channel > 15 {
                return Err(ConfigError::ChannelFilter(channel));
            }
        }
        crate::control::mapping::validate_bindings(&self.controls)?;
        Ok(())
    }

    /// Derivative estimator for the configured range, step and ceiling.
    pub fn derivative_estimator(&self) -> DerivativeEstimator {
        let step = self.derivative_step.unwrap_or_else(|| {
            DerivativeEstimator::default_step(self.mapping.x_range, self.mapping.sample_count)
        });
        DerivativeEstimator::new(step, self.derivative_ceiling)
    }
}
