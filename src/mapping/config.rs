//! Mapping configuration: how sampled function values become notes.

use std::f64::consts::PI;

use serde::{Deserialize, Deserializer, Serialize};

use super::note::parse_note_name;
use super::scale::Scale;
use crate::config::ConfigError;

/// Upper bound on additive-synthesis partials.
pub const MAX_HARMONICS: u32 = 64;

/// A scale given by name or as an explicit offset list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    Named(String),
    Offsets(Vec<u8>),
}

/// How note start times advance through a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rhythm {
    /// Every note lasts `step` and the next starts `step` later.
    Fixed { step: f64 },
    /// Duration follows |f(x)| rescaled into `[min_duration, max_duration]`;
    /// the next note starts when the previous one ends.
    Derived,
}

impl Default for Rhythm {
    fn default() -> Self {
        Rhythm::Fixed { step: 0.5 }
    }
}

/// Parameters of a function → note mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub x_range: (f64, f64),
    pub sample_count: usize,
    pub min_note: u8,
    pub max_note: u8,
    pub scale: Option<ScaleSpec>,
    /// MIDI number, or a note name such as `"C4"` in configuration files.
    #[serde(deserialize_with = "note_number_or_name")]
    pub root_note: u8,
    pub min_duration: f64,
    pub max_duration: f64,
    pub harmonics: u32,
    /// Semitones added to every raw pitch before quantization.
    pub transpose: i32,
    /// Attach pitch-bend values carrying the fractional pitch (no scale only).
    pub microtonal: bool,
    /// Pitch-wheel span in semitones for microtonal bends.
    pub bend_range: u8,
    /// Beats per minute, used to convert beat times to seconds.
    pub tempo: f64,
    pub rhythm: Rhythm,
    /// Velocity used when the derivative is flat across a whole batch.
    pub default_velocity: u8,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            x_range: (-2.0 * PI, 2.0 * PI),
            sample_count: 32,
            min_note: 36,
            max_note: 96,
            scale: None,
            root_note: 60,
            min_duration: 0.25,
            max_duration: 1.0,
            harmonics: 1,
            transpose: 0,
            microtonal: false,
            bend_range: 2,
            tempo: 120.0,
            rhythm: Rhythm::default(),
            default_velocity: 100,
        }
    }
}

impl MappingConfig {
    /// Check every field; returns the resolved scale, if one is configured.
    pub fn validate(&self) -> Result<Option<Scale>, ConfigError> {
        let (lo, hi) = self.x_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConfigError::XRange { min: lo, max: hi });
        }
        if self.sample_count == 0 {
            return Err(ConfigError::SampleCount);
        }
        if self.max_note > 127 {
            return Err(ConfigError::NoteOutOfRange(self.max_note));
        }
        if self.root_note > 127 {
            return Err(ConfigError::NoteOutOfRange(self.root_note));
        }
        if self.min_note > self.max_note {
            return Err(ConfigError::NoteRange {
                min: self.min_note,
                max: self.max_note,
            });
        }
        if !(self.min_duration > 0.0
            && self.max_duration.is_finite()
            && self.min_duration <= self.max_duration)
        {
            return Err(ConfigError::DurationRange {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        if !(1..=MAX_HARMONICS).contains(&self.harmonics) {
            return Err(ConfigError::Harmonics(self.harmonics));
        }
        if !(-24..=24).contains(&self.transpose) {
            return Err(ConfigError::Transpose(self.transpose));
        }
        if !(1..=24).contains(&self.bend_range) {
            return Err(ConfigError::BendRange(self.bend_range));
        }
        if !(40.0..=240.0).contains(&self.tempo) {
            return Err(ConfigError::Tempo(self.tempo));
        }
        if let Rhythm::Fixed { step } = self.rhythm {
            if !(step > 0.0 && step.is_finite()) {
                return Err(ConfigError::RhythmStep(step));
            }
        }
        if !(1..=127).contains(&self.default_velocity) {
            return Err(ConfigError::Velocity(self.default_velocity));
        }

        let scale = match &self.scale {
            None => None,
            Some(ScaleSpec::Named(name)) => Some(Scale::named(name, self.root_note % 12)?),
            Some(ScaleSpec::Offsets(offsets)) => Some(Scale::new(self.root_note % 12, offsets)?),
        };
        if let Some(s) = &scale {
            if !s.has_tone_in(i32::from(self.min_note), i32::from(self.max_note)) {
                return Err(ConfigError::ScaleOutsideRange {
                    min: self.min_note,
                    max: self.max_note,
                });
            }
        }
        Ok(scale)
    }
}

fn note_number_or_name<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NoteRef {
        Number(u8),
        Name(String),
    }

    match NoteRef::deserialize(deserializer)? {
        NoteRef::Number(n) => Ok(n),
        NoteRef::Name(name) => parse_note_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid note name: {name}"))),
    }
}
