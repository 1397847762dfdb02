//! The fixed set of live-tunable parameters and their declared ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A live-tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Scales the oscillator frequency.
    FrequencyMultiplier,
    /// Output gain applied before the final clamp.
    AmplitudeScaling,
    /// Weight of harmonics 2..n in additive synthesis.
    HarmonicContent,
    /// Fraction of a cycle added to the oscillator phase.
    PhaseOffset,
    /// Blend between two functions: 0 = first, 1 = second.
    MorphFactor,
}

impl Param {
    pub const ALL: [Param; 5] = [
        Param::FrequencyMultiplier,
        Param::AmplitudeScaling,
        Param::HarmonicContent,
        Param::PhaseOffset,
        Param::MorphFactor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::FrequencyMultiplier => "frequency_multiplier",
            Param::AmplitudeScaling => "amplitude_scaling",
            Param::HarmonicContent => "harmonic_content",
            Param::PhaseOffset => "phase_offset",
            Param::MorphFactor => "morph_factor",
        }
    }

    /// Declared `(min, max)` range.
    pub fn range(self) -> (f64, f64) {
        match self {
            Param::FrequencyMultiplier => (0.125, 8.0),
            _ => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            Param::FrequencyMultiplier | Param::AmplitudeScaling | Param::HarmonicContent => 1.0,
            Param::PhaseOffset | Param::MorphFactor => 0.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Param {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Param::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownParameter(s.to_string()))
    }
}

/// One value per [`Param`], each inside its declared range.
///
/// `Copy`, so a snapshot is a plain value that cannot change under a consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    values: [f64; 5],
}

impl Default for ParameterSet {
    fn default() -> Self {
        let mut values = [0.0; 5];
        for p in Param::ALL {
            values[p.index()] = p.default_value();
        }
        Self { values }
    }
}

impl ParameterSet {
    pub fn get(&self, param: Param) -> f64 {
        self.values[param.index()]
    }

    /// Store `value` clamped to the declared range. Returns `true` if the
    /// input had to be clamped. NaN is treated as out of range and stores the
    /// range minimum.
    pub fn set(&mut self, param: Param, value: f64) -> bool {
        let (lo, hi) = param.range();
        let stored = if value.is_nan() {
            lo
        } else {
            value.clamp(lo, hi)
        };
        self.values[param.index()] = stored;
        stored != value
    }

    /// Builder-style [`set`](Self::set), discarding the clamp flag.
    pub fn with(mut self, param: Param, value: f64) -> Self {
        self.set(param, value);
        self
    }

    pub fn frequency_multiplier(&self) -> f64 {
        self.get(Param::FrequencyMultiplier)
    }

    pub fn amplitude_scaling(&self) -> f64 {
        self.get(Param::AmplitudeScaling)
    }

    pub fn harmonic_content(&self) -> f64 {
        self.get(Param::HarmonicContent)
    }

    pub fn phase_offset(&self) -> f64 {
        self.get(Param::PhaseOffset)
    }

    pub fn morph_factor(&self) -> f64 {
        self.get(Param::MorphFactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_inside_ranges() {
        let set = ParameterSet::default();
        for p in Param::ALL {
            let (lo, hi) = p.range();
            let v = set.get(p);
            assert!(v >= lo && v <= hi, "{p} default {v} outside [{lo}, {hi}]");
        }
        assert_eq!(set.frequency_multiplier(), 1.0);
        assert_eq!(set.morph_factor(), 0.0);
    }

    #[test]
    fn frequency_multiplier_range_is_positive() {
        let (lo, _) = Param::FrequencyMultiplier.range();
        assert!(lo > 0.0);
    }

    #[test]
    fn set_clamps_and_reports() {
        let mut set = ParameterSet::default();
        assert!(!set.set(Param::MorphFactor, 0.25));
        assert_eq!(set.morph_factor(), 0.25);

        assert!(set.set(Param::MorphFactor, 1.5));
        assert_eq!(set.morph_factor(), 1.0);

        assert!(set.set(Param::FrequencyMultiplier, 0.0));
        assert_eq!(set.frequency_multiplier(), 0.125);

        assert!(set.set(Param::PhaseOffset, f64::NAN));
        assert_eq!(set.phase_offset(), 0.0);
    }

    #[test]
    fn names_round_trip() {
        for p in Param::ALL {
            assert_eq!(p.name().parse::<Param>().unwrap(), p);
        }
        assert!(matches!(
            "volume".parse::<Param>(),
            Err(ConfigError::UnknownParameter(_))
        ));
    }

    #[test]
    fn serde_names_match_display_names() {
        for p in Param::ALL {
            let yaml = serde_yaml::to_string(&p).unwrap();
            assert_eq!(yaml.trim(), p.name());
        }
    }
}
