//! Phase-accumulating oscillator that evaluates an expression per sample.

use std::f64::consts::TAU;

use tracing::debug;

use crate::config::ConfigError;
use crate::control::ParameterSet;
use crate::expr::{BinaryOp, Expr, Expression, Func, RealFn};
use crate::mapping::MAX_HARMONICS;

/// Phase in `[0, 2π)` and the rate it advances at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorState {
    phase: f64,
    sample_rate: u32,
}

impl OscillatorState {
    pub fn new(sample_rate: u32) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        Ok(Self {
            phase: 0.0,
            sample_rate,
        })
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Phase increment per sample for `frequency` Hz.
    pub fn step(&self, frequency: f64) -> f64 {
        let step = TAU * frequency / f64::from(self.sample_rate);
        if step.is_finite() {
            step
        } else {
            0.0
        }
    }

    fn advance(&mut self, step: f64) {
        self.phase = wrap_phase(self.phase + step);
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Map any finite angle into `[0, 2π)`.
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// The compiled waveform: either the base expression alone, or one partial
/// `base(x)·sin(k·x)` per harmonic, all built once.
#[derive(Debug, Clone)]
pub struct Voice {
    base: Expression,
    partials: Vec<Expression>,
}

impl Voice {
    /// `harmonics == 1` plays the base expression as is; more builds the
    /// additive partials for `k = 1..=harmonics`.
    pub fn new(base: Expression, harmonics: u32) -> Result<Self, ConfigError> {
        if base.variables().len() != 1 {
            return Err(ConfigError::VoiceVariables(base.variables().len()));
        }
        if !(1..=MAX_HARMONICS).contains(&harmonics) {
            return Err(ConfigError::Harmonics(harmonics));
        }
        if harmonics == 1 {
            return Ok(Self {
                base,
                partials: Vec::new(),
            });
        }

        let var = base.variables()[0].clone();
        let partials = (1..=harmonics)
            .map(|k| {
                let carrier = Expr::call(
                    Func::Sin,
                    Expr::binary(BinaryOp::Mul, Expr::number(f64::from(k)), Expr::var(&var)),
                );
                let tree = Expr::binary(BinaryOp::Mul, base.tree().clone(), carrier);
                Expression::from_tree(tree, &[var.as_str()])
            })
            .collect();
        Ok(Self { base, partials })
    }

    pub fn base(&self) -> &Expression {
        &self.base
    }

    pub fn partials(&self) -> &[Expression] {
        &self.partials
    }

    pub fn harmonics(&self) -> u32 {
        self.partials.len().max(1) as u32
    }

    /// One output value at `phase`, clamped to `[-1, 1]`. Partials `k ≥ 2`
    /// are scaled by `harmonic_weight`. Returns the number of failed
    /// evaluations alongside the value; a failed term contributes 0.0.
    fn value(&self, phase: f64, harmonic_weight: f64) -> (f64, usize) {
        if self.partials.is_empty() {
            return match self.base.at(phase) {
                Ok(v) => (v.clamp(-1.0, 1.0), 0),
                Err(_) => (0.0, 1),
            };
        }
        let mut sum = 0.0;
        let mut failed = 0;
        for (i, partial) in self.partials.iter().enumerate() {
            let weight = if i == 0 { 1.0 } else { harmonic_weight };
            match partial.at(phase) {
                Ok(v) => sum += weight * v.clamp(-1.0, 1.0),
                Err(_) => failed += 1,
            }
        }
        (sum.clamp(-1.0, 1.0), failed)
    }
}

/// Per-buffer shaping taken from one parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Output gain, applied before the final clamp.
    pub gain: f64,
    /// Weight of harmonics `k ≥ 2`.
    pub harmonic_weight: f64,
    /// Fraction of a cycle added to the evaluation phase.
    pub phase_offset: f64,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            gain: 1.0,
            harmonic_weight: 1.0,
            phase_offset: 0.0,
        }
    }
}

impl From<&ParameterSet> for Tone {
    fn from(params: &ParameterSet) -> Self {
        Self {
            gain: params.amplitude_scaling(),
            harmonic_weight: params.harmonic_content(),
            phase_offset: params.phase_offset(),
        }
    }
}

/// Samples from one call plus the count of failed evaluations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBlock {
    pub samples: Vec<f64>,
    pub domain_errors: usize,
}

/// Owns an [`OscillatorState`]; nothing else advances its phase.
#[derive(Debug, Clone)]
pub struct Oscillator {
    state: OscillatorState,
}

impl Oscillator {
    pub fn new(sample_rate: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            state: OscillatorState::new(sample_rate)?,
        })
    }

    pub fn state(&self) -> &OscillatorState {
        &self.state
    }

    /// Rewind to phase 0.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// `count` samples of `voice` at `frequency` Hz with the default tone.
    pub fn generate_samples(&mut self, voice: &Voice, frequency: f64, count: usize) -> SampleBlock {
        self.render(voice, frequency, count, Tone::default())
    }

    /// `count` samples shaped by `tone`.
    pub fn render(&mut self, voice: &Voice, frequency: f64, count: usize, tone: Tone) -> SampleBlock {
        let mut iter = self.samples(voice, frequency, count, tone);
        let samples: Vec<f64> = iter.by_ref().collect();
        let domain_errors = iter.domain_errors();
        if domain_errors > 0 {
            debug!(domain_errors, count, "oscillator block had domain-error fallbacks");
        }
        SampleBlock {
            samples,
            domain_errors,
        }
    }

    /// Lazy form of [`render`](Self::render). The phase advances only as
    /// samples are pulled, so a partially consumed iterator leaves the
    /// oscillator exactly where the next sample would start.
    pub fn samples<'a>(
        &'a mut self,
        voice: &'a Voice,
        frequency: f64,
        count: usize,
        tone: Tone,
    ) -> Samples<'a> {
        let step = self.state.step(frequency);
        Samples {
            state: &mut self.state,
            voice,
            step,
            tone,
            remaining: count,
            domain_errors: 0,
        }
    }
}

/// Finite iterator over oscillator samples.
pub struct Samples<'a> {
    state: &'a mut OscillatorState,
    voice: &'a Voice,
    step: f64,
    tone: Tone,
    remaining: usize,
    domain_errors: usize,
}

impl Samples<'_> {
    pub fn domain_errors(&self) -> usize {
        self.domain_errors
    }
}

impl Iterator for Samples<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let phase = wrap_phase(self.state.phase + self.tone.phase_offset * TAU);
        let (value, failed) = self.voice.value(phase, self.tone.harmonic_weight);
        self.domain_errors += failed;
        self.state.advance(self.step);
        Some((value * self.tone.gain).clamp(-1.0, 1.0))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Samples<'_> {}
