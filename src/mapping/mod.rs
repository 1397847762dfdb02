//! Function → note mapping.
//!
//! Every algorithm shares one primitive: sample a function over a range,
//! recover from per-sample domain errors with a 0.0 fallback, and estimate
//! the first and second derivative at each point. The sampled batch is then
//! rescaled onto pitch, velocity, modulation and duration.

pub mod config;
pub mod note;
pub mod scale;

pub use config::{MappingConfig, Rhythm, ScaleSpec, MAX_HARMONICS};
pub use note::{midi_to_freq, parse_note_name, pitch_bend, NoteEvent};
pub use scale::{Scale, NAMED_SCALES};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::control::ParameterSet;
use crate::expr::{DerivativeEstimator, EvalError, Expression, RealFn};

/// Spans at or below this are treated as flat.
const FLAT_EPSILON: f64 = 1e-12;

/// Structural failure while mapping. Domain errors never surface here; they
/// are recovered per sample and counted in [`BatchReport`].
#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Per-batch counters for recovered problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Samples whose evaluation hit a domain error and fell back to 0.0.
    pub domain_errors: usize,
    /// Derivative estimates with at least one failed sub-evaluation.
    pub degraded_derivatives: usize,
    /// Derivative estimates clamped to the magnitude ceiling.
    pub clamped_derivatives: usize,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        *self == BatchReport::default()
    }
}

/// Notes produced by one mapping call plus what went wrong along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutput {
    pub notes: Vec<NoteEvent>,
    pub report: BatchReport,
}

impl MappingOutput {
    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }

    /// The notes with beat times converted to seconds at `tempo` BPM.
    pub fn to_seconds(&self, tempo: f64) -> Vec<NoteEvent> {
        self.notes.iter().map(|n| n.to_seconds(tempo)).collect()
    }
}

/// `(1 − m)·a(x) + m·b(x)`.
///
/// At the endpoints only one side is evaluated, so `m = 0` is exactly `a` and
/// `m = 1` is exactly `b`, even where the other side would fail.
#[derive(Debug, Clone, Copy)]
pub struct Morph<'a> {
    pub a: &'a Expression,
    pub b: &'a Expression,
    pub m: f64,
}

impl<'a> Morph<'a> {
    /// `m` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn new(a: &'a Expression, b: &'a Expression, m: f64) -> Self {
        let m = if m.is_nan() { 0.0 } else { m.clamp(0.0, 1.0) };
        Self { a, b, m }
    }
}

impl RealFn for Morph<'_> {
    fn at(&self, x: f64) -> Result<f64, EvalError> {
        if self.m <= 0.0 {
            return self.a.at(x);
        }
        if self.m >= 1.0 {
            return self.b.at(x);
        }
        Ok((1.0 - self.m) * self.a.at(x)? + self.m * self.b.at(x)?)
    }
}

/// One sampled point: value plus derivative estimates.
#[derive(Debug, Clone, Copy)]
struct Sampled {
    value: f64,
    d1: f64,
    d2: f64,
}

/// Turns functions into note sequences for a validated [`MappingConfig`].
#[derive(Debug, Clone)]
pub struct MappingEngine {
    config: MappingConfig,
    scale: Option<Scale>,
    derivative: DerivativeEstimator,
}

impl MappingEngine {
    /// Validate `config` and resolve its scale. Nothing is sampled on error.
    pub fn new(config: MappingConfig) -> Result<Self, ConfigError> {
        let scale = config.validate()?;
        let derivative = DerivativeEstimator::for_range(config.x_range, config.sample_count);
        Ok(Self {
            config,
            scale,
            derivative,
        })
    }

    /// Replace the derivative step and ceiling.
    pub fn with_derivative(mut self, derivative: DerivativeEstimator) -> Self {
        self.derivative = derivative;
        self
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn scale(&self) -> Option<&Scale> {
        self.scale.as_ref()
    }

    pub fn derivative(&self) -> &DerivativeEstimator {
        &self.derivative
    }

    /// The `sample_count` evenly spaced points of `x_range`, ends included.
    pub fn sample_points(&self) -> Vec<f64> {
        linspace(self.config.x_range, self.config.sample_count)
    }

    /// Direct mapping: one note per sample point of `f`.
    pub fn direct(&self, f: &impl RealFn) -> Result<MappingOutput, MappingError> {
        let mut report = BatchReport::default();
        let samples = self
            .sample_points()
            .into_iter()
            .map(|x| self.sample(f, x, &self.derivative, &mut report))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.finish(self.direct_notes(&samples), report))
    }

    /// Morph between `a` and `b` using the morph factor of one parameter
    /// snapshot for the whole batch.
    pub fn morph(
        &self,
        a: &Expression,
        b: &Expression,
        params: &ParameterSet,
    ) -> Result<MappingOutput, MappingError> {
        let m = params.morph_factor();
        self.morph_with(a, b, |_| m)
    }

    /// Morph between `a` and `b` with the factor read fresh for every sample
    /// index. Neither tree is rebuilt.
    pub fn morph_with(
        &self,
        a: &Expression,
        b: &Expression,
        mut factor: impl FnMut(usize) -> f64,
    ) -> Result<MappingOutput, MappingError> {
        let mut report = BatchReport::default();
        let samples = self
            .sample_points()
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                let blend = Morph::new(a, b, factor(i));
                self.sample(&blend, x, &self.derivative, &mut report)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.finish(self.direct_notes(&samples), report))
    }

    /// Parametric mapping of the curve `(x(t), y(t))` over `t_range`.
    ///
    /// x drives pitch, y drives duration, and the speed `|(x′, y′)|` drives
    /// velocity. Notes follow one another without gaps.
    pub fn parametric(
        &self,
        x_t: &Expression,
        y_t: &Expression,
        t_range: (f64, f64),
    ) -> Result<MappingOutput, MappingError> {
        let (lo, hi) = t_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConfigError::XRange { min: lo, max: hi }.into());
        }
        let n = self.config.sample_count;
        let derivative = DerivativeEstimator::new(
            DerivativeEstimator::default_step(t_range, n),
            self.derivative.ceiling,
        );

        let mut report = BatchReport::default();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for t in linspace(t_range, n) {
            xs.push(self.sample(x_t, t, &derivative, &mut report)?);
            ys.push(self.sample(y_t, t, &derivative, &mut report)?);
        }

        let contour: Vec<f64> = xs.iter().map(|s| s.value).collect();
        let speed: Vec<f64> = xs.iter().zip(&ys).map(|(x, y)| x.d1.hypot(y.d1)).collect();
        let curvature: Vec<f64> = xs.iter().map(|s| s.d2).collect();
        let y_values: Vec<f64> = ys.iter().map(|s| s.value).collect();
        let durations = self.durations_from(&y_values);

        let notes = self.assemble(&contour, &speed, &curvature, &durations);
        Ok(self.finish(notes, report))
    }

    /// Evaluate `f` and its derivatives at `x`. A domain error becomes 0.0
    /// and is counted; anything else aborts the batch.
    fn sample(
        &self,
        f: &impl RealFn,
        x: f64,
        derivative: &DerivativeEstimator,
        report: &mut BatchReport,
    ) -> Result<Sampled, MappingError> {
        let value = match f.at(x) {
            Ok(v) => v,
            Err(EvalError::DomainError(kind)) => {
                debug!(x, %kind, "domain error, sample falls back to 0.0");
                report.domain_errors += 1;
                0.0
            }
            Err(e) => return Err(e.into()),
        };
        let (d1, d2) = derivative.both(f, x);
        for est in [d1, d2] {
            report.degraded_derivatives += usize::from(est.degraded);
            report.clamped_derivatives += usize::from(est.clamped);
        }
        Ok(Sampled {
            value,
            d1: d1.value,
            d2: d2.value,
        })
    }

    fn direct_notes(&self, samples: &[Sampled]) -> Vec<NoteEvent> {
        let contour: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let speed: Vec<f64> = samples.iter().map(|s| s.d1.abs()).collect();
        let curvature: Vec<f64> = samples.iter().map(|s| s.d2).collect();
        let durations = match self.config.rhythm {
            Rhythm::Fixed { step } => vec![step; samples.len()],
            Rhythm::Derived => {
                let magnitudes: Vec<f64> = contour.iter().map(|v| v.abs()).collect();
                self.durations_from(&magnitudes)
            }
        };
        self.assemble(&contour, &speed, &curvature, &durations)
    }

    /// Rescale onto `[min_duration, max_duration]`; a flat batch gets the midpoint.
    fn durations_from(&self, values: &[f64]) -> Vec<f64> {
        let range = (self.config.min_duration, self.config.max_duration);
        rescale(values, range).unwrap_or_else(|| vec![(range.0 + range.1) / 2.0; values.len()])
    }

    fn assemble(
        &self,
        contour: &[f64],
        speed: &[f64],
        curvature: &[f64],
        durations: &[f64],
    ) -> Vec<NoteEvent> {
        let cfg = &self.config;
        let note_range = (f64::from(cfg.min_note), f64::from(cfg.max_note));
        let raw_pitches = rescale(contour, note_range)
            .unwrap_or_else(|| vec![(note_range.0 + note_range.1) / 2.0; contour.len()]);
        let velocities: Vec<u8> = match rescale(speed, (1.0, 127.0)) {
            Some(v) => v.iter().map(|v| v.round().clamp(1.0, 127.0) as u8).collect(),
            None => vec![cfg.default_velocity; speed.len()],
        };
        let modulation = rescale(curvature, (0.0, 1.0)).unwrap_or_else(|| vec![0.0; curvature.len()]);

        let mut start = 0.0;
        raw_pitches
            .iter()
            .zip(velocities)
            .zip(modulation)
            .zip(durations)
            .map(|(((raw, velocity), modulation), duration)| {
                let (pitch, pitch_bend) = self.place_pitch(*raw);
                let note = NoteEvent {
                    pitch,
                    velocity,
                    duration: *duration,
                    start_time: start,
                    modulation,
                    pitch_bend,
                };
                start += duration;
                note
            })
            .collect()
    }

    /// Transpose, then quantize to the scale or round, keeping the result
    /// inside `[min_note, max_note]`.
    fn place_pitch(&self, raw: f64) -> (u8, Option<u16>) {
        let cfg = &self.config;
        let lo = i32::from(cfg.min_note);
        let hi = i32::from(cfg.max_note);
        let raw = raw + f64::from(cfg.transpose);
        match &self.scale {
            Some(scale) => {
                let pitch = scale
                    .quantize_within(raw, lo, hi)
                    .unwrap_or_else(|| round_into(raw, lo, hi));
                (pitch as u8, None)
            }
            None => {
                let pitch = round_into(raw, lo, hi);
                let bend = cfg
                    .microtonal
                    .then(|| pitch_bend(raw - f64::from(pitch), cfg.bend_range));
                (pitch as u8, bend)
            }
        }
    }

    fn finish(&self, notes: Vec<NoteEvent>, report: BatchReport) -> MappingOutput {
        if report.domain_errors > 0 {
            warn!(
                domain_errors = report.domain_errors,
                samples = notes.len(),
                "batch finished with domain-error fallbacks"
            );
        }
        MappingOutput { notes, report }
    }
}

/// `n` evenly spaced points from `range.0` to `range.1` inclusive.
pub fn linspace(range: (f64, f64), n: usize) -> Vec<f64> {
    let (lo, hi) = range;
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + step * i as f64).collect()
        }
    }
}

/// Linear map from the observed `[min, max]` of `values` onto `to`.
/// `None` when the values are flat (or empty).
fn rescale(values: &[f64], to: (f64, f64)) -> Option<Vec<f64>> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Halved so a span wider than f64::MAX stays finite.
    let half_span = hi * 0.5 - lo * 0.5;
    if !(half_span > FLAT_EPSILON * 0.5) {
        return None;
    }
    Some(
        values
            .iter()
            .map(|v| to.0 + (v * 0.5 - lo * 0.5) / half_span * (to.1 - to.0))
            .collect(),
    )
}

fn round_into(raw: f64, lo: i32, hi: i32) -> i32 {
    (raw.round() as i32).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    fn engine(config: MappingConfig) -> MappingEngine {
        MappingEngine::new(config).unwrap()
    }

    fn expr(src: &str) -> Expression {
        Expression::parse(src).unwrap()
    }

    #[test]
    fn contour_spanning_more_than_f64_max_still_rises() {
        let eng = engine(MappingConfig {
            x_range: (-1.0, 1.0),
            sample_count: 5,
            min_note: 60,
            max_note: 72,
            ..Default::default()
        });
        let out = eng.direct(&expr("x * 1e308")).unwrap();
        assert_eq!(out.pitches(), vec![60, 63, 66, 69, 72]);
    }

    #[test]
    fn rescale_handles_extreme_values() {
        let got = rescale(&[-f64::MAX, 0.0, f64::MAX], (0.0, 1.0)).unwrap();
        assert_eq!(got, vec![0.0, 0.5, 1.0]);
        assert!(rescale(&[3.0, 3.0], (0.0, 1.0)).is_none());
    }

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace((0.0, 1.0), 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace((2.0, 3.0), 1), vec![2.0]);
        assert!(linspace((0.0, 1.0), 0).is_empty());
    }

    #[test]
    fn sine_contour_is_symmetric_about_midpoint() {
        let eng = engine(MappingConfig {
            x_range: (-PI, PI),
            sample_count: 5,
            min_note: 60,
            max_note: 72,
            ..Default::default()
        });
        let out = eng.direct(&expr("sin(x)")).unwrap();
        let pitches = out.pitches();
        assert_eq!(pitches, vec![66, 60, 66, 72, 66]);
        let mid = i32::from(pitches[2]);
        for i in 0..5 {
            assert_eq!(i32::from(pitches[i]) + i32::from(pitches[4 - i]), 2 * mid);
        }
        assert!(out.report.is_clean());
    }

    #[test]
    fn cosine_rises_then_falls() {
        let eng = engine(MappingConfig {
            x_range: (-PI, PI),
            sample_count: 5,
            min_note: 60,
            max_note: 72,
            ..Default::default()
        });
        let pitches = eng.direct(&expr("cos(x)")).unwrap().pitches();
        assert_eq!(pitches, vec![60, 66, 72, 66, 60]);
    }

    #[test]
    fn domain_error_falls_back_and_is_counted() {
        let eng = engine(MappingConfig {
            x_range: (-1.0, 3.0),
            sample_count: 3,
            min_note: 60,
            max_note: 72,
            ..Default::default()
        });
        let out = eng.direct(&expr("log(x)")).unwrap();
        assert_eq!(out.notes.len(), 3);
        assert_eq!(out.report.domain_errors, 1);
        // log(-1) → 0.0, log(1) = 0.0, log(3) > 0
        assert_eq!(out.pitches(), vec![60, 60, 72]);
        assert!(out.report.degraded_derivatives > 0);
    }

    #[test]
    fn unbound_variable_aborts() {
        let eng = engine(MappingConfig::default());
        let f = Expression::parse_with_vars("x + t", &["x", "t"]).unwrap();
        assert!(matches!(
            eng.direct(&f),
            Err(MappingError::Eval(EvalError::UnboundVariable(_)))
        ));
    }

    #[test]
    fn flat_function_maps_to_midpoint_with_default_velocity() {
        let eng = engine(MappingConfig {
            min_note: 48,
            max_note: 72,
            sample_count: 4,
            ..Default::default()
        });
        let out = eng.direct(&expr("3")).unwrap();
        for note in &out.notes {
            assert_eq!(note.pitch, 60);
            assert_eq!(note.velocity, 100);
            assert_eq!(note.modulation, 0.0);
        }
    }

    #[test]
    fn scale_quantization_keeps_pitches_in_scale_and_range() {
        let eng = engine(MappingConfig {
            scale: Some(ScaleSpec::Named("pentatonic_minor".into())),
            root_note: 57,
            min_note: 50,
            max_note: 80,
            sample_count: 64,
            ..Default::default()
        });
        let scale = eng.scale().unwrap().clone();
        let out = eng.direct(&expr("sin(x) + cos(2*x)")).unwrap();
        for note in &out.notes {
            assert!((50..=80).contains(&note.pitch));
            assert!(scale.contains(i32::from(note.pitch)), "{} not in scale", note.pitch);
            assert_eq!(note.pitch_bend, None);
        }
    }

    #[test]
    fn transpose_shifts_and_stays_in_range() {
        let base = MappingConfig {
            min_note: 40,
            max_note: 80,
            sample_count: 9,
            ..Default::default()
        };
        let plain = engine(base.clone()).direct(&expr("x")).unwrap().pitches();
        let up = engine(MappingConfig {
            transpose: 12,
            ..base
        })
        .direct(&expr("x"))
        .unwrap()
        .pitches();
        assert_eq!(up[0], plain[0] + 12);
        assert_eq!(*up.last().unwrap(), 80);
    }

    #[test]
    fn velocity_follows_slope_magnitude() {
        let eng = engine(MappingConfig {
            x_range: (0.0, 2.0),
            sample_count: 5,
            ..Default::default()
        });
        // |f'| = 2x grows across the range.
        let out = eng.direct(&expr("x^2")).unwrap();
        assert_eq!(out.notes[0].velocity, 1);
        assert_eq!(out.notes[4].velocity, 127);
        assert!(out.notes.windows(2).all(|w| w[0].velocity <= w[1].velocity));
    }

    #[test]
    fn modulation_is_unit_interval() {
        let eng = engine(MappingConfig::default());
        let out = eng.direct(&expr("sin(x) * x")).unwrap();
        for note in &out.notes {
            assert!((0.0..=1.0).contains(&note.modulation));
        }
    }

    #[test]
    fn fixed_rhythm_steps_evenly() {
        let eng = engine(MappingConfig {
            sample_count: 4,
            rhythm: Rhythm::Fixed { step: 0.25 },
            ..Default::default()
        });
        let out = eng.direct(&expr("x")).unwrap();
        let starts: Vec<f64> = out.notes.iter().map(|n| n.start_time).collect();
        assert_eq!(starts, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(out.notes.iter().all(|n| n.duration == 0.25));
    }

    #[test]
    fn derived_rhythm_uses_magnitude_and_chains_notes() {
        let eng = engine(MappingConfig {
            x_range: (0.0, 1.0),
            sample_count: 3,
            min_duration: 0.5,
            max_duration: 2.0,
            rhythm: Rhythm::Derived,
            ..Default::default()
        });
        let out = eng.direct(&expr("x")).unwrap();
        let durations: Vec<f64> = out.notes.iter().map(|n| n.duration).collect();
        assert_eq!(durations, vec![0.5, 1.25, 2.0]);
        for pair in out.notes.windows(2) {
            assert_approx_eq!(pair[1].start_time, pair[0].end_time(), 1e-12);
        }
    }

    #[test]
    fn microtonal_mode_carries_the_fraction() {
        let eng = engine(MappingConfig {
            x_range: (0.0, 1.0),
            sample_count: 3,
            min_note: 60,
            max_note: 61,
            microtonal: true,
            bend_range: 2,
            ..Default::default()
        });
        let out = eng.direct(&expr("x")).unwrap();
        // Raw pitches 60, 60.5, 61; 60.5 rounds up to 61 with a -0.5 bend.
        assert_eq!(out.notes[0].pitch_bend, Some(note::BEND_CENTER));
        assert_eq!(out.notes[1].pitch, 61);
        assert_eq!(out.notes[1].pitch_bend, Some(pitch_bend(-0.5, 2)));
    }

    #[test]
    fn morph_endpoints_match_the_inputs() {
        let eng = engine(MappingConfig::default());
        let a = expr("sin(x)");
        let b = expr("x^2");
        let alone_a = eng.direct(&a).unwrap();
        let alone_b = eng.direct(&b).unwrap();

        let params = ParameterSet::default();
        assert_eq!(eng.morph(&a, &b, &params).unwrap(), alone_a);
        let params = params.with(crate::control::Param::MorphFactor, 1.0);
        assert_eq!(eng.morph(&a, &b, &params).unwrap(), alone_b);
    }

    #[test]
    fn morph_value_is_weighted_blend() {
        let a = expr("2");
        let b = expr("6");
        assert_eq!(Morph::new(&a, &b, 0.25).at(0.0).unwrap(), 3.0);
        assert_eq!(Morph::new(&a, &b, 5.0).m, 1.0);
        assert_eq!(Morph::new(&a, &b, f64::NAN).m, 0.0);
    }

    #[test]
    fn morph_factor_can_change_per_sample() {
        let eng = engine(MappingConfig {
            x_range: (0.0, 1.0),
            sample_count: 3,
            min_note: 60,
            max_note: 72,
            ..Default::default()
        });
        let a = expr("0");
        let b = expr("1");
        let mut seen = Vec::new();
        let out = eng
            .morph_with(&a, &b, |i| {
                seen.push(i);
                i as f64 / 2.0
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(out.pitches(), vec![60, 66, 72]);
    }

    #[test]
    fn parametric_circle() {
        let eng = engine(MappingConfig {
            sample_count: 8,
            min_note: 48,
            max_note: 72,
            min_duration: 0.25,
            max_duration: 1.0,
            ..Default::default()
        });
        let x = Expression::parse_with_vars("cos(t)", &["t"]).unwrap();
        let y = Expression::parse_with_vars("sin(t)", &["t"]).unwrap();
        let out = eng.parametric(&x, &y, (0.0, 2.0 * PI)).unwrap();
        assert_eq!(out.notes.len(), 8);
        assert_eq!(out.notes[0].pitch, 72);
        for note in &out.notes {
            assert!((48..=72).contains(&note.pitch));
            assert!(note.duration >= 0.25 - 1e-12 && note.duration <= 1.0 + 1e-12);
            assert!((1..=127).contains(&note.velocity));
        }
        for pair in out.notes.windows(2) {
            assert_approx_eq!(pair[1].start_time, pair[0].end_time(), 1e-12);
        }
    }

    #[test]
    fn parametric_rejects_bad_range() {
        let eng = engine(MappingConfig::default());
        let x = expr("x");
        assert!(matches!(
            eng.parametric(&x, &x, (1.0, 1.0)),
            Err(MappingError::Config(ConfigError::XRange { .. }))
        ));
    }

    #[test]
    fn invalid_config_never_builds_an_engine() {
        let err = MappingEngine::new(MappingConfig {
            min_note: 90,
            max_note: 30,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoteRange { .. }));
    }

    #[test]
    fn seconds_conversion() {
        let eng = engine(MappingConfig {
            sample_count: 2,
            ..Default::default()
        });
        let out = eng.direct(&expr("x")).unwrap();
        let secs = out.to_seconds(60.0);
        assert_eq!(secs[1].start_time, 0.5);
        let secs = out.to_seconds(120.0);
        assert_eq!(secs[1].start_time, 0.25);
    }
}
