//! Numeric derivative estimation by central finite differences.
//!
//! ```text
//! f'(x)  ≈ (f(x+h) − f(x−h)) / 2h
//! f''(x) ≈ (f(x+h) − 2f(x) + f(x−h)) / h²
//! ```
//!
//! A failed sub-evaluation contributes 0.0 and marks the estimate degraded,
//! so a singularity next to a sample point never stops a batch. Estimates are
//! clamped to a magnitude ceiling before they reach the mapping layer.

use super::RealFn;

/// Default magnitude ceiling for derivative estimates.
pub const DEFAULT_CEILING: f64 = 1.0e3;

/// Divisor applied to `span / sample_count` to obtain the default step.
const STEP_DIVISOR: f64 = 1000.0;

/// One derivative estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    /// At least one sub-evaluation failed and was replaced by 0.0.
    pub degraded: bool,
    /// The raw estimate exceeded the ceiling and was clamped.
    pub clamped: bool,
}

/// Step size and ceiling for derivative estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeEstimator {
    pub step: f64,
    pub ceiling: f64,
}

impl DerivativeEstimator {
    pub fn new(step: f64, ceiling: f64) -> Self {
        debug_assert!(step > 0.0 && ceiling > 0.0);
        Self { step, ceiling }
    }

    /// Default step for sampling `range` at `sample_count` points:
    /// `span / (sample_count × 1000)`.
    pub fn default_step(range: (f64, f64), sample_count: usize) -> f64 {
        (range.1 - range.0).abs() / (sample_count.max(1) as f64 * STEP_DIVISOR)
    }

    /// Estimator with the default step for `range` and the default ceiling.
    pub fn for_range(range: (f64, f64), sample_count: usize) -> Self {
        Self::new(Self::default_step(range, sample_count), DEFAULT_CEILING)
    }

    pub fn first(&self, f: &impl RealFn, x: f64) -> Estimate {
        let h = self.step;
        let (ahead, a_ok) = sub_eval(f, x + h);
        let (behind, b_ok) = sub_eval(f, x - h);
        self.finish((ahead - behind) / (2.0 * h), !(a_ok && b_ok))
    }

    pub fn second(&self, f: &impl RealFn, x: f64) -> Estimate {
        let h = self.step;
        let (ahead, a_ok) = sub_eval(f, x + h);
        let (here, c_ok) = sub_eval(f, x);
        let (behind, b_ok) = sub_eval(f, x - h);
        self.finish(
            (ahead - 2.0 * here + behind) / (h * h),
            !(a_ok && b_ok && c_ok),
        )
    }

    /// First and second derivative from one set of three evaluations.
    pub fn both(&self, f: &impl RealFn, x: f64) -> (Estimate, Estimate) {
        let h = self.step;
        let (ahead, a_ok) = sub_eval(f, x + h);
        let (here, c_ok) = sub_eval(f, x);
        let (behind, b_ok) = sub_eval(f, x - h);
        let first = self.finish((ahead - behind) / (2.0 * h), !(a_ok && b_ok));
        let second = self.finish(
            (ahead - 2.0 * here + behind) / (h * h),
            !(a_ok && b_ok && c_ok),
        );
        (first, second)
    }

    fn finish(&self, raw: f64, degraded: bool) -> Estimate {
        // 0/0 or inf - inf: no usable slope, not an oversized one.
        if raw.is_nan() {
            return Estimate {
                value: 0.0,
                degraded: true,
                clamped: false,
            };
        }
        let value = raw.clamp(-self.ceiling, self.ceiling);
        Estimate {
            value,
            degraded,
            clamped: value != raw,
        }
    }
}

/// First derivative of `f` at `x` with step `h` and the default ceiling.
pub fn first_derivative(f: &impl RealFn, x: f64, h: f64) -> Estimate {
    DerivativeEstimator::new(h, DEFAULT_CEILING).first(f, x)
}

/// Second derivative of `f` at `x` with step `h` and the default ceiling.
pub fn second_derivative(f: &impl RealFn, x: f64, h: f64) -> Estimate {
    DerivativeEstimator::new(h, DEFAULT_CEILING).second(f, x)
}

fn sub_eval(f: &impl RealFn, x: f64) -> (f64, bool) {
    match f.at(x) {
        Ok(v) => (v, true),
        Err(_) => (0.0, false),
    }
}
