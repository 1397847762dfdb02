//! Response curves for normalized control input such as MIDI CC values.

use serde::{Deserialize, Serialize};

/// Shape applied to a control value in `[0, 1]` before it is scaled onto a
/// parameter's range. Every curve fixes both endpoints and is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveKind {
    #[default]
    Linear,
    /// Fast rise near 0; resolution where small values matter.
    Log,
    /// Slow rise near 0; resolution at the top of the range.
    Exp,
    /// Flat at both ends.
    Smoothstep,
}

impl CurveKind {
    pub const ALL: [CurveKind; 4] = [
        CurveKind::Linear,
        CurveKind::Log,
        CurveKind::Exp,
        CurveKind::Smoothstep,
    ];

    /// Shaped value in `[0, 1]`. Out-of-range input saturates.
    pub fn shape(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            CurveKind::Linear => t,
            CurveKind::Log => (1.0 + 9.0 * t).log10(),
            CurveKind::Exp => t.powi(2),
            CurveKind::Smoothstep => t * t * (3.0 - 2.0 * t),
        }
    }

    /// Shape `t` and place it in `[lo, hi]`.
    pub fn map_onto(self, t: f64, (lo, hi): (f64, f64)) -> f64 {
        lo + self.shape(t) * (hi - lo)
    }
}
