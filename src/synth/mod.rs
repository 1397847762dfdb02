//! Oscillator synthesis: per-sample expression evaluation with phase
//! accumulation, additive harmonics, and buffered rendering under live
//! parameter control.

pub mod oscillator;
pub mod render;

pub use oscillator::{wrap_phase, Oscillator, OscillatorState, SampleBlock, Samples, Tone, Voice};
pub use render::{CancelFlag, RenderSummary, Renderer};
