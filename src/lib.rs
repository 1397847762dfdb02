//! Math Melody: turn mathematical expressions into note sequences and
//! audio sample buffers.

pub mod config;
pub mod control;
pub mod expr;
pub mod mapping;
pub mod synth;

pub use config::{ConfigError, SessionConfig};
pub use control::{Param, ParameterController, ParameterSet};
pub use expr::{EvalError, Expression, ParseError};
pub use mapping::{MappingConfig, MappingEngine, MappingError, MappingOutput, NoteEvent};
pub use synth::{CancelFlag, Oscillator, Renderer, Voice};
