//! Live parameter control.
//!
//! The [`ParameterController`] is the only shared mutable state in the crate.
//! A control surface updates it one value at a time; renderers and mapping
//! calls take a [`ParameterSet`] snapshot once per batch and never see a
//! half-applied update inside that batch.

pub mod curve;
pub mod mapping;
pub mod params;

pub use curve::CurveKind;
pub use mapping::{ControlBinding, ControlUpdate};
pub use params::{Param, ParameterSet};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

/// Shared handle to the live parameter set. Cloning yields another handle to
/// the same state.
#[derive(Clone)]
pub struct ParameterController {
    current: Arc<ArcSwap<ParameterSet>>,
    bindings: Arc<Vec<ControlBinding>>,
    channel_filter: Option<u8>,
    clamped: Arc<AtomicU64>,
}

impl Default for ParameterController {
    fn default() -> Self {
        Self::new(mapping::default_bindings())
    }
}

impl ParameterController {
    pub fn new(bindings: Vec<ControlBinding>) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(ParameterSet::default())),
            bindings: Arc::new(bindings),
            channel_filter: None,
            clamped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Only accept MIDI control messages on `channel` (0–15).
    pub fn with_channel_filter(mut self, channel: Option<u8>) -> Self {
        self.channel_filter = channel;
        self
    }

    pub fn bindings(&self) -> &[ControlBinding] {
        &self.bindings
    }

    /// One consistent copy of every parameter.
    pub fn snapshot(&self) -> ParameterSet {
        **self.current.load()
    }

    /// Store a value, clamped to the parameter's range. Returns `true` if the
    /// input was clamped.
    pub fn set(&self, param: Param, value: f64) -> bool {
        let mut clamped = false;
        self.current.rcu(|current| {
            let mut next = **current;
            clamped = next.set(param, value);
            next
        });
        if clamped {
            self.clamped.fetch_add(1, Ordering::Relaxed);
            debug!(param = %param, value, "control input clamped to range");
        }
        clamped
    }

    /// Apply a raw update through the binding table. Unbound indices are
    /// ignored and return `None`.
    pub fn apply(&self, update: ControlUpdate) -> Option<Param> {
        let binding = mapping::binding_for(&self.bindings, update.index)?;
        self.set(binding.param, update.value);
        Some(binding.param)
    }

    /// Apply a normalized (0–1) value through the binding's curve onto the
    /// parameter's declared range.
    pub fn apply_normalized(&self, index: u32, normalized: f64) -> Option<Param> {
        let binding = mapping::binding_for(&self.bindings, index)?;
        let value = binding.curve.map_onto(normalized, binding.param.range());
        self.set(binding.param, value);
        Some(binding.param)
    }

    /// Apply a raw MIDI Control Change message. Returns the parameter that
    /// changed, or `None` for non-CC, filtered or unbound messages.
    pub fn apply_midi_cc(&self, msg: &[u8]) -> Option<Param> {
        let (controller, normalized) = mapping::decode_midi_cc(msg, self.channel_filter)?;
        self.apply_normalized(u32::from(controller), normalized)
    }

    /// Number of inputs clamped since creation or the last [`reset`](Self::reset).
    pub fn clamped_inputs(&self) -> u64 {
        self.clamped.load(Ordering::Relaxed)
    }

    /// Restore defaults and clear the clamp counter.
    pub fn reset(&self) {
        self.current.store(Arc::new(ParameterSet::default()));
        self.clamped.store(0, Ordering::Relaxed);
    }
}
