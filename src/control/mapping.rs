//! Control-surface mapping: numeric control indices to named parameters.

use serde::{Deserialize, Serialize};

use super::curve::CurveKind;
use super::params::Param;
use crate::config::ConfigError;

/// Binds a control index (e.g. a MIDI CC number) to a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlBinding {
    pub index: u32,
    pub param: Param,
    /// Response curve for normalized (0–1) input such as MIDI CC values.
    #[serde(default)]
    pub curve: CurveKind,
}

/// One raw control update: a value in the bound parameter's own units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlUpdate {
    pub index: u32,
    pub value: f64,
}

/// Default bindings: CC1–CC5 → the parameters in declaration order.
pub fn default_bindings() -> Vec<ControlBinding> {
    Param::ALL
        .into_iter()
        .enumerate()
        .map(|(i, param)| ControlBinding {
            index: i as u32 + 1,
            param,
            curve: CurveKind::Linear,
        })
        .collect()
}

/// Reject bindings that claim the same index twice.
pub fn validate_bindings(bindings: &[ControlBinding]) -> Result<(), ConfigError> {
    for (i, b) in bindings.iter().enumerate() {
        if bindings[..i].iter().any(|other| other.index == b.index) {
            return Err(ConfigError::DuplicateControl(b.index));
        }
    }
    Ok(())
}

/// Find the binding for a control index.
pub fn binding_for(bindings: &[ControlBinding], index: u32) -> Option<&ControlBinding> {
    bindings.iter().find(|b| b.index == index)
}

/// Decode a MIDI Control Change into `(controller, normalized value)`.
///
/// Format: `[0xB0 | channel, controller, value]`; value 0–127 becomes 0.0–1.0.
/// Anything else, or a message on a filtered-out channel, yields `None`.
pub fn decode_midi_cc(msg: &[u8], channel_filter: Option<u8>) -> Option<(u8, f64)> {
    if msg.len() < 3 {
        return None;
    }

    let status = msg[0] & 0xF0;
    let channel = msg[0] & 0x0F;

    if let Some(filter) = channel_filter {
        if channel != filter {
            return None;
        }
    }

    if status != 0xB0 {
        return None;
    }

    let controller = msg[1] & 0x7F;
    let value = msg[2] & 0x7F;
    Some((controller, f64::from(value) / 127.0))
}
