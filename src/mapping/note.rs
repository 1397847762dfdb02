//! Note events and note-name helpers.

use serde::{Deserialize, Serialize};

/// Pitch-bend center (no bend) for a 14-bit MIDI pitch wheel.
pub const BEND_CENTER: u16 = 8192;
/// Largest 14-bit pitch-bend value.
pub const BEND_MAX: u16 = 16383;

/// One emitted note. Times are in beats unless converted with
/// [`NoteEvent::to_seconds`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch, 0–127.
    pub pitch: u8,
    /// MIDI velocity, 1–127.
    pub velocity: u8,
    /// Positive length.
    pub duration: f64,
    /// Start time; non-decreasing across a sequence.
    pub start_time: f64,
    /// Second-derivative modulation value in [0, 1].
    pub modulation: f64,
    /// 14-bit pitch-bend carrying the fractional part of the raw pitch,
    /// present only in microtonal mode.
    pub pitch_bend: Option<u16>,
}

impl NoteEvent {
    /// Convert beat-based start and duration to seconds at `tempo` BPM.
    pub fn to_seconds(&self, tempo: f64) -> NoteEvent {
        let seconds_per_beat = 60.0 / tempo;
        NoteEvent {
            duration: self.duration * seconds_per_beat,
            start_time: self.start_time * seconds_per_beat,
            ..self.clone()
        }
    }

    /// End time (start + duration).
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Encode a pitch deviation in semitones as a 14-bit bend value for a wheel
/// spanning ±`bend_range` semitones.
pub fn pitch_bend(deviation: f64, bend_range: u8) -> u16 {
    let range = f64::from(bend_range.max(1));
    let ratio = (deviation / range).clamp(-1.0, 1.0);
    let bend = (f64::from(BEND_CENTER) + ratio * f64::from(BEND_CENTER)).round();
    bend.clamp(0.0, f64::from(BEND_MAX)) as u16
}

/// MIDI number for a name like `C4`, `F#3` or `Eb-1`: an upper-case letter,
/// an optional `#` or `b`, then the octave. Middle C is `C4` (60).
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let pitch_class = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (shift, octave) = match (rest.strip_prefix('#'), rest.strip_prefix('b')) {
        (Some(octave), _) => (1, octave),
        (_, Some(octave)) => (-1, octave),
        _ => (0, rest),
    };
    let octave: i32 = octave.parse().ok()?;
    let midi = (i64::from(octave) + 1) * 12 + pitch_class + shift;
    u8::try_from(midi).ok().filter(|n| *n <= 127)
}

/// Convert a MIDI note number to frequency in Hz (A4 = 440 Hz).
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2.0f64.powf((f64::from(note) - 69.0) / 12.0)
}
