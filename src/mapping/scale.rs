//! Musical scales and pitch quantization.
//!
//! A [`Scale`] is a root pitch class plus a sorted, deduplicated set of
//! semitone offsets. Quantization snaps a continuous pitch to the nearest
//! allowed tone, searching across octave boundaries.

use crate::config::ConfigError;

/// Built-in scales as semitone offsets from the root.
pub const NAMED_SCALES: [(&str, &[u8]); 13] = [
    ("chromatic", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
    ("major", &[0, 2, 4, 5, 7, 9, 11]),
    ("minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("pentatonic_major", &[0, 2, 4, 7, 9]),
    ("pentatonic_minor", &[0, 3, 5, 7, 10]),
    ("dorian", &[0, 2, 3, 5, 7, 9, 10]),
    ("phrygian", &[0, 1, 3, 5, 7, 8, 10]),
    ("lydian", &[0, 2, 4, 6, 7, 9, 11]),
    ("mixolydian", &[0, 2, 4, 5, 7, 9, 10]),
    ("locrian", &[0, 1, 3, 5, 6, 8, 10]),
    ("blues", &[0, 3, 5, 6, 7, 10]),
    ("harmonic_minor", &[0, 2, 3, 5, 7, 8, 11]),
    ("melodic_minor", &[0, 2, 3, 5, 7, 9, 11]),
];

/// Largest pitch magnitude [`Scale::quantize`] works with.
pub const PITCH_LIMIT: f64 = 1.0e6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    root: u8,
    offsets: Vec<u8>,
}

impl Scale {
    /// Build a scale from a root pitch class (0–11) and offsets (each 0–11).
    pub fn new(root: u8, offsets: &[u8]) -> Result<Self, ConfigError> {
        if root > 11 {
            return Err(ConfigError::ScaleRoot(root));
        }
        if let Some(&bad) = offsets.iter().find(|o| **o > 11) {
            return Err(ConfigError::ScaleOffset(bad));
        }
        let mut offsets = offsets.to_vec();
        offsets.sort_unstable();
        offsets.dedup();
        if offsets.is_empty() {
            return Err(ConfigError::EmptyScale);
        }
        Ok(Self { root, offsets })
    }

    /// Look up one of the [`NAMED_SCALES`].
    pub fn named(name: &str, root: u8) -> Result<Self, ConfigError> {
        let (_, offsets) = NAMED_SCALES
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| ConfigError::UnknownScale(name.to_string()))?;
        Self::new(root, offsets)
    }

    pub fn root(&self) -> u8 {
        self.root
    }

    pub fn offsets(&self) -> &[u8] {
        &self.offsets
    }

    /// Whether `pitch` belongs to the scale in any octave.
    pub fn contains(&self, pitch: i32) -> bool {
        let pc = (pitch - i32::from(self.root)).rem_euclid(12);
        self.offsets.iter().any(|o| i32::from(*o) == pc)
    }

    /// Nearest scale tone to `pitch`. Ties go to the lower tone.
    ///
    /// Pitches beyond ±[`PITCH_LIMIT`] are treated as the limit, keeping the
    /// octave arithmetic within `i32`.
    pub fn quantize(&self, pitch: f64) -> i32 {
        let pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let root = i32::from(self.root);
        let octave = ((pitch - f64::from(root)) / 12.0).floor() as i32;
        let base = root + 12 * octave;

        let mut best = base;
        let mut best_dist = f64::INFINITY;
        // Candidates ascend, so a strict comparison keeps the lower tone on ties.
        for k in -1..=1 {
            for &offset in &self.offsets {
                let candidate = base + 12 * k + i32::from(offset);
                let dist = (f64::from(candidate) - pitch).abs();
                if dist < best_dist {
                    best = candidate;
                    best_dist = dist;
                }
            }
        }
        best
    }

    /// Highest scale tone at or below `limit`.
    pub fn at_or_below(&self, limit: i32) -> Option<i32> {
        (limit - 11..=limit).rev().find(|p| self.contains(*p))
    }

    /// Lowest scale tone at or above `limit`.
    pub fn at_or_above(&self, limit: i32) -> Option<i32> {
        (limit..=limit + 11).find(|p| self.contains(*p))
    }

    /// Whether any tone of the scale lies in `[lo, hi]`.
    pub fn has_tone_in(&self, lo: i32, hi: i32) -> bool {
        self.at_or_above(lo).is_some_and(|p| p <= hi)
    }

    /// Quantize `pitch`, then pull the result into `[lo, hi]` by stepping to
    /// the nearest in-range scale tone. Returns `None` only if the range holds
    /// no scale tone at all.
    pub fn quantize_within(&self, pitch: f64, lo: i32, hi: i32) -> Option<i32> {
        let q = self.quantize(pitch);
        if q > hi {
            self.at_or_below(hi).filter(|p| *p >= lo)
        } else if q < lo {
            self.at_or_above(lo).filter(|p| *p <= hi)
        } else {
            Some(q)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_sorted_and_deduplicated() {
        let s = Scale::new(0, &[7, 0, 4, 4, 0]).unwrap();
        assert_eq!(s.offsets(), &[0, 4, 7]);
    }

    #[test]
    fn invalid_scales_rejected() {
        assert!(matches!(Scale::new(0, &[]), Err(ConfigError::EmptyScale)));
        assert!(matches!(
            Scale::new(0, &[0, 12]),
            Err(ConfigError::ScaleOffset(12))
        ));
        assert!(matches!(Scale::new(12, &[0]), Err(ConfigError::ScaleRoot(12))));
        assert!(matches!(
            Scale::named("klingon", 0),
            Err(ConfigError::UnknownScale(_))
        ));
    }

    #[test]
    fn every_named_scale_builds() {
        for (name, offsets) in NAMED_SCALES {
            let s = Scale::named(name, 0).unwrap();
            assert_eq!(s.offsets(), offsets);
        }
    }

    #[test]
    fn contains_respects_root() {
        let d_major = Scale::named("major", 2).unwrap();
        assert!(d_major.contains(62)); // D
        assert!(d_major.contains(66)); // F#
        assert!(!d_major.contains(65)); // F
        assert!(d_major.contains(-10)); // D below MIDI 0 still matches by pitch class
    }

    #[test]
    fn quantize_to_nearest_tone() {
        let c_major = Scale::named("major", 0).unwrap();
        assert_eq!(c_major.quantize(60.0), 60);
        assert_eq!(c_major.quantize(61.2), 60);
        assert_eq!(c_major.quantize(61.8), 62);
        assert_eq!(c_major.quantize(65.9), 65);
    }

    #[test]
    fn quantize_ties_go_down() {
        let c_major = Scale::named("major", 0).unwrap();
        assert_eq!(c_major.quantize(61.0), 60);
        assert_eq!(c_major.quantize(66.0), 65);
    }

    #[test]
    fn quantize_crosses_octave_boundary() {
        // B (71) is 1 semitone from C (72) but 2 from A (69).
        let pentatonic = Scale::named("pentatonic_major", 0).unwrap();
        assert_eq!(pentatonic.quantize(71.0), 72);
        assert_eq!(pentatonic.quantize(70.9), 72);
        assert_eq!(pentatonic.quantize(70.5), 69);
    }

    #[test]
    fn quantize_extreme_pitches_saturates() {
        let c_major = Scale::named("major", 0).unwrap();
        let high = c_major.quantize(f64::MAX);
        let low = c_major.quantize(-f64::MAX);
        assert!(c_major.contains(high) && c_major.contains(low));
        assert!(high > 999_000 && low < -999_000);
        assert_eq!(c_major.quantize_within(f64::MAX, 60, 72), Some(72));
        assert_eq!(c_major.quantize_within(-f64::MAX, 60, 72), Some(60));
    }

    #[test]
    fn quantize_within_pulls_into_range() {
        let c_major = Scale::named("major", 0).unwrap();
        // 72 is in the scale but above the range; 70 is not, so 69 wins.
        assert_eq!(c_major.quantize_within(72.0, 60, 70), Some(69));
        assert_eq!(c_major.quantize_within(58.0, 61, 72), Some(62));
        assert_eq!(c_major.quantize_within(64.0, 60, 72), Some(64));
    }

    #[test]
    fn quantize_within_empty_range() {
        let c_major = Scale::named("major", 0).unwrap();
        assert!(!c_major.has_tone_in(61, 61));
        assert_eq!(c_major.quantize_within(61.0, 61, 61), None);
        assert!(c_major.has_tone_in(60, 60));
    }
}
