pub mod decode;
pub mod tempo;

use decode::{DecodeError, DecodedMidi};
use serde::Serialize;
use std::path::Path;

/// Number of components in a [`FeatureVector`].
pub const FEATURE_DIM: usize = 4;

/// Time signature assumed when a file declares none.
const DEFAULT_TIME_SIGNATURE: (u32, u32) = (4, 4);

// (offset, divisor) pairs mapping raw signals to roughly [-1, 1]
const TEMPO_SCALE: (f64, f64) = (150.0, 300.0);
const RESOLUTION_SCALE: (f64, f64) = (260.0, 400.0);
const TIME_SIG_SCALE: (f64, f64) = (3.0, 8.0);

/// Normalized summary of one MIDI file:
/// `[tempo, resolution, ts_numerator, ts_denominator]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_DIM]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_DIM] {
        &self.0
    }

    pub fn tempo(&self) -> f64 {
        self.0[0]
    }

    pub fn resolution(&self) -> f64 {
        self.0[1]
    }

    pub fn time_signature_numerator(&self) -> f64 {
        self.0[2]
    }

    pub fn time_signature_denominator(&self) -> f64 {
        self.0[3]
    }

    /// Squared Euclidean distance to another vector.
    pub fn distance_sq(&self, other: &FeatureVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Raw signals read from a decoded file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignals {
    pub tempo: f64,
    pub resolution: u16,
    /// Read for bookkeeping; not part of the feature vector.
    pub time_signature_changes: usize,
    pub numerator: u32,
    pub denominator: u32,
}

impl RawSignals {
    pub fn from_decoded(midi: &DecodedMidi) -> Self {
        let (numerator, denominator) = midi
            .time_signature_changes
            .first()
            .map(|ts| (ts.numerator, ts.denominator))
            .unwrap_or(DEFAULT_TIME_SIGNATURE);

        Self {
            tempo: midi.tempo,
            resolution: midi.resolution,
            time_signature_changes: midi.time_signature_changes.len(),
            numerator,
            denominator,
        }
    }

    pub fn normalize(&self) -> FeatureVector {
        let scale = |value: f64, (offset, divisor): (f64, f64)| (value - offset) / divisor;
        FeatureVector([
            scale(self.tempo, TEMPO_SCALE),
            scale(f64::from(self.resolution), RESOLUTION_SCALE),
            scale(f64::from(self.numerator), TIME_SIG_SCALE),
            scale(f64::from(self.denominator), TIME_SIG_SCALE),
        ])
    }
}

/// Extract the normalized feature vector of a MIDI file.
///
/// Only codec errors are reported; callers building a dataset skip the
/// file, callers predicting a single file surface the error.
pub fn extract(path: &Path) -> Result<FeatureVector, DecodeError> {
    let midi = decode::load_midi(path)?;
    let signals = RawSignals::from_decoded(&midi);

    log::trace!(
        "{}: tempo {:.1}, resolution {}, {} time-signature changes, {}/{}",
        path.display(),
        signals.tempo,
        signals.resolution,
        signals.time_signature_changes,
        signals.numerator,
        signals.denominator
    );

    Ok(signals.normalize())
}

#[cfg(test)]
mod tests {
    use super::decode::fixtures::midi_bytes;
    use super::decode::TimeSignature;
    use super::*;

    #[test]
    fn test_normalization_constants() {
        let signals = RawSignals {
            tempo: 120.0,
            resolution: 480,
            time_signature_changes: 1,
            numerator: 3,
            denominator: 4,
        };
        let v = signals.normalize();
        assert!((v.tempo() - (-0.1)).abs() < 1e-12);
        assert!((v.resolution() - 0.55).abs() < 1e-12);
        assert_eq!(v.time_signature_numerator(), 0.0);
        assert!((v.time_signature_denominator() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_default_time_signature() {
        let midi = DecodedMidi {
            tempo: 150.0,
            resolution: 260,
            time_signature_changes: Vec::new(),
        };
        let signals = RawSignals::from_decoded(&midi);
        assert_eq!((signals.numerator, signals.denominator), (4, 4));
        assert_eq!(signals.time_signature_changes, 0);
        let v = signals.normalize();
        assert_eq!(v.values(), &[0.0, 0.0, 0.125, 0.125]);
    }

    #[test]
    fn test_first_time_signature_used() {
        let midi = DecodedMidi {
            tempo: 100.0,
            resolution: 96,
            time_signature_changes: vec![
                TimeSignature { tick: 0, numerator: 6, denominator: 8 },
                TimeSignature { tick: 960, numerator: 2, denominator: 2 },
            ],
        };
        let signals = RawSignals::from_decoded(&midi);
        assert_eq!((signals.numerator, signals.denominator), (6, 8));
        assert_eq!(signals.time_signature_changes, 2);
    }

    #[test]
    fn test_extract_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mid");
        std::fs::write(&path, midi_bytes(480, Some(600_000), &[(5, 3)], 16, 240)).unwrap();

        let first = extract(&path).unwrap();
        let second = extract(&path).unwrap();
        let bits = |v: &FeatureVector| v.values().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
        assert!(first.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_extract_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mid");
        std::fs::write(&path, b"MThd\x00\x00\x00\x06garbage").unwrap();
        assert!(extract(&path).is_err());
    }

    #[test]
    fn test_distance() {
        let a = FeatureVector::new([0.0, 0.0, 0.0, 0.0]);
        let b = FeatureVector::new([1.0, 2.0, 0.0, 2.0]);
        assert_eq!(a.distance_sq(&b), 9.0);
    }
}
