use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use thiserror::Error;

use super::tempo::{self, TempoMap};

/// Files whose largest tick exceeds this are almost certainly corrupt.
pub const MAX_TICK: u64 = 10_000_000;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MIDI parse error: {0}")]
    Parse(#[from] midly::Error),
    #[error("Unsupported timing: SMPTE timecode ({0} fps)")]
    UnsupportedTiming(f32),
    #[error("Largest tick is {0}, file is likely corrupt")]
    TickOverflow(u64),
    #[error("Invalid time signature {numerator}/2^{denominator_pow}")]
    InvalidTimeSignature { numerator: u8, denominator_pow: u8 },
    #[error("Need at least two note onsets to estimate tempo, found {0}")]
    TooFewOnsets(usize),
    #[error("No inter-onset interval in the rhythmic range")]
    NoRhythm,
}

/// A time-signature change as read from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub tick: u64,
    pub numerator: u32,
    pub denominator: u32,
}

/// The subset of a decoded MIDI file the feature extractor needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMidi {
    /// Estimated global tempo in beats per minute.
    pub tempo: f64,
    /// Ticks per quarter note.
    pub resolution: u16,
    /// Time-signature changes ordered by tick.
    pub time_signature_changes: Vec<TimeSignature>,
}

/// Read and decode a Standard MIDI File.
pub fn load_midi(path: &Path) -> Result<DecodedMidi, DecodeError> {
    let bytes = std::fs::read(path)?;
    decode_bytes(&bytes)
}

/// Decode an in-memory Standard MIDI File.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedMidi, DecodeError> {
    let smf = Smf::parse(bytes)?;

    let resolution = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int(),
        Timing::Timecode(fps, _) => return Err(DecodeError::UnsupportedTiming(fps.as_f32())),
    };

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut time_signature_changes = Vec::new();
    let mut note_ticks: Vec<u64> = Vec::new();
    let mut max_tick = 0u64;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel.as_int() > 0 => note_ticks.push(tick),
                // Tempo map lives in the first track
                TrackEventKind::Meta(MetaMessage::Tempo(us)) if track_idx == 0 => {
                    tempo_changes.push((tick, us.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, pow, _, _)) => {
                    time_signature_changes.push(time_signature(tick, num, pow)?);
                }
                _ => {}
            }
        }
        max_tick = max_tick.max(tick);
    }

    if max_tick > MAX_TICK {
        return Err(DecodeError::TickOverflow(max_tick));
    }

    // Stable: simultaneous changes keep file order
    time_signature_changes.sort_by_key(|ts| ts.tick);

    let tempo_map = TempoMap::new(resolution, tempo_changes);
    let onsets = tempo::onsets(&tempo_map, note_ticks);
    let tempo = tempo::estimate_tempo(&onsets)?;

    Ok(DecodedMidi {
        tempo,
        resolution,
        time_signature_changes,
    })
}

fn time_signature(tick: u64, numerator: u8, denominator_pow: u8) -> Result<TimeSignature, DecodeError> {
    let denominator = 1u32.checked_shl(u32::from(denominator_pow));
    match denominator {
        Some(denominator) if numerator > 0 => Ok(TimeSignature {
            tick,
            numerator: u32::from(numerator),
            denominator,
        }),
        _ => Err(DecodeError::InvalidTimeSignature {
            numerator,
            denominator_pow,
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::midi_bytes;
    use super::*;

    #[test]
    fn test_decode_basic_file() {
        // 120 BPM, a note every quarter note
        let bytes = midi_bytes(480, Some(500_000), &[(3, 2)], 8, 480);
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.resolution, 480);
        assert!((decoded.tempo - 120.0).abs() < 1e-9);
        assert_eq!(
            decoded.time_signature_changes,
            vec![TimeSignature { tick: 0, numerator: 3, denominator: 4 }]
        );
    }

    #[test]
    fn test_default_tempo_is_120() {
        let bytes = midi_bytes(96, None, &[], 4, 96);
        let decoded = decode_bytes(&bytes).unwrap();
        assert!((decoded.tempo - 120.0).abs() < 1e-9);
        assert!(decoded.time_signature_changes.is_empty());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = decode_bytes(b"definitely not a midi file").unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));
    }

    #[test]
    fn test_truncated_file_is_error() {
        let bytes = midi_bytes(480, Some(500_000), &[], 8, 480);
        assert!(decode_bytes(&bytes[..bytes.len() - 6]).is_err());
    }

    #[test]
    fn test_single_note_cannot_estimate_tempo() {
        let bytes = midi_bytes(480, None, &[], 1, 480);
        let err = decode_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::TooFewOnsets(1)));
    }

    #[test]
    fn test_zero_numerator_rejected() {
        let bytes = midi_bytes(480, None, &[(0, 2)], 4, 480);
        let err = decode_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimeSignature { numerator: 0, .. }));
    }

    #[test]
    fn test_huge_tick_rejected() {
        let bytes = midi_bytes(480, None, &[], 3, 6_000_000);
        let err = decode_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::TickOverflow(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_midi(Path::new("/nonexistent/track.mid")).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
