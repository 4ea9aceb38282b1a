//! Tick-to-seconds conversion and inter-onset-interval tempo estimation.
//!
//! Onset intervals between 50 ms and 2 s are folded up by octaves until
//! they reach 200 ms, then greedily clustered with a 25 ms tolerance.
//! The most populated cluster's mean interval gives the tempo.

use super::decode::DecodeError;

/// MIDI default tempo (120 BPM) in microseconds per quarter note.
pub const DEFAULT_TEMPO_US: u32 = 500_000;

const MIN_IOI: f64 = 0.05;
const MAX_IOI: f64 = 2.0;
const FOLD_BELOW: f64 = 0.2;
const CLUSTER_WIDTH: f64 = 0.025;

/// Piecewise-linear tick → seconds mapping built from set-tempo events.
pub struct TempoMap {
    /// (start tick, start seconds, seconds per tick)
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    pub fn new(resolution: u16, mut changes: Vec<(u64, u32)>) -> Self {
        changes.sort_by_key(|&(tick, _)| tick);
        let ticks_per_quarter = f64::from(resolution.max(1));
        let scale = |us: u32| f64::from(us) / 1_000_000.0 / ticks_per_quarter;

        let mut segments = Vec::with_capacity(changes.len() + 1);
        let (mut start, mut start_secs, mut per_tick) = (0u64, 0.0, scale(DEFAULT_TEMPO_US));
        for (tick, us) in changes {
            let secs = start_secs + (tick - start) as f64 * per_tick;
            // A change at the same tick replaces the previous one
            if tick != start {
                segments.push((start, start_secs, per_tick));
            }
            (start, start_secs, per_tick) = (tick, secs, scale(us));
        }
        segments.push((start, start_secs, per_tick));
        Self { segments }
    }

    pub fn seconds(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|&(start, _, _)| start <= tick);
        let (start, secs, scale) = self.segments[idx.saturating_sub(1)];
        secs + (tick - start) as f64 * scale
    }
}

/// Sorted, de-duplicated onset times in seconds.
pub fn onsets(map: &TempoMap, mut ticks: Vec<u64>) -> Vec<f64> {
    ticks.sort_unstable();
    ticks.dedup();
    ticks.into_iter().map(|t| map.seconds(t)).collect()
}

/// Estimate the dominant tempo (BPM) from sorted onset times.
pub fn estimate_tempo(onsets: &[f64]) -> Result<f64, DecodeError> {
    if onsets.len() < 2 {
        return Err(DecodeError::TooFewOnsets(onsets.len()));
    }

    // (mean interval, member count)
    let mut clusters: Vec<(f64, u32)> = Vec::new();

    for pair in onsets.windows(2) {
        let mut ioi = pair[1] - pair[0];
        if ioi <= MIN_IOI || ioi >= MAX_IOI {
            continue;
        }
        while ioi < FOLD_BELOW {
            ioi *= 2.0;
        }

        let nearest = clusters
            .iter()
            .enumerate()
            .map(|(i, &(mean, _))| (i, (mean - ioi).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((i, dist)) if dist < CLUSTER_WIDTH => {
                let (mean, count) = clusters[i];
                let n = f64::from(count);
                clusters[i] = ((n * mean + ioi) / (n + 1.0), count + 1);
            }
            _ => clusters.push((ioi, 1)),
        }
    }

    // First-seen cluster wins ties
    let best = clusters
        .iter()
        .fold(None::<(f64, u32)>, |best, &c| match best {
            Some(b) if b.1 >= c.1 => Some(b),
            _ => Some(c),
        });

    match best {
        Some((mean, _)) => Ok(60.0 / mean),
        None => Err(DecodeError::NoRhythm),
    }
}
