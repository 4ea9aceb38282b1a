use crate::extractor::{self, FEATURE_DIM, FeatureVector};
use crate::loader::MatchedPath;
use crate::vocabulary::{LabelError, LabelVocabulary};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Label error: {0}")]
    Label(#[from] LabelError),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A feature vector with its class index appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledRow {
    pub features: FeatureVector,
    pub label: usize,
}

impl LabeledRow {
    /// The row as `FEATURE_DIM + 1` numbers, class index last.
    pub fn to_values(&self) -> [f64; FEATURE_DIM + 1] {
        let mut out = [0.0; FEATURE_DIM + 1];
        out[..FEATURE_DIM].copy_from_slice(self.features.values());
        out[FEATURE_DIM] = self.label as f64;
        out
    }
}

pub type LabeledMatrix = Vec<LabeledRow>;

#[derive(Debug)]
pub struct BuildResult {
    pub matrix: LabeledMatrix,
    pub extracted: u64,
    pub failed: u64,
}

/// Extract features for every matched file, dropping the ones that fail
/// to decode. Output order follows input order.
///
/// Every genre is resolved against `vocabulary` before any file is read;
/// an unknown genre aborts the build.
pub fn build(
    rows: &[MatchedPath],
    vocabulary: &LabelVocabulary,
    jobs: usize,
) -> Result<BuildResult, DatasetError> {
    let labels: Vec<usize> = rows
        .iter()
        .map(|row| vocabulary.index_of(&row.genre))
        .collect::<Result<_, _>>()?;

    if rows.is_empty() {
        log::info!("No files to extract");
        return Ok(BuildResult {
            matrix: Vec::new(),
            extracted: 0,
            failed: 0,
        });
    }

    log::info!("Extracting features from {} files with {} workers", rows.len(), jobs);

    let pb = ProgressBar::new(rows.len() as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let extracted: Vec<Option<FeatureVector>> = pool.install(|| {
        rows.par_iter()
            .map(|row| {
                let features = extract_or_skip(&row.path);
                pb.inc(1);
                features
            })
            .collect()
    });

    let matrix: LabeledMatrix = extracted
        .into_iter()
        .zip(labels)
        .filter_map(|(features, label)| features.map(|features| LabeledRow { features, label }))
        .collect();

    let ok = matrix.len() as u64;
    let failed = rows.len() as u64 - ok;
    pb.finish_with_message(format!("Done: {ok} extracted, {failed} failed"));
    log::info!("Extracted {ok} rows, skipped {failed} undecodable files");

    Ok(BuildResult {
        matrix,
        extracted: ok,
        failed,
    })
}

fn extract_or_skip(path: &Path) -> Option<FeatureVector> {
    match extractor::extract(path) {
        Ok(features) => Some(features),
        Err(e) => {
            log::debug!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::decode::fixtures::midi_bytes;

    fn matched(path: &Path, genre: &str) -> MatchedPath {
        MatchedPath {
            path: path.to_path_buf(),
            genre: genre.to_string(),
        }
    }

    #[test]
    fn test_corrupt_file_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = dir.path().join("a.mid");
        let bad = dir.path().join("b.mid");
        let good_c = dir.path().join("c.mid");
        std::fs::write(&good_a, midi_bytes(480, None, &[], 4, 480)).unwrap();
        std::fs::write(&bad, b"MThd broken").unwrap();
        std::fs::write(&good_c, midi_bytes(96, None, &[(6, 3)], 4, 48)).unwrap();

        let vocab = LabelVocabulary::from_genres(["Jazz", "Rock"]);
        let rows = vec![
            matched(&good_a, "Rock"),
            matched(&bad, "Jazz"),
            matched(&good_c, "Jazz"),
        ];

        let result = build(&rows, &vocab, 2).unwrap();
        assert_eq!(result.matrix.len(), 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.matrix[0].label, 1);
        assert_eq!(result.matrix[1].label, 0);
        assert_eq!(result.matrix[0].features, extractor::extract(&good_a).unwrap());
        assert_eq!(result.matrix[1].features, extractor::extract(&good_c).unwrap());
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let vocab = LabelVocabulary::from_genres(["Jazz"]);
        let rows = vec![matched(Path::new("/nowhere.mid"), "Polka")];
        let err = build(&rows, &vocab, 1).unwrap_err();
        assert!(matches!(err, DatasetError::Label(LabelError::UnknownLabel(_))));
    }

    #[test]
    fn test_empty_input() {
        let vocab = LabelVocabulary::from_genres(["Jazz"]);
        let result = build(&[], &vocab, 1).unwrap();
        assert!(result.matrix.is_empty());
    }

    #[test]
    fn test_row_values() {
        let row = LabeledRow {
            features: FeatureVector::new([0.1, 0.2, 0.3, 0.4]),
            label: 3,
        };
        assert_eq!(row.to_values(), [0.1, 0.2, 0.3, 0.4, 3.0]);
    }
}
