use crate::dataset::LabeledRow;
use crate::extractor::FeatureVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

// Cumulative split boundaries as fractions of the row count
const TRAIN_END: (usize, usize) = (3, 5);
const VALIDATION_END: (usize, usize) = (4, 5);

/// Feature columns and class indices of one split, row-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<usize>,
}

impl Subset {
    fn from_rows(rows: &[LabeledRow]) -> Self {
        Self {
            features: rows.iter().map(|r| r.features).collect(),
            labels: rows.iter().map(|r| r.label).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub train: Subset,
    pub validation: Subset,
    pub test: Subset,
}

/// Cumulative split offsets `(floor(0.6n), floor(0.8n))`.
pub fn split_points(n: usize) -> (usize, usize) {
    let at = |(num, den): (usize, usize)| n * num / den;
    (at(TRAIN_END), at(VALIDATION_END))
}

/// Shuffle the rows and split them 60/20/20. A fixed `seed` gives a
/// reproducible permutation; `None` draws from the thread RNG.
pub fn partition(mut matrix: Vec<LabeledRow>, seed: Option<u64>) -> DatasetSplit {
    match seed {
        Some(seed) => matrix.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => matrix.shuffle(&mut rand::rng()),
    }

    let (train_end, validation_end) = split_points(matrix.len());
    log::debug!(
        "Partitioned {} rows: {} train, {} validation, {} test",
        matrix.len(),
        train_end,
        validation_end - train_end,
        matrix.len() - validation_end
    );

    DatasetSplit {
        train: Subset::from_rows(&matrix[..train_end]),
        validation: Subset::from_rows(&matrix[train_end..validation_end]),
        test: Subset::from_rows(&matrix[validation_end..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n: usize) -> Vec<LabeledRow> {
        (0..n)
            .map(|i| LabeledRow {
                features: FeatureVector::new([i as f64, 0.0, 0.0, 0.0]),
                label: i,
            })
            .collect()
    }

    #[test]
    fn test_split_sizes() {
        for n in [0, 1, 2, 3, 5, 10, 11, 99, 1000] {
            let split = partition(matrix(n), Some(7));
            let (t, v) = split_points(n);
            assert_eq!(split.train.len(), n * 6 / 10);
            assert_eq!(split.train.len(), t);
            assert_eq!(split.validation.len(), v - t);
            assert_eq!(split.validation.len(), n * 8 / 10 - n * 6 / 10);
            assert_eq!(split.train.len() + split.validation.len() + split.test.len(), n);
        }
    }

    #[test]
    fn test_small_inputs_do_not_panic() {
        let split = partition(matrix(2), Some(1));
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.validation.len(), 0);
        assert_eq!(split.test.len(), 1);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let a = partition(matrix(50), Some(42));
        let b = partition(matrix(50), Some(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_partition_is_a_permutation() {
        let split = partition(matrix(40), Some(3));
        let mut seen: Vec<usize> = split
            .train
            .labels
            .iter()
            .chain(&split.validation.labels)
            .chain(&split.test.labels)
            .copied()
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());

        // Features stay aligned with their labels
        for (f, &l) in split.train.features.iter().zip(&split.train.labels) {
            assert_eq!(f.tempo(), l as f64);
        }
    }
}
