//! Supervised learners behind a small fit/predict interface.
//!
//! Every learner handles two output shapes. `Scalar` targets are one class
//! index per row. `Dense` targets are one-hot rows, learned as independent
//! binary outputs (one per class), so a dense prediction is a {0,1} row
//! that is not guaranteed to contain exactly one 1.

pub mod bayes;
pub mod forest;
pub mod knn;
pub mod tree;

use crate::extractor::FeatureVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// One-hot style vector per prediction.
    Dense,
    /// Single class index per prediction.
    Scalar,
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dense => write!(f, "dense"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Empty training set")]
    Empty,
    #[error("{features} feature rows but {targets} target rows")]
    LengthMismatch { features: usize, targets: usize },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{learner} does not support {shape} targets")]
    UnsupportedShape {
        learner: &'static str,
        shape: OutputShape,
    },
    #[error("Target row {row} is not a 0/1 vector")]
    NonBinaryTarget { row: usize },
    #[error("Label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },
}

/// Training targets in the shape the candidate declares.
#[derive(Debug, Clone, Copy)]
pub enum Targets<'a> {
    Scalar { labels: &'a [usize], classes: usize },
    Dense(&'a [Vec<f64>]),
}

impl Targets<'_> {
    pub fn shape(&self) -> OutputShape {
        match self {
            Self::Scalar { .. } => OutputShape::Scalar,
            Self::Dense(_) => OutputShape::Dense,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Scalar { labels, .. } => labels.len(),
            Self::Dense(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    Dense(Vec<Vec<f64>>),
    Scalar(Vec<usize>),
}

impl Predictions {
    pub fn shape(&self) -> OutputShape {
        match self {
            Self::Dense(_) => OutputShape::Dense,
            Self::Scalar(_) => OutputShape::Scalar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Dense(rows) => rows.len(),
            Self::Scalar(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A trained model.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[FeatureVector]) -> Predictions;
}

/// An untrained configuration.
pub trait Learner: Send + Sync {
    /// Fewest training rows this configuration can be fitted on.
    fn min_training_rows(&self) -> usize {
        1
    }

    fn fit(
        &self,
        features: &[FeatureVector],
        targets: Targets<'_>,
    ) -> Result<Box<dyn Classifier>, FitError>;
}

/// Serializable learner settings, used by the candidate config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnerConfig {
    KNearest {
        k: usize,
    },
    DecisionTree {
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
    },
    RandomForest {
        #[serde(default = "default_trees")]
        trees: usize,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
        #[serde(default)]
        max_features: Option<usize>,
        #[serde(default)]
        seed: u64,
    },
    GaussianNb,
}

fn default_min_samples_split() -> usize {
    2
}

fn default_trees() -> usize {
    50
}

impl LearnerConfig {
    pub fn build(&self) -> Box<dyn Learner> {
        match *self {
            Self::KNearest { k } => Box::new(knn::KNearest { k }),
            Self::DecisionTree {
                max_depth,
                min_samples_split,
            } => Box::new(tree::DecisionTree {
                params: tree::TreeParams {
                    max_depth,
                    min_samples_split,
                    max_features: None,
                },
            }),
            Self::RandomForest {
                trees,
                max_depth,
                min_samples_split,
                max_features,
                seed,
            } => Box::new(forest::RandomForest {
                trees,
                params: tree::TreeParams {
                    max_depth,
                    min_samples_split,
                    max_features,
                },
                seed,
            }),
            Self::GaussianNb => Box::new(bayes::GaussianNb),
        }
    }
}

/// Targets flattened into one or more categorical output columns.
///
/// Scalar targets become a single column over `classes` values; dense
/// targets become one binary column per class.
#[derive(Debug, Clone)]
pub(crate) struct Outputs {
    shape: OutputShape,
    /// `values[row][output]`
    values: Vec<Vec<usize>>,
    /// Number of distinct values per output.
    cardinality: Vec<usize>,
}

impl Outputs {
    pub(crate) fn new(features: &[FeatureVector], targets: Targets<'_>) -> Result<Self, FitError> {
        if features.len() != targets.len() {
            return Err(FitError::LengthMismatch {
                features: features.len(),
                targets: targets.len(),
            });
        }
        if features.is_empty() {
            return Err(FitError::Empty);
        }

        match targets {
            Targets::Scalar { labels, classes } => {
                if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
                    return Err(FitError::LabelOutOfRange { label, classes });
                }
                Ok(Self {
                    shape: OutputShape::Scalar,
                    values: labels.iter().map(|&l| vec![l]).collect(),
                    cardinality: vec![classes],
                })
            }
            Targets::Dense(rows) => {
                let width = rows[0].len();
                let mut values = Vec::with_capacity(rows.len());
                for (row, target) in rows.iter().enumerate() {
                    if target.len() != width || target.iter().any(|&v| v != 0.0 && v != 1.0) {
                        return Err(FitError::NonBinaryTarget { row });
                    }
                    values.push(target.iter().map(|&v| usize::from(v == 1.0)).collect());
                }
                Ok(Self {
                    shape: OutputShape::Dense,
                    values,
                    cardinality: vec![2; width],
                })
            }
        }
    }

    pub(crate) fn shape(&self) -> OutputShape {
        self.shape
    }

    pub(crate) fn rows(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn row(&self, row: usize) -> &[usize] {
        &self.values[row]
    }

    pub(crate) fn cardinality(&self) -> &[usize] {
        &self.cardinality
    }

    /// Zeroed per-output value counters.
    pub(crate) fn empty_counts(&self) -> Vec<Vec<usize>> {
        self.cardinality.iter().map(|&c| vec![0; c]).collect()
    }

    pub(crate) fn add(&self, counts: &mut [Vec<usize>], row: usize) {
        for (o, &v) in self.values[row].iter().enumerate() {
            counts[o][v] += 1;
        }
    }
}

/// Most frequent value; the smallest value wins ties.
pub(crate) fn majority(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (v, &c)| if c > best.1 { (v, c) } else { best })
        .0
}

/// Turn per-row output values back into the declared prediction shape.
pub(crate) fn to_predictions(shape: OutputShape, rows: Vec<Vec<usize>>) -> Predictions {
    match shape {
        OutputShape::Scalar => Predictions::Scalar(rows.into_iter().map(|r| r[0]).collect()),
        OutputShape::Dense => Predictions::Dense(
            rows.into_iter()
                .map(|r| r.into_iter().map(|v| v as f64).collect())
                .collect(),
        ),
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    use super::*;

    /// Two well separated clusters per class along the tempo axis.
    pub fn clusters(classes: usize, per_class: usize) -> (Vec<FeatureVector>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for c in 0..classes {
            for i in 0..per_class {
                let jitter = i as f64 * 0.001;
                features.push(FeatureVector::new([c as f64 + jitter, 0.5 - jitter, 0.0, 0.125]));
                labels.push(c);
            }
        }
        (features, labels)
    }

    pub fn one_hot(labels: &[usize], classes: usize) -> Vec<Vec<f64>> {
        labels
            .iter()
            .map(|&l| (0..classes).map(|c| if c == l { 1.0 } else { 0.0 }).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_ties_pick_smallest() {
        assert_eq!(majority(&[2, 5, 5]), 1);
        assert_eq!(majority(&[0, 0, 0]), 0);
        assert_eq!(majority(&[1, 0, 3]), 2);
    }

    #[test]
    fn test_outputs_dense() {
        let features = vec![FeatureVector::new([0.0; 4]); 2];
        let rows = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let outputs = Outputs::new(&features, Targets::Dense(&rows)).unwrap();
        assert_eq!(outputs.cardinality(), &[2, 2, 2]);
        assert_eq!(outputs.row(0), &[0, 1, 0]);
    }

    #[test]
    fn test_outputs_rejects_bad_targets() {
        let features = vec![FeatureVector::new([0.0; 4]); 2];
        let rows = vec![vec![0.0, 1.0], vec![0.3, 0.7]];
        assert_eq!(
            Outputs::new(&features, Targets::Dense(&rows)).unwrap_err(),
            FitError::NonBinaryTarget { row: 1 }
        );
        assert_eq!(
            Outputs::new(&features, Targets::Scalar { labels: &[0, 3], classes: 3 }).unwrap_err(),
            FitError::LabelOutOfRange { label: 3, classes: 3 }
        );
        assert_eq!(
            Outputs::new(&features, Targets::Scalar { labels: &[0], classes: 3 }).unwrap_err(),
            FitError::LengthMismatch { features: 2, targets: 1 }
        );
        assert_eq!(
            Outputs::new(&[], Targets::Scalar { labels: &[], classes: 3 }).unwrap_err(),
            FitError::Empty
        );
    }

    #[test]
    fn test_config_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            learner: LearnerConfig,
        }
        let w: Wrapper = toml::from_str("learner = { kind = \"random_forest\", trees = 10 }").unwrap();
        assert_eq!(
            w.learner,
            LearnerConfig::RandomForest {
                trees: 10,
                max_depth: None,
                min_samples_split: 2,
                max_features: None,
                seed: 0,
            }
        );
        let w: Wrapper = toml::from_str("learner = { kind = \"gaussian_nb\" }").unwrap();
        assert_eq!(w.learner, LearnerConfig::GaussianNb);
    }
}
