//! Train every candidate, score it on the validation split, keep the best.
//!
//! Scoring is exact-match: a dense prediction counts only when it equals the
//! true one-hot row element for element, a scalar prediction when it equals
//! the true class index. The same rule scores the held-out test split.

use crate::learn::{Classifier, FitError, Learner, LearnerConfig, OutputShape, Predictions, Targets};
use crate::partition::Subset;
use crate::vocabulary::{LabelError, LabelVocabulary};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("No candidate models configured")]
    NoCandidates,
    #[error("Candidate {name} failed to fit")]
    Fit {
        name: String,
        #[source]
        source: FitError,
    },
    #[error("Candidate {name} needs at least {needed} training rows, got {rows}")]
    TooFewTrainingRows {
        name: String,
        needed: usize,
        rows: usize,
    },
    #[error("Cannot score an empty {0} split")]
    EmptySplit(&'static str),
    #[error("Malformed prediction from {name}: {reason}")]
    MalformedPrediction { name: String, reason: String },
    #[error("Label error: {0}")]
    Label(#[from] LabelError),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A named learner with its declared output shape.
pub struct Candidate {
    pub name: String,
    pub shape: OutputShape,
    pub learner: Box<dyn Learner>,
}

/// Serializable form of a [`Candidate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub name: String,
    pub shape: OutputShape,
    pub learner: LearnerConfig,
}

impl CandidateConfig {
    pub fn build(&self) -> Candidate {
        Candidate {
            name: self.name.clone(),
            shape: self.shape,
            learner: self.learner.build(),
        }
    }
}

/// Candidates used when the config file lists none.
pub fn default_candidates() -> Vec<CandidateConfig> {
    let candidate = |name: &str, shape, learner| CandidateConfig {
        name: name.to_string(),
        shape,
        learner,
    };
    vec![
        candidate("knn-dense", OutputShape::Dense, LearnerConfig::KNearest { k: 3 }),
        candidate(
            "tree-dense",
            OutputShape::Dense,
            LearnerConfig::DecisionTree {
                max_depth: Some(12),
                min_samples_split: 2,
            },
        ),
        candidate(
            "forest-dense",
            OutputShape::Dense,
            LearnerConfig::RandomForest {
                trees: 50,
                max_depth: None,
                min_samples_split: 2,
                max_features: None,
                seed: 0,
            },
        ),
        candidate("knn-scalar", OutputShape::Scalar, LearnerConfig::KNearest { k: 5 }),
        candidate(
            "tree-scalar",
            OutputShape::Scalar,
            LearnerConfig::DecisionTree {
                max_depth: Some(8),
                min_samples_split: 10,
            },
        ),
        candidate("naive-bayes", OutputShape::Scalar, LearnerConfig::GaussianNb),
    ]
}

/// A fitted classifier with the shape its candidate declared.
pub struct TrainedModel {
    pub name: String,
    pub shape: OutputShape,
    pub classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub name: String,
    pub shape: OutputShape,
    pub accuracy: f64,
}

#[derive(Debug)]
pub struct Selection {
    pub model: TrainedModel,
    pub accuracy: f64,
    /// Validation accuracy of every candidate, in candidate order.
    pub scores: Vec<CandidateScore>,
}

/// Fit every candidate on `train`, score on `validation`, and return the
/// strictly best one (the earliest candidate wins ties).
///
/// Candidates are fitted in parallel on `jobs` threads. Any fit failure
/// aborts the selection; nothing is retried.
pub fn select_best(
    train: &Subset,
    validation: &Subset,
    vocabulary: &LabelVocabulary,
    candidates: Vec<Candidate>,
    jobs: usize,
) -> Result<Selection, SelectError> {
    if candidates.is_empty() {
        return Err(SelectError::NoCandidates);
    }
    if validation.is_empty() {
        return Err(SelectError::EmptySplit("validation"));
    }
    // Reject undersized training sets before any fitting starts
    if let Some(c) = candidates
        .iter()
        .find(|c| c.learner.min_training_rows() > train.len())
    {
        return Err(SelectError::TooFewTrainingRows {
            name: c.name.clone(),
            needed: c.learner.min_training_rows(),
            rows: train.len(),
        });
    }

    let dense_targets = vocabulary.one_hot(&train.labels)?;

    log::info!(
        "Training {} candidates on {} rows, validating on {}",
        candidates.len(),
        train.len(),
        validation.len()
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let results: Vec<Result<(TrainedModel, f64), SelectError>> = pool.install(|| {
        candidates
            .into_par_iter()
            .map(|candidate| {
                let targets = match candidate.shape {
                    OutputShape::Dense => Targets::Dense(&dense_targets),
                    OutputShape::Scalar => Targets::Scalar {
                        labels: &train.labels,
                        classes: vocabulary.len(),
                    },
                };
                let classifier = candidate
                    .learner
                    .fit(&train.features, targets)
                    .map_err(|source| SelectError::Fit {
                        name: candidate.name.clone(),
                        source,
                    })?;
                let model = TrainedModel {
                    name: candidate.name,
                    shape: candidate.shape,
                    classifier,
                };
                let accuracy = score(&model, validation, vocabulary, "validation")?;
                log::info!("{} ({}): validation accuracy {:.4}", model.name, model.shape, accuracy);
                Ok((model, accuracy))
            })
            .collect()
    });

    // Deterministic reduction in candidate order
    let mut scores = Vec::with_capacity(results.len());
    let mut best: Option<(TrainedModel, f64)> = None;
    for result in results {
        let (model, accuracy) = result?;
        scores.push(CandidateScore {
            name: model.name.clone(),
            shape: model.shape,
            accuracy,
        });
        if best.as_ref().is_none_or(|(_, top)| accuracy > *top) {
            best = Some((model, accuracy));
        }
    }

    let (model, accuracy) = best.ok_or(SelectError::NoCandidates)?;
    log::info!("Selected {} with validation accuracy {:.4}", model.name, accuracy);
    Ok(Selection {
        model,
        accuracy,
        scores,
    })
}

/// Exact-match accuracy of `model` on a held-out subset.
pub fn evaluate(
    model: &TrainedModel,
    subset: &Subset,
    vocabulary: &LabelVocabulary,
) -> Result<f64, SelectError> {
    score(model, subset, vocabulary, "test")
}

fn score(
    model: &TrainedModel,
    subset: &Subset,
    vocabulary: &LabelVocabulary,
    split: &'static str,
) -> Result<f64, SelectError> {
    if subset.is_empty() {
        return Err(SelectError::EmptySplit(split));
    }
    let predictions = model.classifier.predict(&subset.features);
    let correct = count_correct(model, &predictions, &subset.labels, vocabulary)?;
    Ok(correct as f64 / subset.len() as f64)
}

fn count_correct(
    model: &TrainedModel,
    predictions: &Predictions,
    labels: &[usize],
    vocabulary: &LabelVocabulary,
) -> Result<usize, SelectError> {
    let malformed = |reason: String| SelectError::MalformedPrediction {
        name: model.name.clone(),
        reason,
    };

    if predictions.shape() != model.shape {
        return Err(malformed(format!(
            "declared {} output but produced {}",
            model.shape,
            predictions.shape()
        )));
    }
    if predictions.len() != labels.len() {
        return Err(malformed(format!(
            "{} predictions for {} rows",
            predictions.len(),
            labels.len()
        )));
    }

    let correct = match predictions {
        Predictions::Dense(rows) => {
            let mut correct = 0;
            for (row, &label) in rows.iter().zip(labels) {
                if *row == vocabulary.one_hot_row(label)? {
                    correct += 1;
                }
            }
            correct
        }
        Predictions::Scalar(predicted) => predicted
            .iter()
            .zip(labels)
            .filter(|(p, l)| p == l)
            .count(),
    };
    Ok(correct)
}
