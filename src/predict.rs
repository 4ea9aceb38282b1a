use crate::extractor::{self, decode::DecodeError};
use crate::learn::{OutputShape, Predictions};
use crate::select::TrainedModel;
use crate::vocabulary::{LabelError, LabelVocabulary};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Label error: {0}")]
    Label(#[from] LabelError),
    #[error("Malformed prediction: {0}")]
    MalformedPrediction(String),
}

/// Predict the genre of a single MIDI file. Decode failures are returned,
/// not skipped.
pub fn predict(
    model: &TrainedModel,
    vocabulary: &LabelVocabulary,
    path: &Path,
) -> Result<String, PredictError> {
    let features = extractor::extract(path)?;
    let predictions = model.classifier.predict(&[features]);
    let index = decode_prediction(model.shape, predictions)?;
    let genre = vocabulary.genre_of(index)?;
    log::debug!("{}: predicted {} (class {})", path.display(), genre, index);
    Ok(genre.to_string())
}

/// Class index of a single-row prediction of the given shape.
fn decode_prediction(shape: OutputShape, predictions: Predictions) -> Result<usize, PredictError> {
    match (shape, predictions) {
        (OutputShape::Dense, Predictions::Dense(rows)) => match rows.as_slice() {
            [row] => one_hot_index(row),
            _ => Err(PredictError::MalformedPrediction(format!(
                "expected one row, got {}",
                rows.len()
            ))),
        },
        (OutputShape::Scalar, Predictions::Scalar(labels)) => match labels.as_slice() {
            [label] => Ok(*label),
            _ => Err(PredictError::MalformedPrediction(format!(
                "expected one label, got {}",
                labels.len()
            ))),
        },
        (shape, predictions) => Err(PredictError::MalformedPrediction(format!(
            "declared {} output but produced {}",
            shape,
            predictions.shape()
        ))),
    }
}

fn one_hot_index(row: &[f64]) -> Result<usize, PredictError> {
    let mut ones = row.iter().enumerate().filter(|&(_, &v)| v == 1.0).map(|(i, _)| i);
    match (ones.next(), ones.next()) {
        (Some(index), None) => Ok(index),
        (None, _) => Err(PredictError::MalformedPrediction(
            "no position set in one-hot output".into(),
        )),
        (Some(_), Some(_)) => Err(PredictError::MalformedPrediction(
            "more than one position set in one-hot output".into(),
        )),
    }
}
