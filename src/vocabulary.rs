//! Frozen genre vocabulary: genre ↔ dense class index, plus one-hot expansion.
//!
//! One instance is built from the label table and shared (read-only) by
//! dataset construction, model selection and prediction so every stage
//! agrees on the index assignment.

use crate::loader::labels::LabelTable;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabelError {
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Class index {index} out of range for {len} classes")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelVocabulary {
    genres: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Distinct genres in order of first appearance in the table.
    pub fn from_table(table: &LabelTable) -> Self {
        Self::from_genres(table.iter().map(|(_, genre)| genre))
    }

    pub fn from_genres<'a>(genres: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocab = Self {
            genres: Vec::new(),
            index: HashMap::new(),
        };
        for genre in genres {
            if !vocab.index.contains_key(genre) {
                vocab.index.insert(genre.to_string(), vocab.genres.len());
                vocab.genres.push(genre.to_string());
            }
        }
        vocab
    }

    pub fn index_of(&self, genre: &str) -> Result<usize, LabelError> {
        self.index
            .get(genre)
            .copied()
            .ok_or_else(|| LabelError::UnknownLabel(genre.to_string()))
    }

    pub fn genre_of(&self, index: usize) -> Result<&str, LabelError> {
        self.genres
            .get(index)
            .map(String::as_str)
            .ok_or(LabelError::IndexOutOfRange {
                index,
                len: self.genres.len(),
            })
    }

    /// One row per index with a single 1.0 at that index.
    pub fn one_hot(&self, indices: &[usize]) -> Result<Vec<Vec<f64>>, LabelError> {
        indices.iter().map(|&i| self.one_hot_row(i)).collect()
    }

    pub fn one_hot_row(&self, index: usize) -> Result<Vec<f64>, LabelError> {
        if index >= self.genres.len() {
            return Err(LabelError::IndexOutOfRange {
                index,
                len: self.genres.len(),
            });
        }
        let mut row = vec![0.0; self.genres.len()];
        row[index] = 1.0;
        Ok(row)
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }
}
