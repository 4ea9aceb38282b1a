//! End-to-end training run: labels + corpus → dataset → split → selection.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::dataset;
use crate::loader::{self, labels::LabelTable};
use crate::partition;
use crate::select::{self, Candidate, CandidateScore, TrainedModel};
use crate::vocabulary::LabelVocabulary;

pub struct TrainOptions {
    pub labels_path: PathBuf,
    pub corpus_dir: PathBuf,
    pub seed: Option<u64>,
    pub jobs: usize,
    pub candidates: Vec<Candidate>,
}

pub struct TrainingOutcome {
    pub vocabulary: LabelVocabulary,
    pub model: TrainedModel,
    pub validation_accuracy: f64,
    pub test_accuracy: f64,
    pub scores: Vec<CandidateScore>,
    pub matched_files: usize,
    pub extracted: u64,
    pub failed: u64,
    pub split_sizes: (usize, usize, usize),
}

pub fn train(options: TrainOptions) -> Result<TrainingOutcome> {
    let table = LabelTable::load(&options.labels_path)
        .with_context(|| format!("Failed to load labels from {}", options.labels_path.display()))?;
    let vocabulary = LabelVocabulary::from_table(&table);
    log::info!("{} genres in vocabulary", vocabulary.len());

    let files = loader::discover(&options.corpus_dir);
    let matched = loader::join(files, &table);
    if matched.is_empty() {
        anyhow::bail!(
            "No MIDI files under {} match a labeled track id",
            options.corpus_dir.display()
        );
    }

    let built = dataset::build(&matched, &vocabulary, options.jobs)
        .context("Dataset construction failed")?;

    let split = partition::partition(built.matrix, options.seed);
    let split_sizes = (split.train.len(), split.validation.len(), split.test.len());

    let selection = select::select_best(
        &split.train,
        &split.validation,
        &vocabulary,
        options.candidates,
        options.jobs,
    )
    .context("Model selection failed")?;

    let test_accuracy = select::evaluate(&selection.model, &split.test, &vocabulary)
        .context("Test evaluation failed")?;
    log::info!("{}: test accuracy {:.4}", selection.model.name, test_accuracy);

    Ok(TrainingOutcome {
        vocabulary,
        model: selection.model,
        validation_accuracy: selection.accuracy,
        test_accuracy,
        scores: selection.scores,
        matched_files: matched.len(),
        extracted: built.extracted,
        failed: built.failed,
        split_sizes,
    })
}
