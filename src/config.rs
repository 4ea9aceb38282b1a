use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::select::{CandidateConfig, default_candidates};

/// Application configuration loaded from TOML config file.
/// Every field has a default; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Tab-separated genre label file (used when no `--labels` is given).
    pub labels_path: Option<PathBuf>,
    /// Root of the MIDI corpus (used when no `--corpus` is given).
    pub corpus_dir: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Shuffle seed for the train/validation/test split. Unset = random.
    pub seed: Option<u64>,
    /// Candidate models. Empty = built-in list.
    pub candidates: Vec<CandidateConfig>,
}

impl AppConfig {
    /// Load config from `path`, or `~/.config/genrescope/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Configured candidates, or the built-in list when none are set.
    pub fn resolve_candidates(&self) -> Vec<CandidateConfig> {
        if self.candidates.is_empty() {
            default_candidates()
        } else {
            self.candidates.clone()
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::{LearnerConfig, OutputShape};

    #[test]
    fn test_empty_config_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.labels_path.is_none());
        assert_eq!(config.seed, None);
        assert_eq!(config.resolve_candidates(), default_candidates());
        assert!(config.resolve_workers() >= 1);
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(
            r#"
            labels_path = "/data/msd_tagtraum_cd1.cls"
            corpus_dir = "/data/lmd_matched"
            workers = 3
            seed = 42

            [[candidates]]
            name = "knn"
            shape = "dense"
            learner = { kind = "k_nearest", k = 7 }

            [[candidates]]
            name = "bayes"
            shape = "scalar"
            learner = { kind = "gaussian_nb" }
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.corpus_dir.as_deref(), Some(Path::new("/data/lmd_matched")));
        let candidates = config.resolve_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].shape, OutputShape::Dense);
        assert_eq!(candidates[0].learner, LearnerConfig::KNearest { k: 7 });
        assert_eq!(candidates[1].learner, LearnerConfig::GaussianNb);
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let config = AppConfig::load(Some(&path));
        assert_eq!(config.workers, 0);
    }
}
