//! Pipeline configuration.

use std::path::PathBuf;

use rand::Rng;
use seismo_rf::{MaxFeatures, OobMode, RandomForestConfig, RfError};
use tracing::info;

/// Settings for one end-to-end run.
///
/// # Defaults
///
/// | Field           | Default            |
/// |-----------------|--------------------|
/// | `data_path`     | `stats_data.csv`   |
/// | `test_path`     | `stats_test.csv`   |
/// | `output_dir`    | `.`                |
/// | `train_rows`    | 7500               |
/// | `n_trees`       | 256                |
/// | `max_depth`     | `Some(14)`         |
/// | `max_features`  | 2                  |
/// | `cv_folds`      | 5                  |
/// | `test_fraction` | 0.2                |
/// | `n_jobs`        | `Some(6)`          |
/// | `seed`          | 42                 |
/// | `oob`           | `false`            |
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Labeled statistics CSV.
    pub data_path: PathBuf,
    /// Unlabeled test statistics CSV.
    pub test_path: PathBuf,
    /// Directory receiving every output file.
    pub output_dir: PathBuf,
    /// Leading rows used for training; the rest is the holdout block.
    pub train_rows: usize,
    /// Trees per forest.
    pub n_trees: usize,
    /// Maximum tree depth (`None` = unlimited).
    pub max_depth: Option<usize>,
    /// Features sampled per split.
    pub max_features: usize,
    /// Number of cross-validation folds.
    pub cv_folds: usize,
    /// Fraction of the training block withheld before cross-validation.
    pub test_fraction: f64,
    /// Worker threads per forest fit (`None` = global pool).
    pub n_jobs: Option<usize>,
    /// Seed for the train/test split and every forest.
    pub seed: u64,
    /// Compute the out-of-bag R² of the final model.
    pub oob: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("stats_data.csv"),
            test_path: PathBuf::from("stats_test.csv"),
            output_dir: PathBuf::from("."),
            train_rows: 7500,
            n_trees: 256,
            max_depth: Some(14),
            max_features: 2,
            cv_folds: 5,
            test_fraction: 0.2,
            n_jobs: Some(6),
            seed: 42,
            oob: false,
        }
    }
}

impl PipelineConfig {
    /// Build the forest hyperparameters shared by every stage.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn forest_config(&self) -> Result<RandomForestConfig, RfError> {
        Ok(RandomForestConfig::new(self.n_trees)?
            .with_max_depth(self.max_depth)
            .with_max_features(MaxFeatures::Fixed(self.max_features))
            .with_n_jobs(self.n_jobs)
            .with_seed(self.seed)
            .with_oob_mode(OobMode::Disabled))
    }
}

/// Return `seed`, or draw one from OS entropy and log it.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::thread_rng().r#gen();
            info!(seed, "no seed given, drew one from entropy");
            seed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let config = PipelineConfig::default();
        assert_eq!(config.train_rows, 7500);
        assert_eq!(config.cv_folds, 5);
        let rf = config.forest_config().unwrap();
        assert_eq!(rf.n_trees(), 256);
        assert_eq!(rf.max_depth(), Some(14));
        assert_eq!(rf.max_features(), MaxFeatures::Fixed(2));
        assert_eq!(rf.n_jobs(), Some(6));
        assert_eq!(rf.seed(), 42);
    }

    #[test]
    fn zero_trees_rejected() {
        let config = PipelineConfig {
            n_trees: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.forest_config(),
            Err(RfError::InvalidTreeCount { n_trees: 0 })
        ));
    }

    #[test]
    fn explicit_seed_is_kept() {
        assert_eq!(resolve_seed(Some(1234)), 1234);
    }
}
