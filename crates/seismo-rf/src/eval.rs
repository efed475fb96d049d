//! Train/test splitting and k-fold cross-validation for Random Forest regression.

use std::ops::Range;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::metrics::{mean_and_std, r2_score};

/// A random partition of sample indices into a train part and a test part.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    train_indices: Vec<usize>,
    test_indices: Vec<usize>,
}

impl TrainTestSplit {
    /// Return the train indices, in shuffled order.
    #[must_use]
    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    /// Return the test indices, in shuffled order.
    #[must_use]
    pub fn test_indices(&self) -> &[usize] {
        &self.test_indices
    }

    /// Copy out the train rows and targets.
    #[must_use]
    pub fn train_rows(&self, features: &[Vec<f64>], targets: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
        gather(features, targets, &self.train_indices)
    }

    /// Copy out the test rows and targets.
    #[must_use]
    pub fn test_rows(&self, features: &[Vec<f64>], targets: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
        gather(features, targets, &self.test_indices)
    }
}

fn gather(features: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    indices
        .iter()
        .map(|&i| (features[i].clone(), targets[i]))
        .unzip()
}

/// Randomly split `n_samples` indices into train and test parts.
///
/// The test part gets `ceil(test_fraction · n_samples)` indices; the
/// permutation is drawn from a ChaCha8 RNG seeded with `seed`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::InvalidTestFraction`] | `test_fraction` not in (0.0, 1.0) |
/// | [`RfError::TooFewSamples`] | either part would be empty |
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, RfError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(RfError::InvalidTestFraction {
            fraction: test_fraction,
        });
    }
    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(RfError::TooFewSamples {
            n_samples,
            n_parts: 2,
        });
    }

    let mut permutation: Vec<usize> = (0..n_samples).collect();
    permutation.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train_indices = permutation.split_off(n_test);

    Ok(TrainTestSplit {
        train_indices,
        test_indices: permutation,
    })
}

/// Contiguous (unshuffled) k-fold partitioning.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_folds: usize,
}

impl KFold {
    /// Create a k-fold splitter.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds })
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return the test range of each fold, in order.
    ///
    /// Every fold holds `n_samples / n_folds` rows; the first
    /// `n_samples % n_folds` folds hold one more.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::TooFewSamples`] if `n_samples < n_folds`.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Range<usize>>, RfError> {
        if n_samples < self.n_folds {
            return Err(RfError::TooFewSamples {
                n_samples,
                n_parts: self.n_folds,
            });
        }
        let base = n_samples / self.n_folds;
        let extra = n_samples % self.n_folds;
        let mut start = 0;
        Ok((0..self.n_folds)
            .map(|fold| {
                let len = base + usize::from(fold < extra);
                let range = start..start + len;
                start += len;
                range
            })
            .collect())
    }
}

/// K-fold cross-validation configuration.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    kfold: KFold,
}

/// Results of k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// R² of each fold's model on its own training rows.
    pub fold_train_scores: Vec<f64>,
    /// R² of each fold's model on its held-out fold.
    pub fold_test_scores: Vec<f64>,
    /// Mean train R² across folds.
    pub mean_train_score: f64,
    /// Population standard deviation of the train R².
    pub std_train_score: f64,
    /// Mean test R² across folds.
    pub mean_test_score: f64,
    /// Population standard deviation of the test R².
    pub std_test_score: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
    /// Number of features.
    pub n_features: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        Ok(Self {
            kfold: KFold::new(n_folds)?,
        })
    }

    /// Run k-fold cross-validation.
    ///
    /// Folds are contiguous row ranges in input order; shuffle the rows
    /// beforehand (see [`train_test_split`]) if they are ordered. Each fold
    /// trains a fresh forest on the remaining rows, with the seed offset by
    /// the fold number, and scores it on both its training rows and the
    /// held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero samples |
    /// | [`RfError::TargetCountMismatch`] | `targets.len() != features.len()` |
    /// | [`RfError::TooFewSamples`] | Fewer samples than folds |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.kfold.n_folds(), n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if targets.len() != features.len() {
            return Err(RfError::TargetCountMismatch {
                samples: features.len(),
                targets: targets.len(),
            });
        }

        let n_samples = features.len();
        let n_features = features[0].len();
        let n_folds = self.kfold.n_folds();
        let folds = self.kfold.split(n_samples)?;

        let mut fold_train_scores = Vec::with_capacity(n_folds);
        let mut fold_test_scores = Vec::with_capacity(n_folds);

        for (fold, test_range) in folds.into_iter().enumerate() {
            let mut train_features = Vec::with_capacity(n_samples - test_range.len());
            train_features.extend_from_slice(&features[..test_range.start]);
            train_features.extend_from_slice(&features[test_range.end..]);
            let mut train_targets = Vec::with_capacity(n_samples - test_range.len());
            train_targets.extend_from_slice(&targets[..test_range.start]);
            train_targets.extend_from_slice(&targets[test_range.end..]);

            let test_features = &features[test_range.clone()];
            let test_targets = &targets[test_range];

            // Each fold trains with different randomness.
            let fold_config = config
                .clone()
                .with_seed(config.seed.wrapping_add(fold as u64));
            let result = fold_config.fit(&train_features, &train_targets, feature_names)?;
            let forest = result.forest();

            let train_score = r2_score(&train_targets, &forest.predict_batch(&train_features)?)?;
            let test_score = r2_score(test_targets, &forest.predict_batch(test_features)?)?;
            fold_train_scores.push(train_score);
            fold_test_scores.push(test_score);

            info!(fold, train_r2 = train_score, test_r2 = test_score, "fold completed");
        }

        let (mean_train_score, std_train_score) = mean_and_std(&fold_train_scores);
        let (mean_test_score, std_test_score) = mean_and_std(&fold_test_scores);

        info!(
            mean_train_score,
            std_train_score,
            mean_test_score,
            std_test_score,
            "cross-validation complete"
        );

        Ok(CrossValidationResult {
            fold_train_scores,
            fold_test_scores,
            mean_train_score,
            std_train_score,
            mean_test_score,
            std_test_score,
            n_folds,
            n_samples,
            n_features,
        })
    }
}
