//! The five pipeline stages and their reports.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use seismo_io::{Block, OutputWriter, Reporter, StatsDataset, StatsReader, TestReader};
use seismo_rf::{
    CrossValidation, OobMode, RandomForest, RankedFeature, mean_absolute_error, train_test_split,
};

use crate::config::PipelineConfig;

/// Mean and spread of the per-fold R² scores.
#[derive(Debug, Clone, Serialize)]
pub struct CvReport {
    /// Rows in the cross-validated part of the training block.
    pub n_train: usize,
    /// Rows withheld by the random split and never scored.
    pub n_test: usize,
    /// Number of folds.
    pub n_folds: usize,
    /// Train R² per fold.
    pub fold_train_scores: Vec<f64>,
    /// Test R² per fold.
    pub fold_test_scores: Vec<f64>,
    /// Mean train R².
    pub mean_train_score: f64,
    /// Population standard deviation of the train R².
    pub std_train_score: f64,
    /// Mean test R².
    pub mean_test_score: f64,
    /// Population standard deviation of the test R².
    pub std_test_score: f64,
}

impl fmt::Display for CvReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------------cv_results--------------------------")?;
        writeln!(
            f,
            "Train: {:.6}, std {:.6}",
            self.mean_train_score * 100.0,
            self.std_train_score
        )?;
        writeln!(
            f,
            "Test: {:.6} std {:.6}",
            self.mean_test_score * 100.0,
            self.std_test_score
        )
    }
}

/// The training-block model and its ranked feature importances.
#[derive(Debug)]
pub struct FeatureAudit {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
}

impl FeatureAudit {
    /// Borrow the model fitted on the training block.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Importances, most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// Importances, least important first. Ties keep feature order.
    #[must_use]
    pub fn ascending(&self) -> Vec<&RankedFeature> {
        let mut ascending: Vec<&RankedFeature> = self.importances.iter().collect();
        ascending.sort_by(|a, b| a.importance.total_cmp(&b.importance));
        ascending
    }
}

/// Error and value ranges of the training-block model on the holdout block.
#[derive(Debug, Clone, Serialize)]
pub struct HoldoutReport {
    /// Rows in the holdout block.
    pub n_rows: usize,
    /// Mean absolute error.
    pub mae: f64,
    /// Largest actual target.
    pub actual_max: f64,
    /// Smallest actual target.
    pub actual_min: f64,
    /// Largest prediction.
    pub predicted_max: f64,
    /// Smallest prediction.
    pub predicted_min: f64,
}

impl fmt::Display for HoldoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(73);
        writeln!(f, "{rule}")?;
        writeln!(f, "mae error on hold out data {}", self.mae)?;
        writeln!(f, "actual max/min {} {}", self.actual_max, self.actual_min)?;
        writeln!(f, "predicted max/min {} {}", self.predicted_max, self.predicted_min)?;
        writeln!(f, "{rule}")
    }
}

/// Outputs of the final full-data model.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    /// Rows the final model was fitted on.
    pub n_fit_rows: usize,
    /// Rows written to the submission file.
    pub n_submission_rows: usize,
    /// Out-of-bag R² of the final model, when requested.
    pub oob_r2: Option<f64>,
    /// In-sample prediction dump.
    pub train_predictions_path: PathBuf,
    /// Submission file.
    pub submission_path: PathBuf,
}

/// Read the labeled statistics file.
///
/// # Errors
///
/// Any reader error, with the path as context.
pub fn load_dataset(config: &PipelineConfig) -> Result<StatsDataset> {
    StatsReader::new(&config.data_path)
        .read()
        .with_context(|| format!("failed to read {}", config.data_path.display()))
}

/// Randomly withhold part of the training block, then k-fold cross-validate
/// a fresh forest on the remainder.
///
/// # Errors
///
/// Invalid split fraction or fold count, too few rows, or a training failure.
#[instrument(skip_all, fields(n_rows = training.len(), n_folds = config.cv_folds))]
pub fn cross_validate(
    config: &PipelineConfig,
    training: Block<'_>,
    feature_names: &[String],
) -> Result<CvReport> {
    let split = train_test_split(training.len(), config.test_fraction, config.seed)
        .context("failed to split the training block")?;
    let (x_train, y_train) = split.train_rows(training.features(), training.targets());
    info!(
        n_train = x_train.len(),
        n_test = split.test_indices().len(),
        "training block split"
    );

    let forest_config = config.forest_config()?;
    let result = CrossValidation::new(config.cv_folds)?
        .evaluate(&forest_config, &x_train, &y_train, feature_names)
        .context("cross-validation failed")?;

    Ok(CvReport {
        n_train: x_train.len(),
        n_test: split.test_indices().len(),
        n_folds: result.n_folds,
        fold_train_scores: result.fold_train_scores,
        fold_test_scores: result.fold_test_scores,
        mean_train_score: result.mean_train_score,
        std_train_score: result.std_train_score,
        mean_test_score: result.mean_test_score,
        std_test_score: result.std_test_score,
    })
}

/// Fit a forest on the whole training block and rank its features.
///
/// # Errors
///
/// Any training failure.
#[instrument(skip_all, fields(n_rows = training.len()))]
pub fn audit_features(
    config: &PipelineConfig,
    training: Block<'_>,
    feature_names: &[String],
) -> Result<FeatureAudit> {
    let result = config
        .forest_config()?
        .fit(training.features(), training.targets(), feature_names)
        .context("failed to fit the training-block model")?;
    let importances = result.importances().to_vec();
    info!(top = %importances.first().map_or("", |f| f.name.as_str()), "feature audit complete");
    Ok(FeatureAudit {
        forest: result.into_forest(),
        importances,
    })
}

/// Score `forest` on the holdout block, then plot its predictions over every
/// row of `dataset`.
///
/// # Errors
///
/// Empty holdout, prediction failure, or a reporter failure.
#[instrument(skip_all, fields(n_holdout = holdout.len()))]
pub fn evaluate_holdout(
    forest: &RandomForest,
    holdout: Block<'_>,
    dataset: &StatsDataset,
    reporter: &dyn Reporter,
) -> Result<HoldoutReport> {
    let predicted = forest.predict_batch(holdout.features())?;
    let mae = mean_absolute_error(holdout.targets(), &predicted)
        .context("failed to score the holdout block")?;
    let (actual_min, actual_max) = min_max(holdout.targets());
    let (predicted_min, predicted_max) = min_max(&predicted);
    info!(mae, "holdout evaluated");

    let all_predicted = forest.predict_batch(dataset.features())?;
    reporter
        .plot_predictions(&all_predicted, dataset.targets())
        .context("failed to plot holdout-model predictions")?;

    Ok(HoldoutReport {
        n_rows: holdout.len(),
        mae,
        actual_max,
        actual_min,
        predicted_max,
        predicted_min,
    })
}

/// Fit a forest on every labeled row, dump its in-sample predictions, re-plot,
/// and write predictions for the test file.
///
/// # Errors
///
/// Training failure, unreadable test file, or any write/plot failure.
#[instrument(skip_all, fields(n_rows = dataset.n_rows()))]
pub fn produce_submission(
    config: &PipelineConfig,
    dataset: &StatsDataset,
    writer: &OutputWriter,
    reporter: &dyn Reporter,
) -> Result<SubmissionReport> {
    let oob_mode = if config.oob {
        OobMode::Enabled
    } else {
        OobMode::Disabled
    };
    let result = config
        .forest_config()?
        .with_oob_mode(oob_mode)
        .fit(dataset.features(), dataset.targets(), dataset.feature_names())
        .context("failed to fit the full-data model")?;
    let oob_r2 = result.oob_score().map(|s| s.r2);
    let forest = result.into_forest();

    let in_sample = forest.predict_batch(dataset.features())?;
    let train_predictions_path = writer.write_train_predictions(&in_sample)?;
    reporter
        .plot_predictions(&in_sample, dataset.targets())
        .context("failed to plot full-data predictions")?;

    let test = TestReader::new(&config.test_path)
        .read()
        .with_context(|| format!("failed to read {}", config.test_path.display()))?;
    let predictions = forest.predict_batch(test.features())?;
    let submission_path = writer.write_submission(test.seg_ids(), &predictions)?;

    Ok(SubmissionReport {
        n_fit_rows: dataset.n_rows(),
        n_submission_rows: test.n_rows(),
        oob_r2,
        train_predictions_path,
        submission_path,
    })
}

/// `(min, max)` of a non-empty slice; `(NaN, NaN)` when empty.
fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
