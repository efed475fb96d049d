//! Random-forest time-to-failure pipeline over precomputed seismic segment
//! statistics.
//!
//! [`run`] chains the stages: load the labeled statistics, cross-validate on
//! a random split of the leading training block, audit feature importances,
//! score the trailing holdout block, then refit on every row and write the
//! submission. Each stage is also callable on its own.

mod config;
mod pipeline;

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use seismo_io::{OutputWriter, Reporter};

pub use config::{PipelineConfig, resolve_seed};
pub use pipeline::{
    CvReport, FeatureAudit, HoldoutReport, SubmissionReport, audit_features, cross_validate,
    evaluate_holdout, load_dataset, produce_submission,
};

/// Everything a run reports.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Seed used for the split and every forest.
    pub seed: u64,
    /// Labeled rows loaded.
    pub n_rows: usize,
    /// Rows in the training block.
    pub n_training: usize,
    /// Rows in the holdout block.
    pub n_holdout: usize,
    /// Cross-validation scores.
    pub cross_validation: CvReport,
    /// Training-block importances, least important first.
    pub feature_importances: Vec<ImportanceEntry>,
    /// Holdout scores of the training-block model.
    pub holdout: HoldoutReport,
    /// Final model outputs.
    pub submission: SubmissionReport,
    /// Prediction plot, if one was requested.
    pub plot_path: Option<PathBuf>,
}

/// One feature's share of the total impurity decrease.
#[derive(Debug, Clone, Serialize)]
pub struct ImportanceEntry {
    /// Feature column name.
    pub name: String,
    /// Normalized importance.
    pub importance: f64,
    /// 1-based rank, 1 = most important.
    pub rank: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "length data {}", self.n_rows)?;
        writeln!(f, "Samples {}", self.n_training)?;
        write!(f, "{}", self.cross_validation)?;
        writeln!(f, "----------------------Feature importance--------------")?;
        for entry in &self.feature_importances {
            writeln!(f, " {}     {:.9} ", entry.name, entry.importance)?;
        }
        write!(f, "{}", self.holdout)?;
        writeln!(f, "-----------------  finished --------------------")
    }
}

/// Run every stage in order.
///
/// `plot_path` is recorded in the summary as the location `reporter` draws
/// to; pass `None` with a [`NullReporter`](seismo_io::NullReporter).
///
/// # Errors
///
/// The first stage failure, with context naming the stage.
#[instrument(skip_all, fields(seed = config.seed, train_rows = config.train_rows))]
pub fn run(
    config: &PipelineConfig,
    reporter: &dyn Reporter,
    plot_path: Option<PathBuf>,
) -> Result<RunSummary> {
    let writer = OutputWriter::new(&config.output_dir)?;
    let dataset = load_dataset(config)?;
    let split = dataset
        .split_positional(config.train_rows)
        .context("failed to split the dataset into training and holdout blocks")?;
    let training = split.training();
    let holdout = split.holdout();
    info!(
        n_training = training.len(),
        n_holdout = holdout.len(),
        "dataset split by position"
    );

    let cross_validation = cross_validate(config, training, dataset.feature_names())?;
    let audit = audit_features(config, training, dataset.feature_names())?;
    let holdout_report = evaluate_holdout(audit.forest(), holdout, &dataset, reporter)?;

    let submission = produce_submission(config, &dataset, &writer, reporter)?;

    let feature_importances = audit
        .ascending()
        .into_iter()
        .map(|f| ImportanceEntry {
            name: f.name.clone(),
            importance: f.importance,
            rank: f.rank,
        })
        .collect();

    info!("run complete");
    Ok(RunSummary {
        seed: config.seed,
        n_rows: dataset.n_rows(),
        n_training: training.len(),
        n_holdout: holdout.len(),
        cross_validation,
        feature_importances,
        holdout: holdout_report,
        submission,
        plot_path,
    })
}
