//! Prediction and submission writers.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::SegmentId;

/// File name of the in-sample prediction dump.
const TRAIN_PREDICTIONS_FILE: &str = "rf_train_predictions.csv";
/// File name of the competition submission.
const SUBMISSION_FILE: &str = "rf_submission.csv";
/// File name of the predicted-vs-actual plot.
const PLOT_FILE: &str = "predictions.png";

/// Writes pipeline outputs into a single directory.
///
/// Creates the output directory on construction if it does not exist.
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    /// Create a new writer targeting the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display()))]
    pub fn new(output_dir: &Path) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Path of `rf_train_predictions.csv`.
    #[must_use]
    pub fn train_predictions_path(&self) -> PathBuf {
        self.output_dir.join(TRAIN_PREDICTIONS_FILE)
    }

    /// Path of `rf_submission.csv`.
    #[must_use]
    pub fn submission_path(&self) -> PathBuf {
        self.output_dir.join(SUBMISSION_FILE)
    }

    /// Path of `predictions.png`. Nothing is written here by this type.
    #[must_use]
    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(PLOT_FILE)
    }

    /// Write one prediction per line to `rf_train_predictions.csv`.
    ///
    /// No header and no index; values use [`format_scientific`].
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n = predictions.len()))]
    pub fn write_train_predictions(&self, predictions: &[f64]) -> Result<PathBuf, IoError> {
        let path = self.train_predictions_path();
        let write_err = |source: csv::Error| IoError::WriteFile {
            path: path.clone(),
            source,
        };

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(write_err)?;
        for &value in predictions {
            wtr.write_record([format_scientific(value)])
                .map_err(write_err)?;
        }
        wtr.flush().map_err(|e| write_err(e.into()))?;

        info!(path = %path.display(), "train predictions written");
        Ok(path)
    }

    /// Write `seg_id,time_to_failure` rows to `rf_submission.csv`.
    ///
    /// Rows follow the order of `seg_ids`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LengthMismatch`] | `predictions.len() != seg_ids.len()` |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(n = seg_ids.len()))]
    pub fn write_submission(
        &self,
        seg_ids: &[SegmentId],
        predictions: &[f64],
    ) -> Result<PathBuf, IoError> {
        if seg_ids.len() != predictions.len() {
            return Err(IoError::LengthMismatch {
                expected: seg_ids.len(),
                got: predictions.len(),
            });
        }

        let path = self.submission_path();
        let write_err = |source: csv::Error| IoError::WriteFile {
            path: path.clone(),
            source,
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(write_err)?;
        for (seg_id, &time_to_failure) in seg_ids.iter().zip(predictions) {
            wtr.serialize(SubmissionRow {
                seg_id: seg_id.as_str(),
                time_to_failure,
            })
            .map_err(write_err)?;
        }
        wtr.flush().map_err(|e| write_err(e.into()))?;

        info!(path = %path.display(), "submission written");
        Ok(path)
    }
}

/// Format a float as `d.dddddddddddddddddde±XX`.
///
/// Eighteen mantissa digits and an exponent of at least two digits with an
/// explicit sign, the layout `numpy.savetxt` writes by default.
#[must_use]
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{value:.18e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

// --- Shadow struct for CSV serialization ---

#[derive(Serialize)]
struct SubmissionRow<'a> {
    seg_id: &'a str,
    time_to_failure: f64,
}
