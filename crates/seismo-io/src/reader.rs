//! CSV readers for segment statistics with full input validation.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{FEATURE_COLUMNS, SEG_ID_COLUMN, SegmentId, StatsDataset, TARGET_COLUMN, TestDataset};

/// Reads labeled segment statistics from a CSV file.
///
/// Expected CSV format:
/// - Header row required; the first column is an integer row index whose
///   header may be empty
/// - The feature columns and `time_to_failure` are located by name, in any
///   order; other columns are ignored
/// - All rows must have the same number of columns as the header
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | A feature column or the target is absent |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidIndex`] | First cell is not an integer |
/// | [`IoError::NonFiniteValue`] | Selected cell is NaN, Inf, or unparseable float |
pub struct StatsReader {
    path: PathBuf,
    feature_columns: Vec<String>,
}

impl StatsReader {
    /// Create a reader selecting [`FEATURE_COLUMNS`].
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Select a different set of feature columns, in model order.
    #[must_use]
    pub fn with_feature_columns(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`StatsDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<StatsDataset, IoError> {
        let (mut rdr, header) = open_table(&self.path)?;
        let feature_pos = locate_all(&header, &self.feature_columns, &self.path)?;
        let target_pos = locate(&header, TARGET_COLUMN, &self.path)?;

        let mut index = Vec::new();
        let mut features = Vec::new();
        let mut targets = Vec::new();

        for_each_row(&mut rdr, header.len(), &self.path, |row_index, record| {
            index.push(parse_index(record, row_index, &self.path)?);
            features.push(parse_row(
                record,
                &feature_pos,
                &self.feature_columns,
                row_index,
                &self.path,
            )?);
            targets.push(parse_value(
                record,
                target_pos,
                TARGET_COLUMN,
                row_index,
                &self.path,
            )?);
            Ok(())
        })?;

        info!(
            n_rows = features.len(),
            n_features = self.feature_columns.len(),
            "stats dataset loaded"
        );

        Ok(StatsDataset::new(
            index,
            self.feature_columns.clone(),
            features,
            targets,
        ))
    }
}

/// Reads unlabeled test segment statistics from a CSV file.
///
/// Same layout as [`StatsReader`], with a `seg_id` column instead of the
/// target. Segment IDs are kept verbatim and in file order.
///
/// # Errors
///
/// Same conditions as [`StatsReader`], with [`IoError::MissingColumn`] also
/// covering an absent `seg_id` column.
pub struct TestReader {
    path: PathBuf,
    feature_columns: Vec<String>,
}

impl TestReader {
    /// Create a reader selecting [`FEATURE_COLUMNS`].
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Select a different set of feature columns, in model order.
    #[must_use]
    pub fn with_feature_columns(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`TestDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TestDataset, IoError> {
        let (mut rdr, header) = open_table(&self.path)?;
        let feature_pos = locate_all(&header, &self.feature_columns, &self.path)?;
        let seg_pos = locate(&header, SEG_ID_COLUMN, &self.path)?;

        let mut seg_ids = Vec::new();
        let mut features = Vec::new();

        for_each_row(&mut rdr, header.len(), &self.path, |row_index, record| {
            parse_index(record, row_index, &self.path)?;
            seg_ids.push(SegmentId::new(record.get(seg_pos).unwrap_or("").to_string()));
            features.push(parse_row(
                record,
                &feature_pos,
                &self.feature_columns,
                row_index,
                &self.path,
            )?);
            Ok(())
        })?;

        info!(n_rows = seg_ids.len(), "test dataset loaded");

        Ok(TestDataset::new(
            seg_ids,
            self.feature_columns.clone(),
            features,
        ))
    }
}

fn csv_parse_error(path: &Path, e: csv::Error) -> IoError {
    IoError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    }
}

fn open_table(path: &Path) -> Result<(csv::Reader<File>, StringRecord), IoError> {
    let file = File::open(path).map_err(|e| IoError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;

    // flexible(true) so that ragged rows surface as InconsistentRowLength.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let header = rdr.headers().map_err(|e| csv_parse_error(path, e))?.clone();
    debug!(n_columns = header.len(), "read CSV header");
    Ok((rdr, header))
}

/// Position of a named column. Column 0 is the index and never matches.
fn locate(header: &StringRecord, name: &str, path: &Path) -> Result<usize, IoError> {
    header
        .iter()
        .skip(1)
        .position(|h| h.trim() == name)
        .map(|p| p + 1)
        .ok_or_else(|| IoError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

fn locate_all(header: &StringRecord, names: &[String], path: &Path) -> Result<Vec<usize>, IoError> {
    names.iter().map(|n| locate(header, n, path)).collect()
}

/// Validate every record's width and hand it to `on_row`.
fn for_each_row(
    rdr: &mut csv::Reader<File>,
    expected: usize,
    path: &Path,
    mut on_row: impl FnMut(usize, &StringRecord) -> Result<(), IoError>,
) -> Result<(), IoError> {
    let mut n_rows = 0;
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_parse_error(path, e))?;
        if record.len() != expected {
            return Err(IoError::InconsistentRowLength {
                path: path.to_path_buf(),
                row_index,
                expected,
                got: record.len(),
            });
        }
        on_row(row_index, &record)?;
        n_rows += 1;
    }
    if n_rows == 0 {
        return Err(IoError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn parse_index(record: &StringRecord, row_index: usize, path: &Path) -> Result<i64, IoError> {
    let raw = record.get(0).unwrap_or("");
    raw.trim().parse().map_err(|_| IoError::InvalidIndex {
        path: path.to_path_buf(),
        row_index,
        raw: raw.to_string(),
    })
}

fn parse_value(
    record: &StringRecord,
    col: usize,
    name: &str,
    row_index: usize,
    path: &Path,
) -> Result<f64, IoError> {
    let raw = record.get(col).unwrap_or("");
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(IoError::NonFiniteValue {
            path: path.to_path_buf(),
            row_index,
            column: name.to_string(),
            raw: raw.to_string(),
        }),
    }
}

fn parse_row(
    record: &StringRecord,
    positions: &[usize],
    names: &[String],
    row_index: usize,
    path: &Path,
) -> Result<Vec<f64>, IoError> {
    positions
        .iter()
        .zip(names)
        .map(|(&col, name)| parse_value(record, col, name, row_index, path))
        .collect()
}
