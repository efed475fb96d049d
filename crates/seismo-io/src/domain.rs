//! Domain types for seismo-io.

use crate::IoError;

/// Feature columns selected from the statistics files, in model order.
pub const FEATURE_COLUMNS: [&str; 7] = [
    "gt_2std",
    "gt_3std",
    "power1",
    "power2",
    "power3",
    "power4",
    "median_dev_abs",
];

/// Target column of the training statistics file.
pub const TARGET_COLUMN: &str = "time_to_failure";

/// Segment identifier column of the test statistics file.
pub const SEG_ID_COLUMN: &str = "seg_id";

/// A test segment identifier, copied verbatim from the `seg_id` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    /// Return the segment ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Labeled segment statistics: one feature row and one target per segment.
///
/// Produced by [`StatsReader`](crate::StatsReader). All vectors are parallel
/// and keep the file's row order. Never mutated after load.
#[derive(Debug)]
pub struct StatsDataset {
    index: Vec<i64>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl StatsDataset {
    pub(crate) fn new(
        index: Vec<i64>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> Self {
        Self {
            index,
            feature_names,
            features,
            targets,
        }
    }

    /// Return the integer index column.
    #[must_use]
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Return the selected feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Return the target values.
    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    /// Split by position: rows `0..train_rows` train, the rest are held out.
    ///
    /// Assumes rows are stored in segment order; no shuffling happens here.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InsufficientRows`] unless the dataset has more than
    /// `train_rows` rows.
    pub fn split_positional(&self, train_rows: usize) -> Result<PositionalSplit<'_>, IoError> {
        if self.n_rows() <= train_rows {
            return Err(IoError::InsufficientRows {
                n_rows: self.n_rows(),
                train_rows,
            });
        }
        let (train_features, holdout_features) = self.features.split_at(train_rows);
        let (train_targets, holdout_targets) = self.targets.split_at(train_rows);
        Ok(PositionalSplit {
            training: Block {
                features: train_features,
                targets: train_targets,
            },
            holdout: Block {
                features: holdout_features,
                targets: holdout_targets,
            },
        })
    }
}

/// A borrowed, contiguous run of rows of a [`StatsDataset`].
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
}

impl<'a> Block<'a> {
    /// Return the feature rows.
    #[must_use]
    pub fn features(&self) -> &'a [Vec<f64>] {
        self.features
    }

    /// Return the targets.
    #[must_use]
    pub fn targets(&self) -> &'a [f64] {
        self.targets
    }

    /// Return the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Return `true` if the block has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Training and holdout blocks produced by [`StatsDataset::split_positional`].
#[derive(Debug, Clone, Copy)]
pub struct PositionalSplit<'a> {
    training: Block<'a>,
    holdout: Block<'a>,
}

impl<'a> PositionalSplit<'a> {
    /// Return the leading training block.
    #[must_use]
    pub fn training(&self) -> Block<'a> {
        self.training
    }

    /// Return the trailing holdout block.
    #[must_use]
    pub fn holdout(&self) -> Block<'a> {
        self.holdout
    }
}

/// Unlabeled segment statistics to predict.
///
/// Produced by [`TestReader`](crate::TestReader). `seg_ids[i]` corresponds
/// to `features[i]`, in file order.
#[derive(Debug)]
pub struct TestDataset {
    seg_ids: Vec<SegmentId>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
}

impl TestDataset {
    pub(crate) fn new(
        seg_ids: Vec<SegmentId>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            seg_ids,
            feature_names,
            features,
        }
    }

    /// Return the segment IDs.
    #[must_use]
    pub fn seg_ids(&self) -> &[SegmentId] {
        &self.seg_ids
    }

    /// Return the selected feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.seg_ids.len()
    }
}
