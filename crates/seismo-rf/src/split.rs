use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Squared error: the variance of the targets in a node, `Σ(y_i - ȳ)² / n`.
    SquaredError,
}

impl SplitCriterion {
    /// Compute the impurity of a node from the running sums of its targets.
    ///
    /// `sum` is `Σy_i` and `sum_sq` is `Σy_i²` over the `n_samples` targets in
    /// the node. Returns [`Impurity::new(0.0)`] when `n_samples` is zero.
    /// Rounding can push the one-pass variance slightly below zero; it is
    /// clamped at zero.
    #[must_use]
    pub fn impurity(&self, sum: f64, sum_sq: f64, n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::SquaredError => {
                let mean = sum / n;
                (sum_sq / n - mean * mean).max(0.0)
            }
        };
        Impurity::new(value)
    }

    /// Weighted impurity decrease of splitting a node into `left` and `right`.
    ///
    /// Equals `n·I(parent) − n_l·I(left) − n_r·I(right)`. For squared error the
    /// `Σy²` terms cancel, leaving `S_l²/n_l + S_r²/n_r − S²/n`, which avoids
    /// the cancellation error of subtracting three variances.
    fn weighted_decrease(
        &self,
        left_sum: f64,
        n_left: usize,
        right_sum: f64,
        n_right: usize,
    ) -> f64 {
        match self {
            SplitCriterion::SquaredError => {
                let total = left_sum + right_sum;
                let n = (n_left + n_right) as f64;
                left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                    - total * total / n
            }
        }
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Weighted impurity decrease from this split (MDI formula).
    pub(crate) impurity_decrease: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the
/// `(value, sample)` pairs, scans left-to-right with incremental target
/// sums, and tracks the globally best split by weighted impurity decrease.
/// When none of the sampled features admits a split, further features are
/// drawn one at a time until one does.
///
/// Returns `None` when no feature at all admits a valid split (every feature
/// constant over the node, or every boundary would violate
/// `min_samples_leaf`).
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    targets: &[f64],
    sample_indices: &[usize],
    criterion: &SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();

    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let parent_sum: f64 = sample_indices.iter().map(|&si| targets[si]).sum();

    // Lazy Fisher-Yates: each position is drawn only when it is visited.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.clamp(1, n_features);

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for i in 0..n_features {
        // Past the sampled features, keep drawing only until a split exists.
        if i >= take && best.is_some() {
            break;
        }
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
        let feat_idx = feature_order[i];
        let feat_col = &features[feat_idx];

        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0f64;

        for k in 0..(n_samples - 1) {
            let (val_i, si) = sorted[k];
            left_sum += targets[si];

            let n_left = k + 1;
            let n_right = n_samples - n_left;

            // No boundary between identical values.
            let val_next = sorted[k + 1].0;
            if val_i == val_next {
                continue;
            }

            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease =
                criterion.weighted_decrease(left_sum, n_left, parent_sum - left_sum, n_right);

            if decrease > best_decrease {
                best_decrease = decrease;
                let mut threshold = (val_i + val_next) / 2.0;
                // Midpoint of adjacent floats can round up onto the right value.
                if threshold == val_next {
                    threshold = val_i;
                }
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (best_feature, threshold) = best?;

    let feat_col = &features[best_feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .copied()
        .partition(|&si| feat_col[si] <= threshold);

    Some(SplitResult {
        feature: best_feature,
        threshold,
        impurity_decrease: best_decrease.max(0.0),
        left_indices,
        right_indices,
    })
}
