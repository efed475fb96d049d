use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    node::{Node, NodeIndex},
    split::{SplitCriterion, find_best_split},
};

/// Configuration for a single CART regression tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `SquaredError`        |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::SquaredError,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until all leaves are pure or stopping conditions
    /// are met. `Some(d)` limits depth to `d` levels (root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the maximum number of features to consider at each split.
    ///
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train a regression tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `targets[sample_idx]`: continuous response.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                            |
    /// |--------------------------------------|-------------------------------------------------|
    /// | [`RfError::EmptyDataset`]            | `features` is empty                             |
    /// | [`RfError::ZeroFeatures`]            | rows have zero feature columns                  |
    /// | [`RfError::TargetCountMismatch`]     | `targets.len() != features.len()`               |
    /// | [`RfError::FeatureCountMismatch`]    | rows have inconsistent lengths                  |
    /// | [`RfError::NonFiniteValue`]          | any feature value is NaN or infinite            |
    /// | [`RfError::NonFiniteTarget`]         | any target is NaN or infinite                   |
    /// | [`RfError::InvalidMaxFeatures`]      | `max_features` outside [1, n_features]          |
    /// | [`RfError::InvalidMaxDepth`]         | `max_depth` is `Some(0)`                        |
    /// | [`RfError::InvalidMinSamplesSplit`]  | `min_samples_split` < 2                         |
    /// | [`RfError::InvalidMinSamplesLeaf`]   | `min_samples_leaf` < 1                          |
    #[instrument(skip(self, features, targets), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<DecisionTree, RfError> {
        let n_features = validate_training_data(features, targets)?;
        self.validate(n_features)?;
        let max_features = self.max_features.unwrap_or(n_features);

        debug!(
            n_samples = features.len(),
            n_features,
            max_features,
            "fitting regression tree"
        );

        // Column-major layout for the split scan.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..features.len()).collect();
        let tree = self.build(&col_features, targets, &sample_indices, max_features);

        debug!(
            n_nodes = tree.nodes.len(),
            depth = tree.depth(),
            "regression tree built"
        );

        Ok(tree)
    }

    /// Check the tree hyperparameters against the feature count.
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }

        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }

        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(())
    }

    /// Grow a tree on pre-validated column-major data.
    ///
    /// `sample_indices` may contain repeats (bootstrap draws); each repeat
    /// counts as a separate sample.
    pub(crate) fn build(
        &self,
        col_features: &[Vec<f64>],
        targets: &[f64],
        sample_indices: &[usize],
        max_features: usize,
    ) -> DecisionTree {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();

        build_tree(
            col_features,
            targets,
            sample_indices,
            self,
            0,
            &mut rng,
            &mut arena,
            max_features,
        );

        DecisionTree {
            nodes: arena,
            n_features: col_features.len(),
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a row-major training set and return its feature count.
pub(crate) fn validate_training_data(
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<usize, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if targets.len() != features.len() {
        return Err(RfError::TargetCountMismatch {
            samples: features.len(),
            targets: targets.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    if let Some(sample_index) = targets.iter().position(|v| !v.is_finite()) {
        return Err(RfError::NonFiniteTarget { sample_index });
    }
    Ok(n_features)
}

/// Recursively build the arena-based regression tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
#[allow(clippy::too_many_arguments)]
fn build_tree(
    col_features: &[Vec<f64>],
    targets: &[f64],
    sample_indices: &[usize],
    config: &DecisionTreeConfig,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
    max_features: usize,
) -> NodeIndex {
    let n_samples = sample_indices.len();

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &si in sample_indices {
        let y = targets[si];
        sum += y;
        sum_sq += y * y;
        min = min.min(y);
        max = max.max(y);
    }
    let impurity = config.criterion.impurity(sum, sum_sq, n_samples);
    let value = sum / n_samples as f64;

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let idx = arena.len();
        arena.push(Node::Leaf {
            value,
            impurity,
            n_samples,
        });
        NodeIndex::new(idx)
    };

    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    let too_few = n_samples < config.min_samples_split;
    // Exact comparison: the one-pass variance is not reliably zero.
    let pure = min == max;

    if too_few || pure || depth_exceeded {
        return make_leaf(arena);
    }

    let Some(split) = find_best_split(
        col_features,
        targets,
        sample_indices,
        &config.criterion,
        max_features,
        config.min_samples_leaf,
        rng,
    ) else {
        return make_leaf(arena);
    };

    // Arena pattern: reserve index, recurse, then overwrite with the split.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        value,
        impurity,
        n_samples,
    });

    let left_idx = build_tree(
        col_features,
        targets,
        &split.left_indices,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    let right_idx = build_tree(
        col_features,
        targets,
        &split.right_indices,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: left_idx,
        right: right_idx,
        impurity,
        n_samples,
        impurity_decrease: split.impurity_decrease,
    };

    NodeIndex::new(node_idx)
}

/// A fitted CART regression tree.
///
/// Stored as an arena-based `Vec<Node>` with index references; the root is
/// at index 0.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Predict the target for a single sample.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<f64, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.predict_unchecked(sample))
    }

    /// Predict without checking the sample width.
    pub(crate) fn predict_unchecked(&self, sample: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Compute Mean Decrease in Impurity (MDI) feature importances.
    ///
    /// For each `Split` node, the `impurity_decrease` is accumulated by
    /// feature index, then the totals are normalized so they sum to 1.0.
    /// Returns a `Vec` of length `n_features`; all zeros when the tree is
    /// a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the arena of nodes; the root is at index 0.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        let targets = vec![1.5, 1.5, 1.5, 8.0, 8.0, 8.0];
        (features, targets)
    }

    #[test]
    fn empty_dataset_error() {
        let err = DecisionTreeConfig::new().fit(&[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn constant_targets_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let targets = vec![0.7, 0.7, 0.7];
        let tree = DecisionTreeConfig::new().fit(&features, &targets).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        // Summing three 0.7s rounds, so the leaf mean is within an ulp or two.
        let value = tree.predict(&[2.0, 3.0]).unwrap();
        assert!((value - 0.7).abs() < 1e-12, "value = {value}");
    }

    #[test]
    fn constant_columns_never_stop_growth() {
        let features: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![3.0, -2.0, f64::from(i)])
            .collect();
        let targets: Vec<f64> = (0..12).map(|i| if i < 6 { 0.0 } else { 5.0 }).collect();
        for seed in 0..100 {
            let tree = DecisionTreeConfig::new()
                .with_max_features(Some(2))
                .with_seed(seed)
                .fit(&features, &targets)
                .unwrap();
            assert!(tree.n_nodes() > 1, "seed {seed} grew a single leaf");
            assert_eq!(tree.predict(&[3.0, -2.0, 1.0]).unwrap(), 0.0);
            assert_eq!(tree.predict(&[3.0, -2.0, 10.0]).unwrap(), 5.0);
        }
    }

    #[test]
    fn learns_step_function_exactly() {
        let (features, targets) = step_data();
        let tree = DecisionTreeConfig::new()
            .with_seed(42)
            .fit(&features, &targets)
            .unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 1.5);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 8.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn leaf_predicts_mean_of_its_samples() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let targets = vec![1.0, 2.0, 3.0, 6.0];
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&features, &targets)
            .unwrap();
        // Best single split isolates x=4: left mean 2.0, right 6.0.
        assert_eq!(tree.predict(&[1.5]).unwrap(), 2.0);
        assert_eq!(tree.predict(&[4.0]).unwrap(), 6.0);
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let features = vec![
            vec![1.0, 100.0],
            vec![2.0, 300.0],
            vec![3.0, 200.0],
            vec![10.0, 100.0],
            vec![11.0, 300.0],
            vec![12.0, 200.0],
        ];
        let targets = vec![0.0, 0.5, 0.2, 4.0, 4.4, 4.1];
        let tree = DecisionTreeConfig::new().fit(&features, &targets).unwrap();
        let sum: f64 = tree.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10, "sum = {sum}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![(i * 7 % 11) as f64, (i * 3 % 5) as f64, i as f64])
            .collect();
        let targets: Vec<f64> = (0..30).map(|i| (i as f64 * 0.37).sin()).collect();
        let config = DecisionTreeConfig::new().with_max_features(Some(1)).with_seed(123);
        let tree1 = config.fit(&features, &targets).unwrap();
        let tree2 = config.fit(&features, &targets).unwrap();
        for sample in &features {
            assert_eq!(tree1.predict(sample).unwrap(), tree2.predict(sample).unwrap());
        }
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, targets) = step_data();
        let tree = DecisionTreeConfig::new().fit(&features, &targets).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RfError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let features: Vec<Vec<f64>> = (0..6).map(|i| vec![f64::from(i)]).collect();
        let targets = vec![0.0, 0.0, 0.0, 0.0, 0.0, 9.0];
        let tree = DecisionTreeConfig::new()
            .with_min_samples_leaf(3)
            .fit(&features, &targets)
            .unwrap();
        // The only admissible boundary puts three rows on each side.
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&[5.0]).unwrap(), 3.0);
    }

    #[test]
    fn invalid_min_samples_rejected() {
        let (features, targets) = step_data();
        assert!(matches!(
            DecisionTreeConfig::new()
                .with_min_samples_split(1)
                .fit(&features, &targets),
            Err(RfError::InvalidMinSamplesSplit { min_samples_split: 1 })
        ));
        assert!(matches!(
            DecisionTreeConfig::new()
                .with_min_samples_leaf(0)
                .fit(&features, &targets),
            Err(RfError::InvalidMinSamplesLeaf { min_samples_leaf: 0 })
        ));
    }

    #[test]
    fn max_depth_limits_tree() {
        let features: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..16).map(|i| (i * i) as f64).collect();
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(2))
            .fit(&features, &targets)
            .unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn target_count_mismatch_error() {
        let (features, _) = step_data();
        let err = DecisionTreeConfig::new().fit(&features, &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RfError::TargetCountMismatch { samples: 6, targets: 1 }
        ));
    }

    #[test]
    fn feature_count_mismatch_error() {
        let features = vec![vec![1.0, 2.0], vec![3.0]];
        let err = DecisionTreeConfig::new()
            .fit(&features, &[0.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, RfError::FeatureCountMismatch { .. }));
    }

    #[test]
    fn non_finite_value_error() {
        let features = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let err = DecisionTreeConfig::new()
            .fit(&features, &[0.0, 1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::NonFiniteValue { sample_index: 0, feature_index: 1 }
        ));
    }

    #[test]
    fn non_finite_target_error() {
        let features = vec![vec![1.0], vec![3.0]];
        let err = DecisionTreeConfig::new()
            .fit(&features, &[0.0, f64::INFINITY])
            .unwrap_err();
        assert!(matches!(err, RfError::NonFiniteTarget { sample_index: 1 }));
    }

    #[test]
    fn zero_max_depth_rejected() {
        let (features, targets) = step_data();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&features, &targets)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidMaxDepth { max_depth: 0 }));
    }
}
