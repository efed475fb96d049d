//! Out-of-bag (OOB) evaluation for Random Forest regression.

use crate::error::RfError;
use crate::metrics::{mean_squared_error, r2_score};
use crate::tree::DecisionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// R² of the OOB predictions against the training targets.
    pub r2: f64,
    /// Mean squared error of the OOB predictions.
    pub mse: f64,
    /// Number of samples that had at least one OOB tree.
    pub n_oob_samples: usize,
}

/// Compute out-of-bag predictions and their R².
///
/// For each sample, only trees where the sample was NOT in the bootstrap
/// contribute, and their outputs are averaged. Samples with no OOB tree
/// are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    targets: &[f64],
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let n_samples = features.len();

    let mut sums = vec![0.0f64; n_samples];
    let mut counts = vec![0usize; n_samples];

    for (tree, oob_indices) in trees.iter().zip(oob_indices_per_tree) {
        for &sample_idx in oob_indices {
            sums[sample_idx] += tree.predict(&features[sample_idx])?;
            counts[sample_idx] += 1;
        }
    }

    let (actual, predicted): (Vec<f64>, Vec<f64>) = (0..n_samples)
        .filter(|&i| counts[i] > 0)
        .map(|i| (targets[i], sums[i] / counts[i] as f64))
        .unzip();

    if actual.is_empty() {
        return Err(RfError::OobEvaluationFailed {
            reason: "no sample has any OOB tree".to_string(),
        });
    }

    Ok(OobScore {
        r2: r2_score(&actual, &predicted)?,
        mse: mean_squared_error(&actual, &predicted)?,
        n_oob_samples: actual.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::compute_oob;
    use crate::RfError;
    use crate::tree::DecisionTreeConfig;

    #[test]
    fn no_oob_samples_is_an_error() {
        let features = vec![vec![1.0], vec![2.0]];
        let targets = vec![0.0, 1.0];
        let tree = DecisionTreeConfig::new().fit(&features, &targets).unwrap();
        let err = compute_oob(&[tree], &features, &targets, &[vec![]]).unwrap_err();
        assert!(matches!(err, RfError::OobEvaluationFailed { .. }));
    }

    #[test]
    fn only_oob_trees_vote() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let targets = vec![1.0, 2.0, 3.0];
        let tree = DecisionTreeConfig::new().fit(&features, &targets).unwrap();
        // A fully grown tree reproduces its training targets, so OOB R² is 1.
        let score =
            compute_oob(&[tree], &features, &targets, &[vec![0, 2]]).unwrap();
        assert_eq!(score.n_oob_samples, 2);
        assert_eq!(score.r2, 1.0);
        assert_eq!(score.mse, 0.0);
    }
}
