//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{MaxFeatures, OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, validate_training_data};

/// A fitted Random Forest regression ensemble.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Resolve `MaxFeatures` to a concrete count.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_features: usize,
) -> Result<usize, RfError> {
    let resolved = match max_features {
        MaxFeatures::Fixed(n) => n,
        MaxFeatures::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(RfError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Draw `n_samples` indices with replacement; also return the indices never drawn.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    targets: &[f64],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    // --- Validate inputs ---
    let n_features = validate_training_data(features, targets)?;
    let n_samples = features.len();
    if feature_names.len() != n_features {
        return Err(RfError::LengthMismatch {
            expected: n_features,
            got: feature_names.len(),
        });
    }

    // --- Validate config ---
    let max_features_resolved = resolve_max_features(config.max_features, n_features)?;
    if config.n_jobs == Some(0) {
        return Err(RfError::InvalidJobCount { n_jobs: 0 });
    }

    let tree_template = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_max_features(Some(max_features_resolved));
    tree_template.validate(n_features)?;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features = max_features_resolved,
        max_depth = ?config.max_depth,
        n_jobs = ?config.n_jobs,
        "training random forest"
    );

    // Column-major once; every tree indexes into it with its bootstrap draw.
    let col_features: Vec<Vec<f64>> = (0..n_features)
        .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
        .collect();

    // Per-tree seeds come from the master RNG so results do not depend on
    // thread scheduling.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let grow = || -> Vec<(DecisionTree, Vec<usize>)> {
        tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let (bootstrap_indices, oob_indices) = bootstrap_sample(n_samples, &mut rng);
                let tree = tree_template.clone().with_seed(rng.r#gen()).build(
                    &col_features,
                    targets,
                    &bootstrap_indices,
                    max_features_resolved,
                );
                (tree, oob_indices)
            })
            .collect()
    };

    let tree_results = match config.n_jobs {
        Some(n_jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .build()
            .map_err(|source| RfError::ThreadPool { n_jobs, source })?
            .install(grow),
        None => grow(),
    };

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        tree_results.into_iter().unzip();

    let per_tree_importances: Vec<Vec<f64>> =
        trees.iter().map(|t| t.feature_importances()).collect();
    let importances = aggregate_importances(&per_tree_importances, feature_names);

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let oob_score = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, features, targets, &oob_indices_per_tree)?)
    } else {
        None
    };

    let forest = RandomForest {
        trees,
        n_features,
        feature_names: feature_names.to_vec(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_samples,
        max_features_resolved,
    };

    info!(
        oob_r2 = oob_score.as_ref().map(|s| s.r2),
        "random forest training complete"
    );

    Ok(RandomForestResult::new(forest, importances, oob_score, metadata))
}

#[cfg(test)]
mod tests {
    use super::resolve_max_features;
    use crate::config::{MaxFeatures, OobMode, RandomForestConfig};
    use crate::metrics::r2_score;

    /// Two-level step function over `x`, plus a noise column `y`.
    fn make_step_data() -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..60 {
            let x = i as f64 * 0.5;
            features.push(vec![x, ((i * 13) % 7) as f64]);
            targets.push(if x < 10.0 { 2.0 } else if x < 20.0 { 6.0 } else { 1.0 });
        }
        let names = vec!["x".to_string(), "y".to_string()];
        (features, targets, names)
    }

    #[test]
    fn fits_step_function() {
        let (features, targets, names) = make_step_data();
        let config = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let predictions = result.forest().predict_batch(&features).unwrap();
        let r2 = r2_score(&targets, &predictions).unwrap();
        assert!(r2 > 0.9, "r2 = {r2}");
    }

    #[test]
    fn oob_score_computed() {
        let (features, targets, names) = make_step_data();
        let config = RandomForestConfig::new(50)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let oob = result.oob_score().expect("OOB should be computed");
        assert!(oob.r2 > 0.7, "oob r2 = {}", oob.r2);
        assert!(oob.n_oob_samples > 0);
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let (features, targets, names) = make_step_data();
        let config = RandomForestConfig::new(20).unwrap().with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
        assert_eq!(result.importances()[0].name, "x");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, targets, names) = make_step_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_max_features(MaxFeatures::Fixed(1))
                .with_seed(99)
                .fit(&features, &targets, &names)
                .unwrap()
        };
        let preds1 = fit().forest().predict_batch(&features).unwrap();
        let preds2 = fit().forest().predict_batch(&features).unwrap();
        assert_eq!(preds1, preds2);
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let (features, targets, names) = make_step_data();
        let base = RandomForestConfig::new(16)
            .unwrap()
            .with_max_features(MaxFeatures::Fixed(1))
            .with_seed(5);
        let global = base.clone().fit(&features, &targets, &names).unwrap();
        let pooled = base
            .with_n_jobs(Some(3))
            .fit(&features, &targets, &names)
            .unwrap();
        assert_eq!(
            global.forest().predict_batch(&features).unwrap(),
            pooled.forest().predict_batch(&features).unwrap()
        );
    }

    #[test]
    fn max_depth_respected_by_every_tree() {
        let (features, targets, names) = make_step_data();
        let result = RandomForestConfig::new(8)
            .unwrap()
            .with_max_depth(Some(1))
            .fit(&features, &targets, &names)
            .unwrap();
        assert!(result.forest().trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn empty_dataset_error() {
        let config = RandomForestConfig::new(10).unwrap();
        let err = config.fit(&[], &[], &[]).unwrap_err();
        assert!(matches!(err, crate::RfError::EmptyDataset));
    }

    #[test]
    fn zero_jobs_rejected() {
        let (features, targets, names) = make_step_data();
        let err = RandomForestConfig::new(2)
            .unwrap()
            .with_n_jobs(Some(0))
            .fit(&features, &targets, &names)
            .unwrap_err();
        assert!(matches!(err, crate::RfError::InvalidJobCount { n_jobs: 0 }));
    }

    #[test]
    fn fixed_max_features_above_width_rejected() {
        assert!(resolve_max_features(MaxFeatures::Fixed(8), 7).is_err());
        assert!(resolve_max_features(MaxFeatures::Fixed(0), 7).is_err());
        assert_eq!(resolve_max_features(MaxFeatures::Fixed(2), 7).unwrap(), 2);
        assert_eq!(resolve_max_features(MaxFeatures::All, 7).unwrap(), 7);
    }
}
