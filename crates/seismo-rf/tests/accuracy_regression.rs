//! Accuracy regression tests for seismo-rf.
//!
//! These tests verify that algorithmic changes do not degrade Random Forest
//! regression quality on a deterministic synthetic dataset.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use seismo_rf::{
    CrossValidation, OobMode, RandomForestConfig, mean_absolute_error, r2_score,
    train_test_split,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic regression dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 7-feature regression dataset.
///
/// The target is `4·f0 + 2·f1` plus noise in [0, 0.05].
/// Features 2-6 are pure noise in [0, 1].
fn make_regression() -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 7;

    let mut features = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>()).collect();
        targets.push(4.0 * row[0] + 2.0 * row[1] + rng.r#gen::<f64>() * 0.05);
        features.push(row);
    }
    let names: Vec<String> = (0..n_features).map(|f| format!("f{f}")).collect();
    (features, targets, names)
}

// ---------------------------------------------------------------------------
// a) cv_r2_above_threshold
// ---------------------------------------------------------------------------

/// 5-fold cross-validation mean test R² must exceed 0.75.
#[test]
fn cv_r2_above_threshold() {
    let (features, targets, names) = make_regression();
    let rf_config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let cv = CrossValidation::new(5).unwrap();
    let result = cv.evaluate(&rf_config, &features, &targets, &names).unwrap();

    assert!(
        result.mean_test_score > 0.75,
        "cv mean test r2 {} <= 0.75",
        result.mean_test_score
    );
    assert!(result.mean_train_score >= result.mean_test_score);
}

// ---------------------------------------------------------------------------
// b) oob_r2_above_threshold
// ---------------------------------------------------------------------------

/// OOB R² with 100 trees must exceed 0.70.
#[test]
fn oob_r2_above_threshold() {
    let (features, targets, names) = make_regression();
    let rf_config = RandomForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .with_oob_mode(OobMode::Enabled);
    let result = rf_config.fit(&features, &targets, &names).unwrap();

    let oob = result.oob_score().expect("OOB score must be computed when OobMode::Enabled");
    assert!(oob.r2 > 0.70, "oob r2 {} <= 0.70", oob.r2);
    assert_eq!(oob.n_oob_samples, 300);
}

// ---------------------------------------------------------------------------
// c) top_features_are_informative
// ---------------------------------------------------------------------------

/// The strongest driver ranks first and the second driver makes the top 3.
#[test]
fn top_features_are_informative() {
    let (features, targets, names) = make_regression();
    let rf_config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let result = rf_config.fit(&features, &targets, &names).unwrap();

    let top3: Vec<&str> = result
        .importances()
        .iter()
        .take(3)
        .map(|f| f.name.as_str())
        .collect();

    assert_eq!(top3[0], "f0", "top-3: {top3:?}");
    assert!(top3.contains(&"f1"), "top-3: {top3:?}");
}

// ---------------------------------------------------------------------------
// d) deterministic_predictions
// ---------------------------------------------------------------------------

/// Same config and seed must produce identical predictions across two independent runs.
#[test]
fn deterministic_predictions() {
    let (features, targets, names) = make_regression();
    let rf_config = RandomForestConfig::new(50).unwrap().with_seed(42);

    let result1 = rf_config.fit(&features, &targets, &names).unwrap();
    let result2 = rf_config.fit(&features, &targets, &names).unwrap();

    let preds1 = result1.forest().predict_batch(&features).unwrap();
    let preds2 = result2.forest().predict_batch(&features).unwrap();

    assert_eq!(preds1, preds2, "predictions differ across runs with the same seed");
}

// ---------------------------------------------------------------------------
// e) fit_on_training_data
// ---------------------------------------------------------------------------

/// Training R² with 100 unbounded trees must exceed 0.95.
#[test]
fn fit_on_training_data() {
    let (features, targets, names) = make_regression();
    let rf_config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let result = rf_config.fit(&features, &targets, &names).unwrap();

    let predictions = result.forest().predict_batch(&features).unwrap();
    let r2 = r2_score(&targets, &predictions).unwrap();
    assert!(r2 > 0.95, "training r2 {r2} <= 0.95");
}

// ---------------------------------------------------------------------------
// f) holdout_mae_below_threshold
// ---------------------------------------------------------------------------

/// A random 80/20 split must give a held-out MAE well below the target spread.
#[test]
fn holdout_mae_below_threshold() {
    let (features, targets, names) = make_regression();
    let split = train_test_split(features.len(), 0.2, 42).unwrap();
    let (train_x, train_y) = split.train_rows(&features, &targets);
    let (test_x, test_y) = split.test_rows(&features, &targets);

    let rf_config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let forest = rf_config.fit(&train_x, &train_y, &names).unwrap().into_forest();
    let mae = mean_absolute_error(&test_y, &forest.predict_batch(&test_x).unwrap()).unwrap();

    assert_eq!(test_x.len(), 60);
    assert!(mae < 0.6, "holdout mae {mae} >= 0.6");
}
