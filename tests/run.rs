//! End-to-end runs of the full pipeline on the small fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use seismo::{PipelineConfig, load_dataset, run};
use seismo_io::{NullReporter, OutputWriter, PngReporter};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("crates")
        .join("seismo-io")
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// 40 labeled rows: 30 train, 10 holdout; 24 of the 30 go through 3-fold CV.
fn small_config(output_dir: &Path, seed: u64) -> PipelineConfig {
    PipelineConfig {
        data_path: fixture_path("stats_small.csv"),
        test_path: fixture_path("test_small.csv"),
        output_dir: output_dir.to_path_buf(),
        train_rows: 30,
        n_trees: 16,
        max_depth: Some(6),
        max_features: 2,
        cv_folds: 3,
        test_fraction: 0.2,
        n_jobs: Some(2),
        seed,
        oob: true,
    }
}

#[test]
fn full_run_writes_every_output() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path(), 7);
    let summary = run(&config, &NullReporter, None).unwrap();

    assert_eq!(summary.n_rows, 40);
    assert_eq!(summary.n_training, 30);
    assert_eq!(summary.n_holdout, 10);
    assert_eq!(summary.cross_validation.n_test, 6);
    assert_eq!(summary.cross_validation.n_train, 24);
    assert_eq!(summary.cross_validation.fold_test_scores.len(), 3);
    assert_eq!(summary.holdout.n_rows, 10);
    assert!(summary.holdout.mae >= 0.0);
    assert!(summary.submission.oob_r2.is_some());

    let total: f64 = summary.feature_importances.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-10);
    for pair in summary.feature_importances.windows(2) {
        assert!(pair[0].importance <= pair[1].importance);
    }

    let dumped = fs::read_to_string(dir.path().join("rf_train_predictions.csv")).unwrap();
    assert_eq!(dumped.lines().count(), 40);

    let submission = fs::read_to_string(dir.path().join("rf_submission.csv")).unwrap();
    let mut lines = submission.lines();
    assert_eq!(lines.next(), Some("seg_id,time_to_failure"));
    let seg_ids: Vec<&str> = lines.map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(
        seg_ids,
        vec!["seg_00030f", "seg_0012b5", "seg_00184e", "seg_003339", "seg_0042cc"]
    );
    assert!(!dir.path().join("predictions.png").exists());
}

#[test]
fn same_seed_reproduces_scores() {
    let a_dir = TempDir::new().unwrap();
    let b_dir = TempDir::new().unwrap();
    let a = run(&small_config(a_dir.path(), 11), &NullReporter, None).unwrap();
    let b = run(&small_config(b_dir.path(), 11), &NullReporter, None).unwrap();

    assert_eq!(a.cross_validation.fold_test_scores, b.cross_validation.fold_test_scores);
    assert_eq!(a.holdout.mae, b.holdout.mae);
    assert_eq!(
        fs::read_to_string(a_dir.path().join("rf_submission.csv")).unwrap(),
        fs::read_to_string(b_dir.path().join("rf_submission.csv")).unwrap()
    );
}

#[test]
fn too_few_rows_for_holdout_fails() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        train_rows: 40,
        ..small_config(dir.path(), 1)
    };
    let err = run(&config, &NullReporter, None).unwrap_err();
    assert!(
        err.downcast_ref::<seismo_io::IoError>()
            .is_some_and(|e| matches!(e, seismo_io::IoError::InsufficientRows { .. })),
        "unexpected error: {err:#}"
    );
}

#[test]
fn png_reporter_renders_plot() {
    let dir = TempDir::new().unwrap();
    let plot = OutputWriter::new(dir.path()).unwrap().plot_path();
    assert_eq!(plot, dir.path().join("predictions.png"));
    let reporter = PngReporter::new(&plot).with_size(320, 320);
    let summary = run(&small_config(dir.path(), 3), &reporter, Some(plot.clone())).unwrap();
    assert_eq!(summary.plot_path.as_deref(), Some(plot.as_path()));
    assert!(fs::metadata(&plot).unwrap().len() > 0);
}

#[test]
fn default_training_block_holds_out_the_tail() {
    let train_rows = PipelineConfig::default().train_rows;
    let extra = 5;
    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("stats_data.csv");

    let mut csv = String::from(
        ",gt_2std,gt_3std,power1,power2,power3,power4,median_dev_abs,time_to_failure\n",
    );
    for i in 0..train_rows + extra {
        let ttf = (train_rows + extra - i) as f64 * 0.001;
        csv.push_str(&format!("{i},{},1,2.0,3.0,4,5.0,6.0,{ttf}\n", i % 17));
    }
    fs::write(&data_path, csv).unwrap();

    let config = PipelineConfig {
        data_path,
        ..PipelineConfig::default()
    };
    let dataset = load_dataset(&config).unwrap();
    let split = dataset.split_positional(config.train_rows).unwrap();
    assert_eq!(split.training().len(), 7500);
    assert_eq!(split.holdout().len(), extra);
    assert_eq!(split.holdout().targets(), &dataset.targets()[7500..]);
}
