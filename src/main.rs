use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use tracing::info;

use seismo::{PipelineConfig, resolve_seed, run};
use seismo_io::{NullReporter, OutputWriter, PngReporter, Reporter};

#[derive(Parser)]
#[command(name = "seismo")]
#[command(about = "Random-forest time-to-failure model for seismic segment statistics")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    /// RNG seed for reproducibility (drawn from OS entropy and logged if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,
}

/// Inputs, outputs and model hyperparameters.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Path to the labeled statistics CSV
    #[arg(long, default_value = "stats_data.csv")]
    data: PathBuf,

    /// Path to the unlabeled test statistics CSV
    #[arg(long, default_value = "stats_test.csv")]
    test: PathBuf,

    /// Output directory for predictions, submission and plot
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Leading rows used for training; the remainder is held out
    #[arg(long, default_value_t = 7500)]
    train_rows: usize,

    /// Number of trees per forest
    #[arg(long, default_value_t = 256)]
    n_trees: usize,

    /// Maximum tree depth (0 = unlimited)
    #[arg(long, default_value_t = 14)]
    max_depth: usize,

    /// Features sampled at each split
    #[arg(long, default_value_t = 2)]
    max_features: usize,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    cv_folds: usize,

    /// Fraction of the training block withheld before cross-validation
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Worker threads per forest fit
    #[arg(long, default_value_t = 6)]
    n_jobs: usize,

    /// Skip rendering predictions.png
    #[arg(long, default_value_t = false)]
    no_plot: bool,

    /// Also compute the out-of-bag R² of the final model
    #[arg(long, default_value_t = false)]
    oob: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let args = cli.run;
    let config = PipelineConfig {
        data_path: args.data,
        test_path: args.test,
        output_dir: args.output_dir,
        train_rows: args.train_rows,
        n_trees: args.n_trees,
        max_depth: (args.max_depth > 0).then_some(args.max_depth),
        max_features: args.max_features,
        cv_folds: args.cv_folds,
        test_fraction: args.test_fraction,
        n_jobs: Some(args.n_jobs),
        seed: resolve_seed(cli.seed),
        oob: args.oob,
    };

    let plot_target = OutputWriter::new(&config.output_dir)?.plot_path();
    let png = (!args.no_plot).then(|| PngReporter::new(&plot_target));
    let reporter: &dyn Reporter = match &png {
        Some(png) => png,
        None => &NullReporter,
    };
    let plot_path = png.as_ref().map(|p| p.path().to_path_buf());

    let summary = run(&config, reporter, plot_path).context("pipeline failed")?;

    if !cli.quiet {
        print!("{summary}");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
