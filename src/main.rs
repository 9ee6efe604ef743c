//! lotwise - command-line entry point

use clap::{Args, Parser, Subcommand};
use lotwise::config::{EnrichmentConfig, PipelineConfig};
use lotwise::enrich::LocalDataPackage;
use lotwise::pipeline::{enrich_stage, load_stage, run_global, write_importance_report, SegmentedRunner};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lotwise", about = "Real-estate price modeling pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the benchmark CSV
    #[arg(long)]
    data: PathBuf,

    /// Row-id column
    #[arg(long, default_value = "strap")]
    index_col: String,

    /// Regression target column
    #[arg(long, default_value = "log_price_per_sqft")]
    label_col: String,

    /// Split-assignment column
    #[arg(long, default_value = "split")]
    split_col: String,

    /// Features kept by supervised selection
    #[arg(long, default_value_t = 50)]
    model_dim: usize,

    /// Trees per forest
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Seed for bootstrap sampling
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Directory the importance report is written to
    #[arg(long, default_value = "feature_importances")]
    output_dir: PathBuf,

    /// Cap the dataset at 5000 rows
    #[arg(long)]
    debug: bool,

    /// Enable enrichment from a local data package at this directory
    #[arg(long)]
    enrich_base: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and evaluate one model over the full dataset
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Run identifier stamped into the report file name
        #[arg(long, default_value = "enrich")]
        run_id: String,
    },
    /// Train one model per tax district
    PerDistrict {
        #[command(flatten)]
        common: CommonArgs,

        /// One-hot prefix of the district indicator columns
        #[arg(long, default_value = "current_tax_district_dscr_")]
        prefix: String,

        /// Minimum train rows for a district to be modeled
        #[arg(long, default_value_t = 850)]
        min_rows: usize,

        /// Run identifier stamped into the report file name
        #[arg(long, default_value = "perdistrict")]
        run_id: String,
    },
}

fn build_config(common: &CommonArgs, run_id: &str) -> PipelineConfig {
    PipelineConfig {
        data_path: common.data.clone(),
        index_col: common.index_col.clone(),
        label_col: common.label_col.clone(),
        split_col: common.split_col.clone(),
        model_dim: common.model_dim,
        n_estimators: common.n_estimators,
        seed: common.seed,
        run_id: run_id.to_string(),
        output_dir: common.output_dir.clone(),
        debug: common.debug,
        enrichment: common
            .enrich_base
            .as_ref()
            .map(|base| EnrichmentConfig::default().with_base_loc(base)),
        ..PipelineConfig::default()
    }
}

fn run_pipeline(config: PipelineConfig, segmented: bool) -> lotwise::Result<()> {
    let mut state = load_stage(&config)?;

    if let Some(enrichment) = &config.enrichment {
        let mut package = LocalDataPackage::new(enrichment.clone());
        state = enrich_stage(state, &mut package, &config)?;
    }

    if segmented {
        let runner = SegmentedRunner::new(config.clone());
        let summary = runner.run(&state)?;
        write_importance_report(&summary.outcomes, &config)?;
        println!(
            "{} segments modeled, {} failed",
            summary.outcomes.len(),
            summary.failures.len()
        );
    } else {
        let outcome = run_global(&state, &config)?;
        write_importance_report(&[outcome.clone()], &config)?;
        println!(
            "test_loss={:.6} test_unscaled_mae={:?} (max_depth={})",
            outcome.report.test_loss, outcome.report.test_unscaled_mae, outcome.best_depth
        );
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lotwise=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { common, run_id } => {
            let config = build_config(&common, &run_id);
            run_pipeline(config, false)?;
        }
        Commands::PerDistrict {
            common,
            prefix,
            min_rows,
            run_id,
        } => {
            let mut config = build_config(&common, &run_id);
            config.segment_prefix = prefix;
            config.min_segment_rows = min_rows;
            run_pipeline(config, true)?;
        }
    }

    Ok(())
}
