//! Pipeline stages and runners
//!
//! Each stage takes a [`PipelineState`] and returns a new one, so a run is a
//! plain function chain: load -> (enrich) -> select/train/evaluate, either
//! globally or fanned out per tax-district segment with contained failures.

use crate::config::PipelineConfig;
use crate::dataset::{load_dataset, write_csv, LabeledFrame, SplitSet};
use crate::enrich::FeatureEnricher;
use crate::error::{LotwiseError, Result};
use crate::evaluation::{evaluate, EvalReport};
use crate::imputation::impute_missing;
use crate::preprocessing::{ContinuousScaler, KBestSelector, ScaleStats};
use crate::segment::segment;
use crate::training::DepthSweep;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Neighbors used when imputing enrichment nulls
const IMPUTE_NEIGHBORS: usize = 3;

/// Immutable state threaded through the stages.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub splits: SplitSet,
    /// Stats recorded while scaling at load time; holds the label's
    /// (mean, std) used for de-normalized evaluation
    pub scale_stats: ScaleStats,
}

impl PipelineState {
    fn label_stats<'a>(&'a self, config: &PipelineConfig) -> Option<&'a crate::preprocessing::ColumnStats> {
        self.scale_stats.get(&config.label_col)
    }
}

/// Load the benchmark and split it. Without enrichment the coordinate
/// columns carry no model signal and are dropped here; with enrichment they
/// survive until the join consumes them.
pub fn load_stage(config: &PipelineConfig) -> Result<PipelineState> {
    config.validate()?;
    let (mut splits, scale_stats) = load_dataset(config)?;

    if config.enrichment.is_none() {
        let location_cols = config.location_cols();
        for frame in [&mut splits.train, &mut splits.validate, &mut splits.test] {
            frame.features = frame
                .features
                .drop_many(location_cols.iter().map(String::as_str));
        }
    }

    Ok(PipelineState { splits, scale_stats })
}

/// Join enrichment features onto every split, then drop the coordinate
/// columns, impute the join's nulls, and standardize. Enriched-column stats
/// are fit on train and reused on validate/test.
pub fn enrich_stage(
    state: PipelineState,
    enricher: &mut dyn FeatureEnricher,
    config: &PipelineConfig,
) -> Result<PipelineState> {
    let enrichment = config.enrichment.as_ref().ok_or_else(|| {
        LotwiseError::ConfigError("enrich stage requires an enrichment config".to_string())
    })?;
    enricher.load(&enrichment.features)?;

    let location_cols = enrichment.location_cols();
    let prepare = |frame: &LabeledFrame| -> Result<DataFrame> {
        let enriched = enricher.enrich_df(&frame.features)?;
        let trimmed = enriched.drop_many(location_cols.iter().map(String::as_str));
        impute_missing(&trimmed, IMPUTE_NEIGHBORS)
    };

    let scaler = ContinuousScaler::new();
    let (train_features, enriched_stats) =
        scaler.fit_or_apply(&prepare(&state.splits.train)?, &ScaleStats::default())?;
    let (validate_features, enriched_stats) =
        scaler.apply(&prepare(&state.splits.validate)?, &enriched_stats)?;
    let (test_features, _) = scaler.apply(&prepare(&state.splits.test)?, &enriched_stats)?;

    info!(
        columns = train_features.width(),
        "enriched and rescaled feature tables"
    );

    Ok(PipelineState {
        splits: SplitSet {
            train: state.splits.train.with_features(train_features)?,
            validate: state.splits.validate.with_features(validate_features)?,
            test: state.splits.test.with_features(test_features)?,
        },
        scale_stats: state.scale_stats,
    })
}

/// Everything a successful model run reports.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    /// Segment key, or the run id for a global run
    pub key: String,
    pub best_depth: usize,
    pub val_loss: f64,
    pub report: EvalReport,
    /// Selected feature name -> forest importance
    pub importances: BTreeMap<String, f64>,
}

/// Select features on train, sweep depths, evaluate on test.
fn run_model(
    key: &str,
    train: &LabeledFrame,
    validate: &LabeledFrame,
    test: &LabeledFrame,
    state: &PipelineState,
    config: &PipelineConfig,
) -> Result<ModelOutcome> {
    let selector = KBestSelector::new(config.model_dim);
    let y_train = train.label_vector();
    let (train_features, validate_features, test_features, selected) = selector.fit_apply(
        &train.features,
        &validate.features,
        &test.features,
        &y_train,
    )?;

    let x_train = crate::dataset::to_matrix(&train_features)?;
    let x_val = crate::dataset::to_matrix(&validate_features)?;
    let x_test = crate::dataset::to_matrix(&test_features)?;

    let sweep = DepthSweep::new(config.n_estimators, config.seed);
    let model = sweep.run(&x_train, &y_train, &x_val, &validate.label_vector())?;

    let report = evaluate(
        &model,
        &x_test,
        &test.label_vector(),
        state.label_stats(config),
    )?;

    let importances: BTreeMap<String, f64> = match model.forest.feature_importances() {
        Some(imp) => selected
            .names()
            .iter()
            .cloned()
            .zip(imp.iter().copied())
            .collect(),
        None => BTreeMap::new(),
    };

    Ok(ModelOutcome {
        key: key.to_string(),
        best_depth: model.max_depth,
        val_loss: model.val_loss,
        report,
        importances,
    })
}

/// Global (non-segmented) run: one model over the full feature table.
pub fn run_global(state: &PipelineState, config: &PipelineConfig) -> Result<ModelOutcome> {
    let outcome = run_model(
        &config.run_id,
        &state.splits.train,
        &state.splits.validate,
        &state.splits.test,
        state,
        config,
    )?;

    info!(
        test_loss = outcome.report.test_loss,
        test_unscaled_mae = outcome.report.test_unscaled_mae,
        "test result"
    );
    Ok(outcome)
}

/// The result of a segmented run: successes plus contained failures.
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<ModelOutcome>,
    pub failures: Vec<LotwiseError>,
}

/// Fans one independent model run out per qualifying segment.
#[derive(Debug, Clone)]
pub struct SegmentedRunner {
    config: PipelineConfig,
}

impl SegmentedRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Segment all three splits, keep segments with enough train rows, and
    /// run each kept segment as its own rayon task. A failing segment is
    /// logged and recorded; the others are unaffected.
    pub fn run(&self, state: &PipelineState) -> Result<RunSummary> {
        let prefix = &self.config.segment_prefix;
        let train_segments = segment(&state.splits.train, prefix)?;
        let validate_segments = segment(&state.splits.validate, prefix)?;
        let test_segments = segment(&state.splits.test, prefix)?;

        let kept: Vec<&String> = train_segments
            .iter()
            .filter(|(_, frame)| frame.n_rows() >= self.config.min_segment_rows)
            .map(|(key, _)| key)
            .collect();
        info!(
            kept = kept.len(),
            total = train_segments.len(),
            min_rows = self.config.min_segment_rows,
            "segments passing the row threshold"
        );

        let results: Vec<Result<ModelOutcome>> = kept
            .par_iter()
            .map(|&key| {
                self.run_segment(
                    key,
                    &train_segments[key],
                    validate_segments.get(key),
                    test_segments.get(key),
                    state,
                )
                .map_err(|e| LotwiseError::for_segment(key, e))
            })
            .collect();

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(outcome) => {
                    info!(
                        segment = %outcome.key,
                        best_depth = outcome.best_depth,
                        test_loss = outcome.report.test_loss,
                        test_unscaled_mae = outcome.report.test_unscaled_mae,
                        "segment result"
                    );
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(error = %err, "segment failed; continuing");
                    failures.push(err);
                }
            }
        }

        Ok(RunSummary { outcomes, failures })
    }

    fn run_segment(
        &self,
        key: &str,
        train: &LabeledFrame,
        validate: Option<&LabeledFrame>,
        test: Option<&LabeledFrame>,
        state: &PipelineState,
    ) -> Result<ModelOutcome> {
        let validate = validate.ok_or_else(|| {
            LotwiseError::DataError("segment has no validation rows".to_string())
        })?;
        let test = test
            .ok_or_else(|| LotwiseError::DataError("segment has no test rows".to_string()))?;

        run_model(key, train, validate, test, state, &self.config)
    }
}

/// Write the joined importance report: one row per outcome, one column per
/// feature seen in any outcome, missing entries 0.0, rows sorted by key.
/// Returns the written path.
pub fn write_importance_report(
    outcomes: &[ModelOutcome],
    config: &PipelineConfig,
) -> Result<PathBuf> {
    if outcomes.is_empty() {
        return Err(LotwiseError::DataError(
            "no successful outcomes to report".to_string(),
        ));
    }

    let mut sorted: Vec<&ModelOutcome> = outcomes.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    // Union of feature names across outcomes, stably ordered
    let mut feature_names: Vec<String> = sorted
        .iter()
        .flat_map(|o| o.importances.keys().cloned())
        .collect();
    feature_names.sort();
    feature_names.dedup();

    let keys: Vec<String> = sorted.iter().map(|o| o.key.clone()).collect();
    let mut columns: Vec<Column> = vec![Series::new("segment".into(), keys).into()];
    for name in &feature_names {
        let values: Vec<f64> = sorted
            .iter()
            .map(|o| o.importances.get(name).copied().unwrap_or(0.0))
            .collect();
        columns.push(Series::new(name.as_str().into(), values).into());
    }

    let mut report = DataFrame::new(columns)?;
    let path = config
        .output_dir
        .join(format!("feature_importances_{}.csv", config.run_id));
    write_csv(&mut report, &path)?;
    info!(path = %path.display(), rows = report.height(), "wrote importance report");

    Ok(path)
}
