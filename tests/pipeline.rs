//! End-to-end pipeline tests over temp-file CSV fixtures

use lotwise::config::PipelineConfig;
use lotwise::dataset::{load_dataset, write_csv};
use lotwise::pipeline::{load_stage, write_importance_report, SegmentedRunner};
use polars::prelude::*;
use tempfile::TempDir;

/// Rows per zone and split in the benchmark fixture
const TRAIN_ROWS: usize = 30;
const HOLDOUT_ROWS: usize = 8;

struct FixtureZone {
    key: &'static str,
    train_rows: usize,
    /// Null out validation labels (poisons the depth sweep)
    broken_validation: bool,
}

/// Build a benchmark CSV with one-hot zone indicators and write it to disk.
/// Labels follow sqft, so selection and training have real signal.
fn write_benchmark(dir: &TempDir, zones: &[FixtureZone]) -> std::path::PathBuf {
    let mut straps: Vec<String> = Vec::new();
    let mut splits: Vec<&str> = Vec::new();
    let mut labels: Vec<Option<f64>> = Vec::new();
    let mut sqft: Vec<f64> = Vec::new();
    let mut rooms: Vec<f64> = Vec::new();
    let mut lats: Vec<f64> = Vec::new();
    let mut lons: Vec<f64> = Vec::new();
    let mut indicators: Vec<Vec<f64>> = vec![Vec::new(); zones.len()];

    let mut row = 0usize;
    for (zone_idx, zone) in zones.iter().enumerate() {
        let counts = [
            ("TRAIN", zone.train_rows),
            ("VALIDATE", HOLDOUT_ROWS),
            ("TEST", HOLDOUT_ROWS),
        ];
        for (split, count) in counts {
            for i in 0..count {
                straps.push(format!("p{:05}", row));
                splits.push(split);
                let size = 800.0 + (i % 10) as f64 * 120.0 + zone_idx as f64 * 50.0;
                sqft.push(size);
                rooms.push(2.0 + (i % 4) as f64);
                lats.push(27.7 + (row % 7) as f64 * 0.01);
                lons.push(-82.7 + (row % 5) as f64 * 0.01);
                if zone.broken_validation && split == "VALIDATE" {
                    labels.push(None);
                } else {
                    labels.push(Some(size / 1000.0 + zone_idx as f64));
                }
                for (other_idx, column) in indicators.iter_mut().enumerate() {
                    column.push(if other_idx == zone_idx { 1.0 } else { 0.0 });
                }
                row += 1;
            }
        }
    }

    let mut columns: Vec<Column> = vec![
        Series::new("strap".into(), straps).into(),
        Series::new("split".into(), splits).into(),
        Series::new("log_price_per_sqft".into(), labels).into(),
        Series::new("sqft".into(), sqft).into(),
        Series::new("rooms".into(), rooms).into(),
        Series::new("latitude".into(), lats).into(),
        Series::new("longitude".into(), lons).into(),
    ];
    for (zone, column) in zones.iter().zip(indicators) {
        let name = format!("current_tax_district_dscr_{}", zone.key);
        columns.push(Series::new(name.as_str().into(), column).into());
    }

    let mut df = DataFrame::new(columns).unwrap();
    let path = dir.path().join("benchmark.csv");
    write_csv(&mut df, &path).unwrap();
    path
}

fn fixture_config(dir: &TempDir, path: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data_path: path.to_path_buf(),
        model_dim: 2,
        min_segment_rows: TRAIN_ROWS,
        n_estimators: 10,
        output_dir: dir.path().join("reports"),
        run_id: "itest".to_string(),
        ..PipelineConfig::default()
    }
}

fn two_zones() -> Vec<FixtureZone> {
    vec![
        FixtureZone {
            key: "zone_A",
            train_rows: TRAIN_ROWS,
            broken_validation: false,
        },
        FixtureZone {
            key: "zone_B",
            train_rows: TRAIN_ROWS,
            broken_validation: false,
        },
    ]
}

#[test]
fn loader_partitions_scales_and_keeps_label_stats() {
    let dir = TempDir::new().unwrap();
    let path = write_benchmark(&dir, &two_zones());
    let config = fixture_config(&dir, &path);

    let (splits, stats) = load_dataset(&config).unwrap();

    assert_eq!(splits.train.n_rows(), 2 * TRAIN_ROWS);
    assert_eq!(splits.validate.n_rows(), 2 * HOLDOUT_ROWS);
    assert_eq!(splits.test.n_rows(), 2 * HOLDOUT_ROWS);

    // Label stats recorded for later de-normalization
    let label_stats = stats.get("log_price_per_sqft").unwrap();
    assert!(label_stats.std > 0.0);

    // Continuous features are centered on train, indicators untouched
    assert!(stats.get("sqft").is_some());
    assert!(stats.get("current_tax_district_dscr_zone_A").is_none());
    assert!(stats.get("latitude").is_none());

    // Validation is scaled with train stats, not its own
    let sqft_stats = stats.get("sqft").unwrap();
    let val_sqft = splits.validate.features.column("sqft").unwrap().f64().unwrap().clone();
    let expected = (800.0 - sqft_stats.mean) / sqft_stats.std;
    assert!((val_sqft.get(0).unwrap() - expected).abs() < 1e-9);
}

#[test]
fn loader_rejects_unknown_split_values() {
    let dir = TempDir::new().unwrap();
    let mut df = df!(
        "strap" => ["a", "b"],
        "split" => ["TRAIN", "HOLDOUT"],
        "log_price_per_sqft" => [1.0, 2.0],
        "sqft" => [900.0, 1100.0],
    )
    .unwrap();
    let path = dir.path().join("bad.csv");
    write_csv(&mut df, &path).unwrap();

    let config = PipelineConfig {
        data_path: path,
        ..PipelineConfig::default()
    };
    let err = load_dataset(&config).unwrap_err();
    assert!(err.to_string().contains("HOLDOUT"));
}

#[test]
fn load_stage_drops_location_columns_without_enrichment() {
    let dir = TempDir::new().unwrap();
    let path = write_benchmark(&dir, &two_zones());
    let config = fixture_config(&dir, &path);

    let state = load_stage(&config).unwrap();
    let names = state.splits.train.features.get_column_names();
    assert!(!names.iter().any(|n| n.as_str() == "latitude"));
    assert!(!names.iter().any(|n| n.as_str() == "longitude"));
    assert!(names.iter().any(|n| n.as_str() == "sqft"));
}

#[test]
fn segmented_run_models_each_zone_and_writes_report() {
    let dir = TempDir::new().unwrap();
    let path = write_benchmark(&dir, &two_zones());
    let config = fixture_config(&dir, &path);

    let state = load_stage(&config).unwrap();
    let runner = SegmentedRunner::new(config.clone());
    let summary = runner.run(&state).unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.failures.is_empty());

    for outcome in &summary.outcomes {
        assert!(outcome.report.test_unscaled_mae.is_some());
        assert_eq!(outcome.importances.len(), 2);
        // Selected features exclude every indicator column
        assert!(outcome
            .importances
            .keys()
            .all(|name| !name.starts_with("current_tax_district_dscr_")));
    }

    let report_path = write_importance_report(&summary.outcomes, &config).unwrap();
    assert!(report_path.ends_with("feature_importances_itest.csv"));
    let report = lotwise::dataset::read_csv(&report_path).unwrap();
    assert_eq!(report.height(), 2);
    let segments = report.column("segment").unwrap().str().unwrap().clone();
    assert_eq!(segments.get(0), Some("zone_A"));
    assert_eq!(segments.get(1), Some("zone_B"));
}

#[test]
fn row_threshold_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let zones = vec![
        FixtureZone {
            key: "zone_A",
            train_rows: TRAIN_ROWS,
            broken_validation: false,
        },
        FixtureZone {
            key: "zone_B",
            train_rows: TRAIN_ROWS - 1,
            broken_validation: false,
        },
    ];
    let path = write_benchmark(&dir, &zones);
    let config = fixture_config(&dir, &path);

    let state = load_stage(&config).unwrap();
    let summary = SegmentedRunner::new(config).run(&state).unwrap();

    // Exactly at the threshold runs; one short does not
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].key, "zone_A");
    assert!(summary.failures.is_empty());
}

#[test]
fn failing_segment_is_contained() {
    let dir = TempDir::new().unwrap();
    let zones = vec![
        FixtureZone {
            key: "zone_A",
            train_rows: TRAIN_ROWS,
            broken_validation: false,
        },
        FixtureZone {
            key: "zone_C",
            train_rows: TRAIN_ROWS,
            broken_validation: true,
        },
    ];
    let path = write_benchmark(&dir, &zones);
    let config = fixture_config(&dir, &path);

    let state = load_stage(&config).unwrap();
    let summary = SegmentedRunner::new(config.clone()).run(&state).unwrap();

    // zone_C's poisoned validation labels sink only zone_C
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].key, "zone_A");
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].to_string().starts_with("segment zone_C"));

    // The report covers the survivors only
    let report_path = write_importance_report(&summary.outcomes, &config).unwrap();
    let report = lotwise::dataset::read_csv(&report_path).unwrap();
    assert_eq!(report.height(), 1);
}
