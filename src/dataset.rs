//! Dataset loading and split handling
//!
//! The benchmark arrives as a single CSV carrying a string row id, the
//! regression label, a split-assignment column, and feature columns
//! (continuous, one-hot district indicators, and lat/lon coordinates).
//! Loading partitions by split, standardizes continuous columns with
//! train-derived stats, and separates ids/labels from the feature table.

use crate::config::PipelineConfig;
use crate::error::{LotwiseError, Result};
use crate::preprocessing::{ContinuousScaler, ScaleStats};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Row cap applied in debug runs
const DEBUG_ROW_CAP: usize = 5000;

/// One split of the dataset: positionally aligned ids, features, and labels.
#[derive(Debug, Clone)]
pub struct LabeledFrame {
    pub ids: StringChunked,
    pub features: DataFrame,
    pub labels: Float64Chunked,
}

impl LabeledFrame {
    pub fn n_rows(&self) -> usize {
        self.features.height()
    }

    /// Apply one boolean mask to ids, features, and labels alike, so
    /// alignment holds by construction.
    pub fn filter(&self, mask: &BooleanChunked) -> Result<LabeledFrame> {
        Ok(LabeledFrame {
            ids: self.ids.filter(mask)?,
            features: self.features.filter(mask)?,
            labels: self.labels.filter(mask)?,
        })
    }

    /// Feature matrix with nulls materialized as NaN.
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        to_matrix(&self.features)
    }

    /// Label vector with nulls materialized as NaN.
    pub fn label_vector(&self) -> Array1<f64> {
        Array1::from_iter(self.labels.into_iter().map(|opt| opt.unwrap_or(f64::NAN)))
    }

    /// Replace the feature table, keeping ids/labels. The new table must
    /// have the same row count.
    pub fn with_features(&self, features: DataFrame) -> Result<LabeledFrame> {
        if features.height() != self.n_rows() {
            return Err(LotwiseError::ShapeError {
                expected: format!("{} rows", self.n_rows()),
                actual: format!("{} rows", features.height()),
            });
        }
        Ok(LabeledFrame {
            ids: self.ids.clone(),
            features,
            labels: self.labels.clone(),
        })
    }
}

/// The three predefined splits of the benchmark.
#[derive(Debug, Clone)]
pub struct SplitSet {
    pub train: LabeledFrame,
    pub validate: LabeledFrame,
    pub test: LabeledFrame,
}

/// Read a CSV into a DataFrame.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| LotwiseError::DataError(format!("cannot open {}: {}", path.display(), e)))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(LotwiseError::from)
}

/// Write a DataFrame as CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(LotwiseError::from)
}

/// Load the benchmark CSV, partition by split, and standardize continuous
/// columns. Stats are fit on TRAIN and reused verbatim on VALIDATE/TEST.
/// The label is scaled alongside the features, so its (mean, std) lands in
/// the returned stats for later de-normalization.
pub fn load_dataset(config: &PipelineConfig) -> Result<(SplitSet, ScaleStats)> {
    let mut df = read_csv(&config.data_path)?;

    if config.debug {
        df = df.head(Some(DEBUG_ROW_CAP));
    }

    // Row id is a string key whatever the CSV reader inferred
    let ids = df
        .column(&config.index_col)
        .map_err(|_| LotwiseError::ColumnNotFound(config.index_col.clone()))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    df.with_column(ids)?;

    if df.column(&config.label_col).is_err() {
        return Err(LotwiseError::ColumnNotFound(config.label_col.clone()));
    }

    info!(
        rows = df.height(),
        columns = df.width(),
        path = %config.data_path.display(),
        "loaded dataset"
    );

    let split_series = df
        .column(&config.split_col)
        .map_err(|_| LotwiseError::ColumnNotFound(config.split_col.clone()))?
        .as_materialized_series()
        .clone();
    let split_ca = split_series.str()?;

    for value in split_ca {
        match value {
            Some("TRAIN") | Some("VALIDATE") | Some("TEST") => {}
            other => {
                return Err(LotwiseError::DataError(format!(
                    "split value {:?} is not one of TRAIN/VALIDATE/TEST",
                    other
                )))
            }
        }
    }

    let train_df = df.filter(&split_ca.equal("TRAIN"))?.drop(&config.split_col)?;
    let validate_df = df.filter(&split_ca.equal("VALIDATE"))?.drop(&config.split_col)?;
    let test_df = df.filter(&split_ca.equal("TEST"))?.drop(&config.split_col)?;

    let [lat_col, lon_col] = config.location_cols();
    let scaler = ContinuousScaler::new().with_ignore(vec![
        config.index_col.clone(),
        lat_col,
        lon_col,
    ]);

    let (train_scaled, stats) = scaler.fit_or_apply(&train_df, &ScaleStats::default())?;
    let (validate_scaled, stats) = scaler.apply(&validate_df, &stats)?;
    let (test_scaled, stats) = scaler.apply(&test_df, &stats)?;

    info!(
        train = train_scaled.height(),
        validate = validate_scaled.height(),
        test = test_scaled.height(),
        scaled_columns = stats.len(),
        "partitioned splits"
    );

    let splits = SplitSet {
        train: into_labeled(train_scaled, &config.index_col, &config.label_col)?,
        validate: into_labeled(validate_scaled, &config.index_col, &config.label_col)?,
        test: into_labeled(test_scaled, &config.index_col, &config.label_col)?,
    };

    Ok((splits, stats))
}

fn into_labeled(df: DataFrame, index_col: &str, label_col: &str) -> Result<LabeledFrame> {
    let ids = df
        .column(index_col)?
        .as_materialized_series()
        .str()?
        .clone();
    let labels = df
        .column(label_col)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .clone();
    let features = df.drop_many([index_col, label_col]);

    Ok(LabeledFrame { ids, features, labels })
}

/// Convert a numeric DataFrame to a row-major matrix, nulls becoming NaN.
pub fn to_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = df.width();
    let mut data = Vec::with_capacity(n_rows * n_cols);

    for column in df.get_columns() {
        let series = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|_| {
                LotwiseError::DataError(format!(
                    "column {:?} is not numeric",
                    column.name()
                ))
            })?;
        let ca = series.f64()?;
        for opt in ca {
            data.push(opt.unwrap_or(f64::NAN));
        }
    }

    // Built column-major, transpose to samples x features
    let arr = Array2::from_shape_vec((n_cols, n_rows), data)?;
    Ok(arr.t().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled() -> LabeledFrame {
        LabeledFrame {
            ids: StringChunked::new("strap".into(), &["a", "b", "c"]),
            features: DataFrame::new(vec![
                Series::new("x".into(), &[1.0, 2.0, 3.0]).into(),
                Series::new("y".into(), &[10.0, 20.0, 30.0]).into(),
            ])
            .unwrap(),
            labels: Float64Chunked::new("label".into(), &[0.1, 0.2, 0.3]),
        }
    }

    #[test]
    fn test_filter_keeps_alignment() {
        let frame = labeled();
        let mask = BooleanChunked::new("mask".into(), &[true, false, true]);
        let filtered = frame.filter(&mask).unwrap();

        assert_eq!(filtered.n_rows(), 2);
        assert_eq!(filtered.ids.get(1), Some("c"));
        assert_eq!(filtered.labels.get(1), Some(0.3));
        let x = filtered.features.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(1), Some(3.0));
    }

    #[test]
    fn test_to_matrix_is_row_major_with_nan_nulls() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[Some(1.0), None]).into(),
            Series::new("b".into(), &[Some(3.0), Some(4.0)]).into(),
        ])
        .unwrap();
        let m = to_matrix(&df).unwrap();

        assert_eq!(m.shape(), &[2, 2]);
        assert_eq!(m[[0, 0]], 1.0);
        assert_eq!(m[[0, 1]], 3.0);
        assert!(m[[1, 0]].is_nan());
        assert_eq!(m[[1, 1]], 4.0);
    }

    #[test]
    fn test_with_features_rejects_row_mismatch() {
        let frame = labeled();
        let shorter = frame.features.head(Some(2));
        assert!(frame.with_features(shorter).is_err());
    }

    #[test]
    fn test_label_vector() {
        let frame = labeled();
        let y = frame.label_vector();
        assert_eq!(y.len(), 3);
        assert!((y[2] - 0.3).abs() < 1e-12);
    }
}
