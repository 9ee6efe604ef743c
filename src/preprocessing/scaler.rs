//! Continuous-feature standardization
//!
//! Columns are treated as continuous unless a leading sample of their values
//! is entirely {0, 1} (one-hot indicators stay untouched). Stats are computed
//! once on the training split and reused verbatim on validate/test; reusing
//! them is what keeps held-out scaling leakage-free.

use crate::error::{LotwiseError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fitted (mean, std) for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    pub std: f64,
}

/// Per-column scaling stats, keyed by column name.
/// BTreeMap so serialized stats and log output are stably ordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleStats(BTreeMap<String, ColumnStats>);

impl ScaleStats {
    pub fn get(&self, column: &str) -> Option<&ColumnStats> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: String, stats: ColumnStats) {
        self.0.insert(column, stats);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnStats)> {
        self.0.iter()
    }
}

/// Standardizes continuous columns, skipping {0,1} indicator columns.
#[derive(Debug, Clone)]
pub struct ContinuousScaler {
    /// Rows sampled by the continuity heuristic
    sample_rows: usize,
    /// Columns never scaled (ids, coordinates, ...)
    ignore: Vec<String>,
    /// Geometry column name, always excluded
    geometry_col: String,
}

impl Default for ContinuousScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuousScaler {
    pub fn new() -> Self {
        Self {
            sample_rows: 2000,
            ignore: Vec::new(),
            geometry_col: "geometry".to_string(),
        }
    }

    /// Columns exempt from scaling
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows.max(1);
        self
    }

    /// Scale every continuous column, reusing stats from `existing` where
    /// present and computing-and-recording them where not. Returns the scaled
    /// frame and the merged stats map; the input frame is untouched.
    pub fn fit_or_apply(
        &self,
        df: &DataFrame,
        existing: &ScaleStats,
    ) -> Result<(DataFrame, ScaleStats)> {
        let mut stats = existing.clone();
        let mut replacements: Vec<Series> = Vec::new();

        for name in self.continuous_columns(df)? {
            let series = df
                .column(&name)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let ca = series.f64()?;

            let col_stats = match stats.get(&name) {
                Some(s) => *s,
                None => {
                    let computed = Self::compute_stats(ca);
                    stats.insert(name.clone(), computed);
                    computed
                }
            };

            let scaled: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| (v - col_stats.mean) / col_stats.std))
                .collect();
            replacements.push(scaled.with_name(series.name().clone()).into_series());
        }

        // Single clone, then in-place column replacements
        let mut result = df.clone();
        for scaled in replacements {
            result = result.with_column(scaled)?.clone();
        }

        Ok((result, stats))
    }

    /// Like [`fit_or_apply`](Self::fit_or_apply), but refuses an empty stats
    /// map: held-out splits must be scaled with train-derived stats.
    pub fn apply(&self, df: &DataFrame, existing: &ScaleStats) -> Result<(DataFrame, ScaleStats)> {
        if existing.is_empty() {
            return Err(LotwiseError::ConfigError(
                "refusing to scale a held-out frame with empty stats; fit on train first"
                    .to_string(),
            ));
        }
        self.fit_or_apply(df, existing)
    }

    fn compute_stats(ca: &Float64Chunked) -> ColumnStats {
        let mean = ca.mean().unwrap_or(0.0);
        let std = ca.std(1).unwrap_or(1.0);
        ColumnStats {
            mean,
            std: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }

    /// Numeric columns whose leading sample is not entirely {0, 1}.
    fn continuous_columns(&self, df: &DataFrame) -> Result<Vec<String>> {
        let mut continuous = Vec::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == self.geometry_col || self.ignore.contains(&name) {
                continue;
            }
            if !Self::is_numeric(column.dtype()) {
                continue;
            }

            let series = column
                .as_materialized_series()
                .head(Some(self.sample_rows))
                .cast(&DataType::Float64)?;
            let sample = series.f64()?;

            // Nulls in the sample disqualify the indicator shortcut
            let is_indicator = sample
                .into_iter()
                .all(|opt| matches!(opt, Some(v) if v == 0.0 || v == 1.0));
            if !is_indicator {
                continuous.push(name);
            }
        }

        Ok(continuous)
    }

    fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("price".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]).into(),
            Series::new("district_a".into(), &[0.0, 1.0, 0.0, 1.0, 0.0]).into(),
            Series::new("latitude".into(), &[27.8, 27.9, 27.7, 27.6, 27.8]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_scales_continuous_centers_to_zero() {
        let scaler = ContinuousScaler::new().with_ignore(vec!["latitude".to_string()]);
        let (scaled, stats) = scaler.fit_or_apply(&frame(), &ScaleStats::default()).unwrap();

        let col = scaled.column("price").unwrap().f64().unwrap();
        assert!(col.mean().unwrap().abs() < 1e-10);
        assert!(stats.get("price").is_some());
    }

    #[test]
    fn test_skips_indicator_and_ignored_columns() {
        let scaler = ContinuousScaler::new().with_ignore(vec!["latitude".to_string()]);
        let (scaled, stats) = scaler.fit_or_apply(&frame(), &ScaleStats::default()).unwrap();

        assert!(stats.get("district_a").is_none());
        assert!(stats.get("latitude").is_none());

        let indicator = scaled.column("district_a").unwrap().f64().unwrap();
        assert_eq!(indicator.get(1), Some(1.0));
        let lat = scaled.column("latitude").unwrap().f64().unwrap();
        assert_eq!(lat.get(0), Some(27.8));
    }

    #[test]
    fn test_reuses_existing_stats_unchanged() {
        let scaler = ContinuousScaler::new().with_ignore(vec!["latitude".to_string()]);
        let (_, train_stats) = scaler.fit_or_apply(&frame(), &ScaleStats::default()).unwrap();

        // A different frame scaled with train stats must use them verbatim
        let other = DataFrame::new(vec![
            Series::new("price".into(), &[100.0, 200.0]).into(),
        ])
        .unwrap();
        let (scaled, stats) = scaler.apply(&other, &train_stats).unwrap();

        let expected = train_stats.get("price").unwrap();
        let col = scaled.column("price").unwrap().f64().unwrap();
        assert!((col.get(0).unwrap() - (100.0 - expected.mean) / expected.std).abs() < 1e-12);
        assert_eq!(stats.len(), train_stats.len());
        assert_eq!(stats.get("price"), train_stats.get("price"));
    }

    #[test]
    fn test_apply_rejects_empty_stats() {
        let scaler = ContinuousScaler::new();
        let err = scaler.apply(&frame(), &ScaleStats::default());
        assert!(matches!(err, Err(LotwiseError::ConfigError(_))));
    }

    #[test]
    fn test_constant_column_uses_unit_scale() {
        let df = DataFrame::new(vec![
            Series::new("flat".into(), &[7.0, 7.0, 7.0]).into(),
        ])
        .unwrap();
        let scaler = ContinuousScaler::new();
        let (scaled, stats) = scaler.fit_or_apply(&df, &ScaleStats::default()).unwrap();

        assert_eq!(stats.get("flat").unwrap().std, 1.0);
        let col = scaled.column("flat").unwrap().f64().unwrap();
        assert_eq!(col.get(0), Some(0.0));
    }

    #[test]
    fn test_preserves_nulls() {
        let df = DataFrame::new(vec![
            Series::new("v".into(), &[Some(1.0), None, Some(3.0)]).into(),
        ])
        .unwrap();
        let scaler = ContinuousScaler::new();
        let (scaled, _) = scaler.fit_or_apply(&df, &ScaleStats::default()).unwrap();
        let col = scaled.column("v").unwrap().f64().unwrap();
        assert_eq!(col.get(1), None);
    }
}
