//! Supervised k-best feature selection
//!
//! Scores each candidate column by binned mutual information against the
//! label, fit on the training split only. Selected names are emitted in the
//! original column order so the projection is stable across splits.

use crate::dataset::to_matrix;
use crate::error::{LotwiseError, Result};
use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The outcome of a fit: an ordered projection applicable to any split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedFeatures {
    /// Selected column names, in original table order
    names: Vec<String>,
    /// Mutual-information score per selected column
    scores: Vec<f64>,
}

impl SelectedFeatures {
    /// Selected column names, in original table order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Project a frame down to the selected columns. Idempotent: applying to
    /// an already-projected frame returns the same columns again.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        Ok(df.select(self.names.iter().map(String::as_str))?)
    }
}

/// Mutual-information top-k selector
#[derive(Debug, Clone)]
pub struct KBestSelector {
    k: usize,
}

impl KBestSelector {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    /// Fit on training features and labels.
    pub fn fit(&self, features: &DataFrame, labels: &Array1<f64>) -> Result<SelectedFeatures> {
        let names: Vec<String> = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        if names.len() < self.k {
            return Err(LotwiseError::SelectionError(format!(
                "need at least {} candidate columns, got {}",
                self.k,
                names.len()
            )));
        }

        let x = to_matrix(features)?;
        if x.nrows() != labels.len() {
            return Err(LotwiseError::ShapeError {
                expected: format!("{} label rows", x.nrows()),
                actual: format!("{} label rows", labels.len()),
            });
        }

        let mi_scores: Vec<f64> = (0..x.ncols())
            .map(|col_idx| mutual_information(x.column(col_idx), labels.view()))
            .collect();

        // Top k by score, then back to original column order
        let mut indexed: Vec<(usize, f64)> = mi_scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut selected: Vec<usize> = indexed.into_iter().take(self.k).map(|(i, _)| i).collect();
        selected.sort_unstable();

        Ok(SelectedFeatures {
            names: selected.iter().map(|&i| names[i].clone()).collect(),
            scores: selected.iter().map(|&i| mi_scores[i]).collect(),
        })
    }

    /// Fit on train, project all three splits with the same selection.
    pub fn fit_apply(
        &self,
        train: &DataFrame,
        validate: &DataFrame,
        test: &DataFrame,
        train_labels: &Array1<f64>,
    ) -> Result<(DataFrame, DataFrame, DataFrame, SelectedFeatures)> {
        let selected = self.fit(train, train_labels)?;
        Ok((
            selected.apply(train)?,
            selected.apply(validate)?,
            selected.apply(test)?,
            selected,
        ))
    }
}

/// Binned mutual information between two continuous variables.
fn mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let n_bins = (n.sqrt() as usize).clamp(2, 20);
    let x_bins = discretize(x, n_bins);
    let y_bins = discretize(y, n_bins);

    let mut joint_counts: HashMap<(usize, usize), usize> = HashMap::new();
    let mut x_counts: HashMap<usize, usize> = HashMap::new();
    let mut y_counts: HashMap<usize, usize> = HashMap::new();

    for (&xb, &yb) in x_bins.iter().zip(y_bins.iter()) {
        *joint_counts.entry((xb, yb)).or_insert(0) += 1;
        *x_counts.entry(xb).or_insert(0) += 1;
        *y_counts.entry(yb).or_insert(0) += 1;
    }

    let mut mi = 0.0;
    for (&(xb, yb), &count) in &joint_counts {
        let p_xy = count as f64 / n;
        let p_x = x_counts[&xb] as f64 / n;
        let p_y = y_counts[&yb] as f64 / n;
        if p_xy > 0.0 && p_x > 0.0 && p_y > 0.0 {
            mi += p_xy * (p_xy / (p_x * p_y)).ln();
        }
    }

    mi.max(0.0)
}

/// Equal-width binning; NaN lands in bin 0 with the minimum.
fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
    let min_val = x.iter().copied().filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
    let max_val = x
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    let range = max_val - min_val;
    if !range.is_finite() || range <= 0.0 {
        return vec![0; x.len()];
    }

    let bin_width = range / n_bins as f64;
    x.iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            (((v - min_val) / bin_width) as usize).min(n_bins - 1)
        })
        .collect()
}
