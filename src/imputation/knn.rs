//! KNN-based imputation

use crate::error::{LotwiseError, Result};
use crate::imputation::{is_missing, Imputer};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered float for the neighbor heap
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap by distance (pop largest first)
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// KNN imputer: neighbors are complete rows, distances skip missing
/// coordinates, missing entries take the uniform mean of the k nearest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnImputer {
    n_neighbors: usize,
    /// Complete rows from fit
    complete_data: Option<Array2<f64>>,
    /// Column means over complete rows, fallback when no neighbor is usable
    feature_means: Option<Array1<f64>>,
}

impl KnnImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            complete_data: None,
            feature_means: None,
        }
    }

    /// Euclidean distance over the coordinates both rows have.
    fn distance(a: &[f64], b: &[f64]) -> f64 {
        let mut count = 0usize;
        let mut accum = 0.0f64;

        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            count += 1;
            let d = ai - bi;
            accum += d * d;
        }

        if count == 0 {
            return f64::INFINITY;
        }
        (accum / count as f64).sqrt()
    }

    fn find_neighbors(&self, sample: &[f64], k: usize) -> Vec<usize> {
        let data = self.complete_data.as_ref().unwrap();
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, row) in data.rows().into_iter().enumerate() {
            let dist = match row.as_slice() {
                Some(slice) => Self::distance(sample, slice),
                None => {
                    let row_vec: Vec<f64> = row.iter().copied().collect();
                    Self::distance(sample, &row_vec)
                }
            };

            if dist.is_finite() {
                if heap.len() < k {
                    heap.push(DistanceIdx(dist, i));
                } else if let Some(&DistanceIdx(max_dist, _)) = heap.peek() {
                    if dist < max_dist {
                        heap.pop();
                        heap.push(DistanceIdx(dist, i));
                    }
                }
            }
        }

        heap.into_iter().map(|DistanceIdx(_, i)| i).collect()
    }

    fn impute_value(&self, neighbors: &[usize], feature_idx: usize) -> f64 {
        let data = self.complete_data.as_ref().unwrap();

        if neighbors.is_empty() {
            return self
                .feature_means
                .as_ref()
                .map(|m| m[feature_idx])
                .unwrap_or(0.0);
        }

        let sum: f64 = neighbors.iter().map(|&idx| data[[idx, feature_idx]]).sum();
        sum / neighbors.len() as f64
    }
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Imputer for KnnImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let complete_rows: Vec<usize> = x
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| !row.iter().any(|&v| is_missing(v)))
            .map(|(i, _)| i)
            .collect();

        if complete_rows.is_empty() {
            return Err(LotwiseError::DataError(
                "no complete rows available for KNN imputation".to_string(),
            ));
        }

        let complete_data = x.select(ndarray::Axis(0), &complete_rows);
        let feature_means = complete_data
            .mean_axis(ndarray::Axis(0))
            .ok_or_else(|| LotwiseError::DataError("failed to compute column means".to_string()))?;

        self.complete_data = Some(complete_data);
        self.feature_means = Some(feature_means);

        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.complete_data.is_none() {
            return Err(LotwiseError::ModelNotFitted);
        }

        let mut result = x.clone();
        let n_features = x.ncols();
        let mut row_buf: Vec<f64> = Vec::with_capacity(n_features);

        for (row_idx, row) in x.rows().into_iter().enumerate() {
            if !row.iter().any(|&v| is_missing(v)) {
                continue;
            }

            let row_slice = match row.as_slice() {
                Some(s) => s,
                None => {
                    row_buf.clear();
                    row_buf.extend(row.iter().copied());
                    &row_buf
                }
            };

            let neighbors = self.find_neighbors(row_slice, self.n_neighbors);

            for j in 0..n_features {
                if is_missing(row_slice[j]) {
                    result[[row_idx, j]] = self.impute_value(&neighbors, j);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_all_missing_within_observed_range() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0,
                2.5, f64::NAN,
            ],
        )
        .unwrap();

        let mut imputer = KnnImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(!result.iter().any(|&v| v.is_nan()));
        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_uniform_mean_of_k_nearest() {
        // Row with second feature missing sits next to rows valued 1, 2, 3
        let data = Array2::from_shape_vec(
            (4, 2),
            vec![
                1.0, 1.0,
                2.0, 2.0,
                3.0, 3.0,
                2.0, f64::NAN,
            ],
        )
        .unwrap();

        let mut imputer = KnnImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!((result[[3, 1]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_fallback_when_no_coordinate_overlaps() {
        let data = Array2::from_shape_vec(
            (3, 2),
            vec![
                1.0, 10.0,
                3.0, 30.0,
                f64::NAN, f64::NAN,
            ],
        )
        .unwrap();

        let mut imputer = KnnImputer::new(2);
        let result = imputer.fit_transform(&data).unwrap();

        // All coordinates missing: distance is undefined, fall back to means
        assert!((result[[2, 0]] - 2.0).abs() < 1e-12);
        assert!((result[[2, 1]] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_errors_without_complete_rows() {
        let data = Array2::from_shape_vec((2, 2), vec![f64::NAN, 1.0, 2.0, f64::NAN]).unwrap();
        let mut imputer = KnnImputer::new(3);
        assert!(imputer.fit(&data).is_err());
    }
}
