//! Missing-value imputation
//!
//! The enrichment join leaves nulls where a parcel's quadkey has no match in
//! the feature package; those are filled with a KNN imputer over the split's
//! own numeric matrix.

mod knn;

pub use knn::KnnImputer;

use crate::dataset::to_matrix;
use crate::error::Result;
use ndarray::Array2;
use polars::prelude::*;

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fit the imputer on data with missing values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Transform data by imputing missing values
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Check if value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Impute every null in a numeric frame with a KNN imputer fit on the frame
/// itself. Column names, order, and row count are preserved exactly.
pub fn impute_missing(df: &DataFrame, n_neighbors: usize) -> Result<DataFrame> {
    let x = to_matrix(df)?;
    if !x.iter().any(|&v| is_missing(v)) {
        return Ok(df.clone());
    }

    let mut imputer = KnnImputer::new(n_neighbors);
    let filled = imputer.fit_transform(&x)?;

    let mut result = df.clone();
    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let values: Vec<f64> = filled.column(col_idx).iter().copied().collect();
        let series = Float64Chunked::from_vec(column.name().clone(), values).into_series();
        result = result.with_column(series)?.clone();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impute_missing_fills_nulls_and_preserves_shape() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[Some(1.0), Some(2.0), Some(3.0), None]).into(),
            Series::new("b".into(), &[Some(10.0), Some(20.0), Some(30.0), Some(25.0)]).into(),
        ])
        .unwrap();

        let filled = impute_missing(&df, 3).unwrap();

        assert_eq!(filled.shape(), df.shape());
        assert_eq!(filled.get_column_names(), df.get_column_names());
        let a = filled.column("a").unwrap().f64().unwrap();
        assert_eq!(a.null_count(), 0);
        // Untouched values survive verbatim
        assert_eq!(a.get(0), Some(1.0));
    }

    #[test]
    fn test_impute_missing_noop_without_nulls() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[1.0, 2.0]).into(),
        ])
        .unwrap();
        let filled = impute_missing(&df, 3).unwrap();
        assert_eq!(filled.column("a").unwrap().f64().unwrap().get(1), Some(2.0));
    }
}
