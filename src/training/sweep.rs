//! Max-depth sweep
//!
//! Trains one seeded forest per candidate depth, scores each on the
//! validation split, and keeps the depth with the lowest validation MSE.
//! Selection uses strict `<` over an ascending grid, so ties resolve to the
//! smallest depth.

use super::random_forest::RandomForest;
use crate::error::{LotwiseError, Result};
use crate::evaluation::mean_squared_error;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

const DEPTH_GRID_START: f64 = 2.0;
const DEPTH_GRID_END: f64 = 20.0;
const DEPTH_GRID_STEPS: usize = 10;

/// The candidate depths: 10 evenly spaced integers from 2 to 20.
pub fn depth_grid() -> Vec<usize> {
    let step = (DEPTH_GRID_END - DEPTH_GRID_START) / (DEPTH_GRID_STEPS - 1) as f64;
    (0..DEPTH_GRID_STEPS)
        .map(|i| (DEPTH_GRID_START + i as f64 * step) as usize)
        .collect()
}

/// A sweep winner: the fitted forest plus how it was chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub forest: RandomForest,
    pub max_depth: usize,
    pub val_loss: f64,
}

/// Runs the depth sweep with a fixed seed and estimator count.
#[derive(Debug, Clone)]
pub struct DepthSweep {
    n_estimators: usize,
    seed: u64,
}

impl DepthSweep {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            seed,
        }
    }

    /// Fit one forest per depth on train, score on validate, keep the best.
    pub fn run(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_val: &Array2<f64>,
        y_val: &Array1<f64>,
    ) -> Result<TrainedModel> {
        let mut best: Option<TrainedModel> = None;

        for depth in depth_grid() {
            let mut forest = RandomForest::new(self.n_estimators)
                .with_max_depth(depth)
                .with_random_state(self.seed);
            forest.fit(x_train, y_train)?;

            let predictions = forest.predict(x_val)?;
            let val_loss = mean_squared_error(y_val, &predictions);
            info!(max_depth = depth, val_loss, "TRAINING RESULT");

            // NaN losses never win; strict `<` keeps the first-seen depth on ties
            if val_loss.is_finite() && best.as_ref().map_or(true, |b| val_loss < b.val_loss) {
                best = Some(TrainedModel {
                    forest,
                    max_depth: depth,
                    val_loss,
                });
            }
        }

        let best = best.ok_or_else(|| {
            LotwiseError::TrainingError(
                "depth sweep produced no finite validation loss".to_string(),
            )
        })?;

        info!(
            max_depth = best.max_depth,
            val_loss = best.val_loss,
            "BEST TRAINING RESULT"
        );
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_depth_grid_values() {
        assert_eq!(depth_grid(), vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
    }

    #[test]
    fn test_constant_labels_pick_smallest_depth() {
        let x_train = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y_train = array![3.0, 3.0, 3.0, 3.0, 3.0, 3.0];
        let x_val = array![[1.5], [4.5]];
        let y_val = array![3.0, 3.0];

        let sweep = DepthSweep::new(5, 123);
        let model = sweep.run(&x_train, &y_train, &x_val, &y_val).unwrap();

        // Every depth scores 0, so strict `<` keeps the first grid entry
        assert_eq!(model.max_depth, 2);
        assert!(model.val_loss.abs() < 1e-12);
    }

    #[test]
    fn test_returns_fitted_winner() {
        let x_train = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y_train = array![1.0, 1.0, 1.0, 9.0, 9.0, 9.0];
        let x_val = array![[2.0], [11.0]];
        let y_val = array![1.0, 9.0];

        let sweep = DepthSweep::new(10, 123);
        let model = sweep.run(&x_train, &y_train, &x_val, &y_val).unwrap();

        assert!(model.val_loss < 1.0);
        let predictions = model.forest.predict(&x_val).unwrap();
        assert!((predictions[0] - 1.0).abs() < 1.5);
    }
}
