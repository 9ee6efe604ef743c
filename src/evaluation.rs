//! Regression metrics and held-out evaluation

use crate::error::Result;
use crate::preprocessing::ColumnStats;
use crate::training::TrainedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Held-out results for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// MSE in the (scaled) label space the model was trained in
    pub test_loss: f64,
    /// MAE after mapping predictions and labels back to the original label
    /// scale; present whenever label stats are supplied
    pub test_unscaled_mae: Option<f64>,
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Score a trained model on the test split.
///
/// When `label_stats` is present the de-normalized MAE is always computed —
/// presence of the stats decides, never their values, so a label that was
/// centered at zero still gets an unscaled error.
pub fn evaluate(
    model: &TrainedModel,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    label_stats: Option<&ColumnStats>,
) -> Result<EvalReport> {
    let predictions = model.forest.predict(x_test)?;
    let test_loss = mean_squared_error(y_test, &predictions);

    let test_unscaled_mae = label_stats.map(|stats| {
        let unscale = |v: f64| v * stats.std + stats.mean;
        let y_unscaled = y_test.mapv(unscale);
        let pred_unscaled = predictions.mapv(unscale);
        mean_absolute_error(&y_unscaled, &pred_unscaled)
    });

    Ok(EvalReport {
        test_loss,
        test_unscaled_mae,
    })
}
