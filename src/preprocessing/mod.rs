//! Feature preprocessing
//!
//! Continuous-feature standardization with train-derived stats, and
//! supervised k-best feature selection.

pub mod scaler;
pub mod selector;

pub use scaler::{ColumnStats, ContinuousScaler, ScaleStats};
pub use selector::{KBestSelector, SelectedFeatures};
