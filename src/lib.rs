//! lotwise - segmented real-estate price modeling
//!
//! A feature-engineering and training pipeline for a parcel-level
//! price-prediction benchmark:
//! - [`dataset`] - CSV loading, predefined TRAIN/VALIDATE/TEST splits
//! - [`enrich`] - quadkey-keyed geospatial/demographic feature joins
//! - [`preprocessing`] - continuous scaling, mutual-information selection
//! - [`imputation`] - KNN imputation of enrichment nulls
//! - [`segment`] - one-hot tax-district segmentation
//! - [`training`] - random forest regression with a max-depth sweep
//! - [`evaluation`] - held-out metrics, optionally de-normalized
//! - [`pipeline`] - global and per-district runners, importance reports

pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod evaluation;
pub mod imputation;
pub mod pipeline;
pub mod preprocessing;
pub mod segment;
pub mod training;

pub use error::{LotwiseError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{EnrichmentConfig, PipelineConfig};
    pub use crate::dataset::{load_dataset, LabeledFrame, SplitSet};
    pub use crate::enrich::{FeatureEnricher, LocalDataPackage};
    pub use crate::error::{LotwiseError, Result};
    pub use crate::evaluation::{evaluate, EvalReport};
    pub use crate::imputation::{impute_missing, Imputer, KnnImputer};
    pub use crate::pipeline::{
        enrich_stage, load_stage, run_global, write_importance_report, ModelOutcome,
        PipelineState, RunSummary, SegmentedRunner,
    };
    pub use crate::preprocessing::{ColumnStats, ContinuousScaler, KBestSelector, ScaleStats};
    pub use crate::segment::segment;
    pub use crate::training::{DepthSweep, RandomForest, TrainedModel};
}
