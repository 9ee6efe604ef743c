//! Typed pipeline configuration
//!
//! All knobs the original benchmark exposes live here as named, defaulted,
//! validated fields rather than loose JSON parameters.

use crate::error::{LotwiseError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default feature names requested from the enrichment data package.
/// Quadkey-keyed features carry a `_qk_` marker, census-block-group
/// features end in `_cbg`.
pub const DEFAULT_ENRICHMENT_FEATURES: &[&str] = &[
    "area_sqkm_qk_isochrone_walk_10m",
    "population_qk_isochrone_walk_10m",
    "poi_count_per_capita_qk_isochrone_walk_10m",
    "poi_count_qk_isochrone_walk_10m",
    "poi_is_transportation_count_qk_isochrone_walk_10m",
    "poi_is_restaurant_count_qk_isochrone_walk_10m",
    "poi_is_social_and_community_services_count_qk_isochrone_walk_10m",
    "poi_is_religious_organization_count_per_capita_qk_isochrone_walk_10m",
    "park_intersecting_area_in_sqkm_qk_isochrone_walk_10m",
    "coast_intersecting_length_in_km_qk_isochrone_walk_10m",
    "coast_intersects_cbg",
    "acs_pop_employment_status_in_labor_force_civilian_unemployed_cbg",
    "acs_pct_households_with_no_internet_access_cbg",
    "acs_median_rent_cbg",
    "acs_median_year_structure_built_cbg",
    "acs_median_age_cbg",
];

/// Configuration for the enrichment data package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Directory holding the feature and crosswalk CSVs
    pub base_loc: PathBuf,
    /// Dataset version stamp embedded in the file names
    pub version_id: String,
    /// File-name prefix for the quadkey/cbg feature tables
    pub feature_prefix: String,
    /// File-name prefix for the quadkey-to-cbg crosswalk
    pub crosswalk_prefix: String,
    /// Feature columns to pull from the package
    pub features: Vec<String>,
    /// Latitude column in the target frame
    pub latitude_col: String,
    /// Longitude column in the target frame
    pub longitude_col: String,
    /// Tile zoom level used to key rows by quadkey
    pub quadkey_zoom: u8,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_loc: PathBuf::from("data/enrichment"),
            version_id: "20211110214810".to_string(),
            feature_prefix: "fl_pinellas_quadkeys".to_string(),
            crosswalk_prefix: "fl_pinellas_quadkeys".to_string(),
            features: DEFAULT_ENRICHMENT_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            latitude_col: "latitude".to_string(),
            longitude_col: "longitude".to_string(),
            quadkey_zoom: 19,
        }
    }
}

impl EnrichmentConfig {
    pub fn with_base_loc(mut self, base_loc: impl Into<PathBuf>) -> Self {
        self.base_loc = base_loc.into();
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Location columns consumed when keying rows by quadkey
    pub fn location_cols(&self) -> [String; 2] {
        [self.latitude_col.clone(), self.longitude_col.clone()]
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(LotwiseError::ConfigError(
                "enrichment feature list is empty".to_string(),
            ));
        }
        if self.quadkey_zoom == 0 || self.quadkey_zoom > 23 {
            return Err(LotwiseError::ConfigError(format!(
                "quadkey zoom must be in 1..=23, got {}",
                self.quadkey_zoom
            )));
        }
        Ok(())
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path to the benchmark CSV
    pub data_path: PathBuf,
    /// Row-id column (cast to string on load)
    pub index_col: String,
    /// Regression target column
    pub label_col: String,
    /// Column carrying the TRAIN/VALIDATE/TEST assignment
    pub split_col: String,
    /// One-hot prefix identifying tax-district indicator columns
    pub segment_prefix: String,
    /// Number of features kept by supervised selection
    pub model_dim: usize,
    /// Minimum train rows for a segment to be modeled
    pub min_segment_rows: usize,
    /// Trees per forest
    pub n_estimators: usize,
    /// Base seed for bootstrap sampling
    pub seed: u64,
    /// Run identifier stamped into report file names
    pub run_id: String,
    /// Directory the importance report is written to
    pub output_dir: PathBuf,
    /// Cap the dataset at 5000 rows for fast debug runs
    pub debug: bool,
    /// Enrichment package settings; `None` disables enrichment
    pub enrichment: Option<EnrichmentConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/benchmark.csv"),
            index_col: "strap".to_string(),
            label_col: "log_price_per_sqft".to_string(),
            split_col: "split".to_string(),
            segment_prefix: "current_tax_district_dscr_".to_string(),
            model_dim: 50,
            min_segment_rows: 850,
            n_estimators: 100,
            seed: 123,
            run_id: "run".to_string(),
            output_dir: PathBuf::from("feature_importances"),
            debug: false,
            enrichment: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            ..Self::default()
        }
    }

    pub fn with_label_col(mut self, label_col: &str) -> Self {
        self.label_col = label_col.to_string();
        self
    }

    pub fn with_model_dim(mut self, model_dim: usize) -> Self {
        self.model_dim = model_dim;
        self
    }

    pub fn with_min_segment_rows(mut self, min_rows: usize) -> Self {
        self.min_segment_rows = min_rows;
        self
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = run_id.to_string();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_enrichment(mut self, enrichment: EnrichmentConfig) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Location columns, taken from the enrichment config when present.
    pub fn location_cols(&self) -> [String; 2] {
        match &self.enrichment {
            Some(e) => e.location_cols(),
            None => ["latitude".to_string(), "longitude".to_string()],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_dim == 0 {
            return Err(LotwiseError::ConfigError(
                "model_dim must be positive".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(LotwiseError::ConfigError(
                "n_estimators must be positive".to_string(),
            ));
        }
        if self.label_col == self.split_col || self.label_col == self.index_col {
            return Err(LotwiseError::ConfigError(format!(
                "label column {:?} collides with id/split column",
                self.label_col
            )));
        }
        if let Some(enrichment) = &self.enrichment {
            enrichment.validate()?;
        }
        Ok(())
    }
}
