//! Enrichment backed by local CSV tables
//!
//! Expects three files under `base_loc`:
//! `<feature_prefix>_<version_id>_qk.csv` (quadkey-keyed features),
//! `<feature_prefix>_<version_id>_cbg.csv` (census-block-group features),
//! and `<crosswalk_prefix>_<version_id>_crosswalk.csv` (quadkey -> cbg).
//! Only the files a requested feature actually needs are read.

use super::{quadkey, FeatureEnricher, CBG_SUFFIX};
use crate::config::EnrichmentConfig;
use crate::dataset::read_csv;
use crate::error::{LotwiseError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

const QUADKEY_COL: &str = "quadkey";
const CBG_COL: &str = "census_block_group";

/// One keyed feature table held in memory as key -> row lookup.
#[derive(Debug, Clone)]
struct KeyedTable {
    /// column name -> (key -> value)
    columns: HashMap<String, HashMap<String, Option<f64>>>,
}

impl KeyedTable {
    fn from_frame(df: &DataFrame, key_col: &str, wanted: &[String]) -> Result<KeyedTable> {
        let keys = df
            .column(key_col)
            .map_err(|_| LotwiseError::ColumnNotFound(key_col.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let keys = keys.str()?;

        let mut columns = HashMap::new();
        for name in wanted {
            let series = df
                .column(name)
                .map_err(|_| LotwiseError::ColumnNotFound(name.clone()))?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let values = series.f64()?;

            let mut lookup = HashMap::with_capacity(df.height());
            for (key, value) in keys.into_iter().zip(values.into_iter()) {
                if let Some(key) = key {
                    lookup.insert(key.to_string(), value);
                }
            }
            columns.insert(name.clone(), lookup);
        }

        Ok(KeyedTable { columns })
    }

    fn get(&self, column: &str, key: &str) -> Option<f64> {
        self.columns.get(column)?.get(key).copied().flatten()
    }
}

/// Feature enricher reading versioned CSV tables from a local directory.
#[derive(Debug, Clone)]
pub struct LocalDataPackage {
    config: EnrichmentConfig,
    qk_features: Vec<String>,
    cbg_features: Vec<String>,
    qk_table: Option<KeyedTable>,
    cbg_table: Option<KeyedTable>,
    /// quadkey -> census block group
    crosswalk: Option<HashMap<String, String>>,
}

impl LocalDataPackage {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self {
            config,
            qk_features: Vec::new(),
            cbg_features: Vec::new(),
            qk_table: None,
            cbg_table: None,
            crosswalk: None,
        }
    }

    fn table_path(&self, suffix: &str) -> PathBuf {
        self.config.base_loc.join(format!(
            "{}_{}_{}.csv",
            self.config.feature_prefix, self.config.version_id, suffix
        ))
    }

    fn crosswalk_path(&self) -> PathBuf {
        self.config.base_loc.join(format!(
            "{}_{}_crosswalk.csv",
            self.config.crosswalk_prefix, self.config.version_id
        ))
    }

    fn load_crosswalk(&self) -> Result<HashMap<String, String>> {
        let df = read_csv(&self.crosswalk_path())?;
        let quadkeys = df
            .column(QUADKEY_COL)
            .map_err(|_| LotwiseError::ColumnNotFound(QUADKEY_COL.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let cbgs = df
            .column(CBG_COL)
            .map_err(|_| LotwiseError::ColumnNotFound(CBG_COL.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;

        let mut map = HashMap::with_capacity(df.height());
        for (qk, cbg) in quadkeys.str()?.into_iter().zip(cbgs.str()?.into_iter()) {
            if let (Some(qk), Some(cbg)) = (qk, cbg) {
                map.insert(qk.to_string(), cbg.to_string());
            }
        }
        Ok(map)
    }

    fn row_quadkeys(&self, df: &DataFrame) -> Result<Vec<Option<String>>> {
        let lat = df
            .column(&self.config.latitude_col)
            .map_err(|_| LotwiseError::ColumnNotFound(self.config.latitude_col.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let lon = df
            .column(&self.config.longitude_col)
            .map_err(|_| LotwiseError::ColumnNotFound(self.config.longitude_col.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;

        Ok(lat
            .f64()?
            .into_iter()
            .zip(lon.f64()?.into_iter())
            .map(|(lat, lon)| match (lat, lon) {
                (Some(lat), Some(lon)) => Some(quadkey(lat, lon, self.config.quadkey_zoom)),
                _ => None,
            })
            .collect())
    }
}

impl FeatureEnricher for LocalDataPackage {
    fn load(&mut self, features: &[String]) -> Result<()> {
        if features.is_empty() {
            return Err(LotwiseError::ConfigError(
                "no enrichment features requested".to_string(),
            ));
        }

        let (cbg, qk): (Vec<String>, Vec<String>) = features
            .iter()
            .cloned()
            .partition(|name| name.ends_with(CBG_SUFFIX));
        self.qk_features = qk;
        self.cbg_features = cbg;

        if !self.qk_features.is_empty() {
            let df = read_csv(&self.table_path("qk"))?;
            self.qk_table = Some(KeyedTable::from_frame(&df, QUADKEY_COL, &self.qk_features)?);
        }
        if !self.cbg_features.is_empty() {
            let df = read_csv(&self.table_path("cbg"))?;
            self.cbg_table = Some(KeyedTable::from_frame(&df, CBG_COL, &self.cbg_features)?);
            self.crosswalk = Some(self.load_crosswalk()?);
        }

        info!(
            quadkey_features = self.qk_features.len(),
            cbg_features = self.cbg_features.len(),
            base_loc = %self.config.base_loc.display(),
            "loaded enrichment package"
        );
        Ok(())
    }

    fn enrich_df(&self, df: &DataFrame) -> Result<DataFrame> {
        if self.qk_features.is_empty() && self.cbg_features.is_empty() {
            return Err(LotwiseError::ModelNotFitted);
        }

        let row_keys = self.row_quadkeys(df)?;
        let mut result = df.clone();

        for name in &self.qk_features {
            let table = self.qk_table.as_ref().ok_or(LotwiseError::ModelNotFitted)?;
            let values: Float64Chunked = row_keys
                .iter()
                .map(|key| key.as_deref().and_then(|qk| table.get(name, qk)))
                .collect();
            result = result
                .with_column(values.with_name(name.as_str().into()).into_series())?
                .clone();
        }

        for name in &self.cbg_features {
            let table = self.cbg_table.as_ref().ok_or(LotwiseError::ModelNotFitted)?;
            let crosswalk = self.crosswalk.as_ref().ok_or(LotwiseError::ModelNotFitted)?;
            let values: Float64Chunked = row_keys
                .iter()
                .map(|key| {
                    key.as_deref()
                        .and_then(|qk| crosswalk.get(qk))
                        .and_then(|cbg| table.get(name, cbg))
                })
                .collect();
            result = result
                .with_column(values.with_name(name.as_str().into()).into_series())?
                .clone();
        }

        Ok(result)
    }
}
