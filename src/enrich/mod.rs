//! Geospatial feature enrichment
//!
//! Rows are keyed by the zoom-19 quadkey of their coordinates and joined
//! against externally produced feature tables: one keyed directly by
//! quadkey, one keyed by census block group and reached through a
//! quadkey-to-cbg crosswalk.

mod local;
mod quadkey;

pub use local::LocalDataPackage;
pub use quadkey::quadkey;

use crate::error::Result;
use polars::prelude::DataFrame;

/// Marker suffix of census-block-group-keyed feature names
pub const CBG_SUFFIX: &str = "_cbg";

/// A source of per-location features.
pub trait FeatureEnricher {
    /// Load the backing tables for the requested feature columns.
    fn load(&mut self, features: &[String]) -> Result<()>;

    /// Append the loaded feature columns to a frame that carries latitude
    /// and longitude. Row count and order are preserved; unmatched rows get
    /// nulls.
    fn enrich_df(&self, df: &DataFrame) -> Result<DataFrame>;
}
