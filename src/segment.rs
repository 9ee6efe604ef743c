//! One-hot segmentation
//!
//! Splits a labeled frame into per-category frames using the one-hot
//! indicator columns that share a given prefix. Each segment keeps the rows
//! where its indicator is 1 and drops every indicator column; ids and labels
//! are filtered with the same mask so alignment holds by construction.
//!
//! Rows with no indicator set appear in no segment. With an exclusive
//! encoding the segment id sets partition the input.

use crate::dataset::LabeledFrame;
use crate::error::{LotwiseError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Indicator column names carrying the prefix, in table order.
pub fn indicator_columns(df: &DataFrame, prefix: &str) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| name.starts_with(prefix))
        .collect()
}

/// Segment a labeled frame by its one-hot indicator columns.
/// Keys are indicator names with the prefix stripped; BTreeMap keeps
/// segment iteration (and downstream reports) stably ordered.
pub fn segment(frame: &LabeledFrame, prefix: &str) -> Result<BTreeMap<String, LabeledFrame>> {
    let indicators = indicator_columns(&frame.features, prefix);
    if indicators.is_empty() {
        return Err(LotwiseError::DataError(format!(
            "no columns start with segment prefix {:?}",
            prefix
        )));
    }

    let mut segments = BTreeMap::new();

    for indicator in &indicators {
        let series = frame
            .features
            .column(indicator)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let mask = series.f64()?.equal(1.0);

        let mut segment = frame.filter(&mask)?;
        segment.features = segment
            .features
            .drop_many(indicators.iter().map(String::as_str));

        let key = indicator[prefix.len()..].to_string();
        segments.insert(key, segment);
    }

    Ok(segments)
}
