//! Frequency encoding of categorical columns.
//!
//! Each categorical column `c` is replaced by a numeric column `c_freq` holding the
//! relative frequency of the row's category in the training population. Categories
//! never seen at fit time encode to missing (never zero) so the imputer decides
//! their value. A number in a categorical column is the category of its string
//! form, whether or not the rest of the batch is text.
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::frame::{category_key, Column, ColumnValues, Frame};

pub const FREQ_SUFFIX: &str = "_freq";

/// Observed category → relative frequency for one column. Immutable once fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMap {
    frequencies: BTreeMap<String, f64>,
    observed: usize,
}

impl FrequencyMap {
    /// `value -> count(value) / total_non_missing`.
    pub fn fit(values: &[Option<String>]) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut observed = 0usize;
        for v in values.iter().flatten() {
            *counts.entry(v.clone()).or_insert(0) += 1;
            observed += 1;
        }
        let frequencies = counts
            .into_iter()
            .map(|(k, n)| (k, n as f64 / observed as f64))
            .collect();
        FrequencyMap {
            frequencies,
            observed,
        }
    }

    pub fn frequency(&self, value: &str) -> Option<f64> {
        self.frequencies.get(value).copied()
    }

    /// Number of non-missing training values the map was built from.
    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.frequencies.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEncoder {
    categorical_columns: Vec<String>,
    maps: BTreeMap<String, FrequencyMap>,
}

impl FrequencyEncoder {
    /// Learn one map per categorical column, keeping the frame's column order.
    pub fn fit(frame: &Frame) -> Self {
        let mut categorical_columns = Vec::new();
        let mut maps = BTreeMap::new();
        for column in frame.columns() {
            if let ColumnValues::Categorical(values) = &column.values {
                let map = FrequencyMap::fit(values);
                debug!(
                    "frequency map for '{}': {} categories over {} observed values",
                    column.name,
                    map.len(),
                    map.observed()
                );
                categorical_columns.push(column.name.clone());
                maps.insert(column.name.clone(), map);
            }
        }
        FrequencyEncoder {
            categorical_columns,
            maps,
        }
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn frequency_map(&self, column: &str) -> Option<&FrequencyMap> {
        self.maps.get(column)
    }

    pub fn encoded_name(column: &str) -> String {
        format!("{}{}", column, FREQ_SUFFIX)
    }

    /// Append `<col>_freq` for every learned categorical column and drop the raw
    /// column. A learned column absent from `frame` encodes to all-missing.
    pub fn encode(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        for name in &self.categorical_columns {
            let map = &self.maps[name];
            let encoded: Vec<Option<f64>> = match frame.column(name).map(|c| &c.values) {
                Some(ColumnValues::Categorical(values)) => values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| map.frequency(s)))
                    .collect(),
                // a batch of numbers only; look them up as categories
                Some(ColumnValues::Numeric(values)) => values
                    .iter()
                    .map(|v| v.and_then(|n| map.frequency(&category_key(n))))
                    .collect(),
                None => vec![None; frame.nrows()],
            };
            let _ = out.set_column(Column::numeric(&Self::encoded_name(name), encoded));
            out.remove_column(name);
        }
        out
    }
}
