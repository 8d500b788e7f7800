//! Ordered feature schemas and reindexing of frames onto them.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::frame::{Column, Frame};

/// Ordered list of feature column names. Order is part of the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        FeatureSchema { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn diff(&self, actual: &[String]) -> SchemaDiff {
        SchemaDiff::between(&self.columns, actual)
    }

    /// Fail with a `SchemaMismatch` naming every offending column unless `actual`
    /// equals this schema exactly (names, count and order).
    pub fn ensure_matches(&self, actual: &[String], stage: &str) -> Result<()> {
        let diff = self.diff(actual);
        if diff.is_empty() {
            Ok(())
        } else {
            Err(diff.into_error(stage))
        }
    }
}

impl From<Vec<String>> for FeatureSchema {
    fn from(columns: Vec<String>) -> Self {
        FeatureSchema::new(columns)
    }
}

/// Differences between an expected and an actual column list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Expected but absent.
    pub missing: Vec<String>,
    /// Present but not expected.
    pub extra: Vec<String>,
    /// Present on both sides but at a different relative position.
    pub misordered: Vec<String>,
}

impl SchemaDiff {
    pub fn between(expected: &[String], actual: &[String]) -> Self {
        let missing: Vec<String> = expected
            .iter()
            .filter(|c| !actual.contains(c))
            .cloned()
            .collect();
        let extra: Vec<String> = actual
            .iter()
            .filter(|c| !expected.contains(c))
            .cloned()
            .collect();

        // Compare the relative order of the columns both sides share.
        let shared_expected = expected.iter().filter(|c| actual.contains(c));
        let shared_actual = actual.iter().filter(|c| expected.contains(c));
        let mut misordered: Vec<String> = shared_expected
            .zip(shared_actual)
            .filter(|(e, a)| e != a)
            .map(|(e, _)| e.clone())
            .collect();

        // Duplicated names in `actual` are an ordering defect too.
        for (i, c) in actual.iter().enumerate() {
            if actual[..i].contains(c) && !misordered.contains(c) {
                misordered.push(c.clone());
            }
        }

        SchemaDiff {
            missing,
            extra,
            misordered,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.misordered.is_empty()
    }

    pub fn into_error(self, stage: &str) -> ScoringError {
        ScoringError::schema_mismatch(stage, self.missing, self.extra, self.misordered)
    }
}

/// Reindexes frames to a fixed schema: never adds a column the schema lacks,
/// never omits one it names.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAligner {
    schema: FeatureSchema,
}

impl SchemaAligner {
    pub fn new(schema: FeatureSchema) -> Self {
        SchemaAligner { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Columns come out in schema order. Absent columns are all-missing; columns
    /// outside the schema are dropped.
    pub fn align(&self, frame: &Frame) -> Frame {
        let nrows = frame.nrows();
        let dropped: Vec<String> = frame
            .column_names()
            .into_iter()
            .filter(|c| !self.schema.contains(c))
            .collect();
        if !dropped.is_empty() {
            debug!("dropping columns outside the feature schema: {:?}", dropped);
        }

        let columns: Vec<Column> = self
            .schema
            .columns()
            .iter()
            .map(|name| match frame.column(name) {
                Some(c) => c.clone(),
                None => Column::missing(name, nrows),
            })
            .collect();

        let mut aligned = Frame::empty(nrows);
        for column in columns {
            // every column has `nrows` rows
            let _ = aligned.set_column(column);
        }
        aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColumnValues;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_reports_missing_and_extra_independently() {
        let diff = SchemaDiff::between(&names(&["a", "b", "c"]), &names(&["a", "x", "c"]));
        assert_eq!(diff.missing, names(&["b"]));
        assert_eq!(diff.extra, names(&["x"]));
        assert!(diff.misordered.is_empty());
    }

    #[test]
    fn diff_reports_misordered() {
        let diff = SchemaDiff::between(&names(&["a", "b", "c"]), &names(&["a", "c", "b"]));
        assert!(diff.missing.is_empty());
        assert!(diff.extra.is_empty());
        assert_eq!(diff.misordered, names(&["b", "c"]));
    }

    #[test]
    fn ensure_matches_accepts_identical() {
        let schema = FeatureSchema::new(names(&["a", "b"]));
        assert!(schema.ensure_matches(&names(&["a", "b"]), "test").is_ok());
        assert!(schema.ensure_matches(&names(&["a", "b", "b"]), "test").is_err());
    }

    #[test]
    fn align_reindexes_and_fills() {
        let frame = Frame::from_columns(
            2,
            vec![
                Column::numeric("z", vec![Some(9.0), Some(9.0)]),
                Column::numeric("b", vec![Some(1.0), Some(2.0)]),
            ],
        )
        .unwrap();
        let aligner = SchemaAligner::new(FeatureSchema::new(names(&["a", "b"])));
        let out = aligner.align(&frame);
        assert_eq!(out.column_names(), names(&["a", "b"]));
        assert_eq!(
            out.column("a").unwrap().values,
            ColumnValues::Numeric(vec![None, None])
        );
        assert_eq!(
            out.column("b").unwrap().values,
            ColumnValues::Numeric(vec![Some(1.0), Some(2.0)])
        );
    }
}
