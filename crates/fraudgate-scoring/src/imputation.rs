//! Median imputation of missing numeric values.
use std::borrow::Cow;
use std::collections::BTreeMap;

use log::warn;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};

use crate::error::{Result, ScoringError};
use crate::frame::{Column, ColumnValues, FeatureMatrix, Frame};
use crate::schema::SchemaDiff;

/// Fill value for a column that had no observed value at fit time.
const EMPTY_COLUMN_FILL: f64 = 0.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    columns: Vec<String>,
    medians: BTreeMap<String, f64>,
}

impl Imputer {
    /// Learn per-column medians, ignoring missing values. Every column must be numeric.
    pub fn fit(frame: &Frame) -> Result<Self> {
        let medians: Vec<(String, f64)> = frame
            .columns()
            .par_iter()
            .map(|column| {
                let values = numeric_values(column)?;
                let observed: Vec<f64> = values.iter().flatten().copied().collect();
                let median = if observed.is_empty() {
                    warn!(
                        "column '{}' has no observed values; imputing {}",
                        column.name, EMPTY_COLUMN_FILL
                    );
                    EMPTY_COLUMN_FILL
                } else {
                    Data::new(observed).median()
                };
                Ok((column.name.clone(), median))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Imputer {
            columns: frame.column_names(),
            medians: medians.into_iter().collect(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn medians(&self) -> &BTreeMap<String, f64> {
        &self.medians
    }

    pub fn median(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }

    /// Fill every missing value with its column median. `frame` must carry exactly
    /// the fitted columns in fitted order.
    pub fn transform(&self, frame: &Frame) -> Result<FeatureMatrix> {
        let diff = SchemaDiff::between(&self.columns, &frame.column_names());
        if !diff.is_empty() {
            return Err(diff.into_error("imputer"));
        }

        let nrows = frame.nrows();
        let ncols = self.columns.len();
        let mut values = Array2::<f64>::zeros((nrows, ncols));
        for (j, column) in frame.columns().iter().enumerate() {
            let fill = self.medians[&column.name];
            for (i, v) in numeric_values(column)?.iter().enumerate() {
                values[(i, j)] = v.unwrap_or(fill);
            }
        }
        FeatureMatrix::new(self.columns.clone(), values)
    }
}

/// Borrow the numeric values of a column, or fail naming the first text value.
fn numeric_values(column: &Column) -> Result<Cow<'_, [Option<f64>]>> {
    match &column.values {
        ColumnValues::Numeric(v) => Ok(Cow::Borrowed(v.as_slice())),
        ColumnValues::Categorical(v) => match v.iter().position(Option::is_some) {
            Some(row) => Err(ScoringError::TypeCoercion {
                column: column.name.clone(),
                row: Some(row),
                detail: format!(
                    "value '{}' is not numeric",
                    v[row].as_deref().unwrap_or_default()
                ),
            }),
            None => Ok(Cow::Owned(vec![None; v.len()])),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medians_ignore_missing() {
        let frame = Frame::from_columns(
            4,
            vec![
                Column::numeric("a", vec![Some(1.0), None, Some(3.0), Some(10.0)]),
                Column::numeric("b", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            ],
        )
        .unwrap();
        let imp = Imputer::fit(&frame).unwrap();
        assert!((imp.median("a").unwrap() - 3.0).abs() < 1e-12);
        assert!((imp.median("b").unwrap() - 2.5).abs() < 1e-12);

        let out = imp.transform(&frame).unwrap();
        assert!(!out.has_missing());
        assert!((out.get(1, "a").unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(out.columns(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn empty_column_gets_fallback() {
        let frame = Frame::from_columns(2, vec![Column::missing("a", 2)]).unwrap();
        let imp = Imputer::fit(&frame).unwrap();
        assert_eq!(imp.median("a"), Some(EMPTY_COLUMN_FILL));
    }

    #[test]
    fn text_column_is_a_coercion_error() {
        let frame = Frame::from_columns(
            2,
            vec![Column::categorical("card1", vec![None, Some("abc".into())])],
        )
        .unwrap();
        match Imputer::fit(&frame) {
            Err(ScoringError::TypeCoercion { column, row, .. }) => {
                assert_eq!(column, "card1");
                assert_eq!(row, Some(1));
            }
            other => panic!("expected TypeCoercion, got {:?}", other),
        }
    }

    #[test]
    fn transform_rejects_other_columns() {
        let fit = Frame::from_columns(1, vec![Column::numeric("a", vec![Some(1.0)])]).unwrap();
        let imp = Imputer::fit(&fit).unwrap();
        let other = Frame::from_columns(1, vec![Column::numeric("b", vec![Some(1.0)])]).unwrap();
        assert!(imp.transform(&other).unwrap_err().is_schema_mismatch());
    }
}
